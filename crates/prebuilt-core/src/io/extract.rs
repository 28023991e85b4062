//! Archive extraction module
//!
//! Zip archives are recognized by their `.zip` extension; everything else is
//! treated as a tar stream whose compression is chosen by extension.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

/// Failure unpacking an archive.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Reading the archive or writing an entry failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Corrupt archive or an entry escaping the destination.
    #[error("Archive error: {0}")]
    Archive(String),
}

/// Compression layer wrapped around a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarCompression {
    /// Plain `.tar`.
    None,
    /// `.tar.gz`, `.tgz`, and the fallback for unknown extensions.
    Gzip,
    /// `.tar.zst`, `.tzst`.
    Zstd,
}

/// How a downloaded asset is unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.zip`.
    Zip,
    /// A tar stream, possibly compressed.
    Tar(TarCompression),
}

impl ArchiveKind {
    /// Pick the extraction strategy from a download URL's extension.
    pub fn from_url(url: &str) -> Self {
        let name = crate::filename_from_url(url).to_lowercase();

        if name.ends_with(".zip") {
            Self::Zip
        } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            Self::Tar(TarCompression::Zstd)
        } else if name.ends_with(".tar") {
            Self::Tar(TarCompression::None)
        } else {
            Self::Tar(TarCompression::Gzip)
        }
    }
}

/// Extract `archive_path` into `dest_dir`, returning the number of entries written.
pub fn extract_archive(
    archive_path: &Path,
    kind: ArchiveKind,
    dest_dir: &Path,
) -> Result<usize, ExtractError> {
    match kind {
        ArchiveKind::Zip => extract_zip(archive_path, dest_dir),
        ArchiveKind::Tar(compression) => {
            let reader = BufReader::new(File::open(archive_path)?);
            match compression {
                TarCompression::None => extract_tar(reader, dest_dir),
                TarCompression::Gzip => extract_tar(flate2::read::GzDecoder::new(reader), dest_dir),
                TarCompression::Zstd => extract_tar(ZstdDecoder::new(reader)?, dest_dir),
            }
        }
    }
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<usize, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    let mut count = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;

        // unpack_in refuses entries that would land outside dest_dir
        if !entry.unpack_in(dest_dir)? {
            let path = entry.path()?.into_owned();
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                path.display()
            )));
        }
        count += 1;
    }

    Ok(count)
}

/// Extract a zip archive
fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut count = 0;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                file.name()
            )));
        };

        let absolute_path = dest_dir.join(&relative_path);
        count += 1;

        if file.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }

        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode & 0o7777))?;
        }
    }

    Ok(count)
}

/// Resolve the real root of an extracted tree.
///
/// Release archives commonly wrap everything in one folder
/// (`tool-1.2.3-x86_64-unknown-linux-musl/tool`). When `dir` holds exactly one
/// entry and it is a directory, that directory is returned; otherwise `dir`
/// itself. Nothing is moved.
pub fn collapse_single_dir(dir: &Path) -> io::Result<PathBuf> {
    let mut entries = fs::read_dir(dir)?;

    let (Some(first), None) = (entries.next(), entries.next()) else {
        return Ok(dir.to_path_buf());
    };
    let first = first?;

    // symlink_metadata: a lone symlink to a directory is not a wrapper
    if fs::symlink_metadata(first.path())?.is_dir() {
        Ok(first.path())
    } else {
        Ok(dir.to_path_buf())
    }
}
