//! Local tool cache keyed by package name and version.
//!
//! Layout: `<root>/<name>/<version>/<arch>/` holds the package, and
//! `<root>/<name>/<version>/<arch>.complete` marks it as fully written.
//! Entries without the marker are invisible to [`ToolCache::find`].

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use prebuilt_schema::version::parse_version;
use prebuilt_schema::{Arch, ConstraintError, VersionConstraint, normalize_version};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Failure reading or writing the tool cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem failure at `path`.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The lookup spec is not a valid range.
    #[error(transparent)]
    InvalidSpec(#[from] ConstraintError),

    /// A name, version or directory that cannot be a cache key.
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A store of extracted packages, shared by every install on the machine.
pub trait ToolCache: Send + Sync {
    /// Look up an entry. `version_spec` is an exact version, a range, or `*`.
    fn find(&self, name: &str, version_spec: &str) -> Result<Option<PathBuf>, CacheError>;

    /// Copy `source` into the cache as `(name, version)` and return its final
    /// directory. Committing an existing key replaces it.
    fn commit(&self, source: &Path, name: &str, version: &str) -> Result<PathBuf, CacheError>;
}

/// Version encoded in a cache directory: the name of the leaf's parent.
pub fn version_from_dir(dir: &Path) -> Option<&str> {
    dir.parent()?.file_name()?.to_str()
}

/// Filesystem-backed [`ToolCache`].
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    root: PathBuf,
    arch: String,
}

impl DirectoryCache {
    /// A cache rooted at `root` for the current architecture.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_arch(root, &Arch::current())
    }

    /// A cache rooted at `root` whose entries are filed under `arch`.
    pub fn with_arch(root: impl Into<PathBuf>, arch: &Arch) -> Self {
        Self {
            root: root.into(),
            arch: arch.as_str().to_string(),
        }
    }

    fn entry_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(version).join(&self.arch)
    }

    fn marker(&self, name: &str, version: &str) -> PathBuf {
        self.root
            .join(name)
            .join(version)
            .join(format!("{}.complete", self.arch))
    }

    fn is_complete(&self, name: &str, version: &str) -> bool {
        self.marker(name, version).is_file() && self.entry_dir(name, version).is_dir()
    }

    /// Complete versions of `name`, in no particular order.
    fn versions(&self, name: &str) -> Result<Vec<String>, CacheError> {
        let name_dir = self.root.join(name);
        let entries = match fs::read_dir(&name_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&name_dir, e)),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&name_dir, e))?;
            let Some(version) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !version.starts_with('.') && self.is_complete(name, &version) {
                versions.push(version);
            }
        }
        Ok(versions)
    }
}

impl ToolCache for DirectoryCache {
    fn find(&self, name: &str, version_spec: &str) -> Result<Option<PathBuf>, CacheError> {
        validate_key(name)?;

        if let Some(exact) = exact_version(version_spec) {
            let found = self
                .is_complete(name, &exact)
                .then(|| self.entry_dir(name, &exact));
            debug!(%name, %exact, hit = found.is_some(), "Cache lookup (exact)");
            return Ok(found);
        }

        let constraint = VersionConstraint::parse(version_spec)?;
        let best = self
            .versions(name)?
            .into_iter()
            .filter(|v| constraint.matches(v))
            .max_by(|a, b| compare_versions(a, b));

        debug!(%name, spec = %version_spec, hit = ?best, "Cache lookup");
        Ok(best.map(|v| self.entry_dir(name, &v)))
    }

    fn commit(&self, source: &Path, name: &str, version: &str) -> Result<PathBuf, CacheError> {
        validate_key(name)?;
        let version = normalize_version(version);
        validate_key(version)?;

        let version_dir = self.root.join(name).join(version);
        fs::create_dir_all(&version_dir).map_err(|e| CacheError::io(&version_dir, e))?;

        // hide any previous entry before touching it
        let marker = self.marker(name, version);
        match fs::remove_file(&marker) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                return Err(CacheError::io(&marker, e));
            }
            _ => {}
        }

        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}.staging-", self.arch))
            .tempdir_in(&version_dir)
            .map_err(|e| CacheError::io(&version_dir, e))?;
        copy_dir_all(source, staging.path())?;

        let final_dir = self.entry_dir(name, version);
        if final_dir.exists() {
            fs::remove_dir_all(&final_dir).map_err(|e| CacheError::io(&final_dir, e))?;
        }
        let staged = staging.keep();
        fs::rename(&staged, &final_dir).map_err(|e| {
            fs::remove_dir_all(&staged).ok();
            CacheError::io(&final_dir, e)
        })?;

        fs::write(&marker, b"").map_err(|e| CacheError::io(&marker, e))?;
        debug!(%name, %version, dir = ?final_dir, "Committed cache entry");
        Ok(final_dir)
    }
}

/// A spec naming one concrete version (`1.2.3`, `v1.2.3`, `=1.2.3`).
fn exact_version(spec: &str) -> Option<String> {
    parse_version(spec).map(|v| v.to_string())
}

/// Semver order; unparseable names sort below every valid version.
fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

fn validate_key(key: &str) -> Result<(), CacheError> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && !key.starts_with('.')
        && !key.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidKey(key.to_string()))
    }
}

/// Recursively copy the contents of `src` into `dst`, keeping symlinks as links.
fn copy_dir_all(src: &Path, dst: &Path) -> Result<(), CacheError> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            CacheError::Io {
                path,
                source: e.into(),
            }
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| CacheError::io(entry.path(), io::Error::other(e)))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| CacheError::io(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| CacheError::io(&target, e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<(), CacheError> {
    let link = fs::read_link(src).map_err(|e| CacheError::io(src, e))?;
    std::os::unix::fs::symlink(link, dst).map_err(|e| CacheError::io(dst, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<(), CacheError> {
    fs::copy(src, dst)
        .map(|_| ())
        .map_err(|e| CacheError::io(dst, e))
}
