//! Download-and-unpack of a single release asset into a scratch workspace.

use std::path::{Path, PathBuf};

use reqwest::Client;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::Reporter;
use crate::error::InstallError;
use crate::io::download::{DownloadError, DownloadRequest};
use crate::io::extract::{ArchiveKind, ExtractError, collapse_single_dir, extract_archive};

/// An unpacked asset. The backing workspace is deleted on drop.
#[derive(Debug)]
pub struct FetchedArtifact {
    workspace: TempDir,
    root: PathBuf,
}

impl FetchedArtifact {
    /// Root of the extracted tree, after collapsing a single wrapper folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch directory holding both the archive and the extracted tree.
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }
}

/// Downloads and extracts release assets.
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: Client,
    tmp_root: PathBuf,
}

impl ArtifactFetcher {
    /// `tmp_root` should sit on the same filesystem as the cache.
    pub fn new(client: Client, tmp_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            tmp_root: tmp_root.into(),
        }
    }

    /// Download `url` and unpack it according to its extension.
    pub async fn fetch(
        &self,
        url: &str,
        name: &str,
        version: &str,
        reporter: &dyn Reporter,
    ) -> Result<FetchedArtifact, InstallError> {
        tokio::fs::create_dir_all(&self.tmp_root)
            .await
            .map_err(|e| InstallError::DownloadFailed(DownloadError::Io(e)))?;
        let workspace = tempfile::Builder::new()
            .prefix(&format!("{name}-"))
            .tempdir_in(&self.tmp_root)
            .map_err(|e| InstallError::DownloadFailed(DownloadError::Io(e)))?;

        let file_name = match crate::filename_from_url(url) {
            "" => "artifact",
            other => other,
        };
        let archive_path = workspace.path().join(file_name);
        let downloaded =
            DownloadRequest::new(&self.client, url, &archive_path, name, version, reporter)
                .execute()
                .await?;
        info!(%name, %version, bytes = downloaded.size, sha256 = %downloaded.sha256, "Downloaded asset");

        reporter.extracting(name, version);
        let kind = ArchiveKind::from_url(url);
        let extract_dir = workspace.path().join("extracted");
        let extract_into = extract_dir.clone();
        let count = tokio::task::spawn_blocking(move || {
            extract_archive(&archive_path, kind, &extract_into)
        })
        .await
        .map_err(|e| ExtractError::Io(std::io::Error::other(e)))??;

        let root = collapse_single_dir(&extract_dir).map_err(ExtractError::Io)?;
        debug!(?kind, entries = count, root = ?root, "Extracted asset");

        Ok(FetchedArtifact { workspace, root })
    }
}
