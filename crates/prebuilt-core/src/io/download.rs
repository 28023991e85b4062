//! Async asset download with streaming SHA-256 digest.
//!
//! The digest is recorded for diagnostics only; release assets carry no
//! published checksum to verify against.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::Reporter;

/// Failure fetching a URL to disk.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Transport failure or non-success status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The destination could not be written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file written to disk by [`DownloadRequest::execute`].
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Where the body was written.
    pub path: PathBuf,
    /// Number of bytes received.
    pub size: u64,
    /// Hex SHA-256 of the body.
    pub sha256: String,
}

/// Request for a download operation
pub struct DownloadRequest<'a> {
    /// Client carrying auth headers.
    pub client: &'a Client,
    /// Source URL.
    pub url: &'a str,
    /// Destination file; removed if the download fails.
    pub dest: &'a Path,
    /// Package name, for progress.
    pub name: &'a str,
    /// Package version, for progress.
    pub version: &'a str,
    /// Progress sink.
    pub reporter: &'a dyn Reporter,
}

impl std::fmt::Debug for DownloadRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("url", &self.url)
            .field("dest", &self.dest)
            .finish_non_exhaustive()
    }
}

impl<'a> DownloadRequest<'a> {
    /// Bundle the arguments of one download.
    pub fn new(
        client: &'a Client,
        url: &'a str,
        dest: &'a Path,
        name: &'a str,
        version: &'a str,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            client,
            url,
            dest,
            name,
            version,
            reporter,
        }
    }

    /// Stream the body to `dest`, reporting progress as chunks arrive.
    ///
    /// A partially written file is removed on failure.
    pub async fn execute(self) -> Result<DownloadedFile, DownloadError> {
        let result = self.stream_to_disk().await;
        if result.is_err() {
            tokio::fs::remove_file(self.dest).await.ok();
        }
        result
    }

    async fn stream_to_disk(&self) -> Result<DownloadedFile, DownloadError> {
        debug!(url = %self.url, dest = ?self.dest, "Downloading asset");

        let response = self
            .client
            .get(self.url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/octet-stream")
            .send()
            .await?
            .error_for_status()?;

        let total_size = response.content_length();
        self.reporter
            .downloading(self.name, self.version, 0, total_size);

        let mut file = File::create(self.dest).await?;
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            self.reporter
                .downloading(self.name, self.version, downloaded, total_size);
        }

        file.flush().await?;
        let sha256 = hex::encode(hasher.finalize());
        debug!(url = %self.url, bytes = downloaded, %sha256, "Download complete");

        Ok(DownloadedFile {
            path: self.dest.to_path_buf(),
            size: downloaded,
            sha256,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use mockito::Server;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_download_writes_body_and_digest() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/download/tool.tar.gz")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("tool.tar.gz");
        let client = Client::new();
        let url = format!("{}/download/tool.tar.gz", server.url());

        let file = DownloadRequest::new(&client, &url, &dest, "tool", "1.0.0", &NullReporter)
            .execute()
            .await
            .unwrap();

        assert_eq!(file.size, 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        // sha256("hello")
        assert_eq!(
            file.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_http_error_leaves_no_file() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing.zip")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("missing.zip");
        let client = Client::new();
        let url = format!("{}/missing.zip", server.url());

        let err = DownloadRequest::new(&client, &url, &dest, "tool", "1.0.0", &NullReporter)
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Http(_)));
        assert!(!dest.exists());
    }
}
