//! Domain-specific errors for install operations

use std::path::PathBuf;

use prebuilt_schema::{ConstraintError, UnsupportedPlatform};
use thiserror::Error;

use crate::cache::CacheError;
use crate::io::download::DownloadError;
use crate::io::extract::ExtractError;

/// Why [`crate::Installer::ensure_installed`] failed.
#[derive(Error, Debug)]
pub enum InstallError {
    /// No release targets exist for this host.
    #[error(transparent)]
    UnsupportedPlatform(#[from] UnsupportedPlatform),

    /// The version range does not parse.
    #[error(transparent)]
    InvalidConstraint(#[from] ConstraintError),

    /// The API request failed or returned an error status.
    #[error("Failed to list releases for {owner}/{name}: {message}")]
    ReleaseListing {
        /// Repository owner.
        owner: String,
        /// Repository name.
        name: String,
        /// API message or transport error.
        message: String,
    },

    /// Every page was read and nothing qualified.
    #[error("no releases for {owner}/{name} matching version specifier {}", constraint.as_deref().unwrap_or("*"))]
    NoMatchingRelease {
        /// Repository owner.
        owner: String,
        /// Repository name.
        name: String,
        /// The range as given, if any.
        constraint: Option<String>,
    },

    /// The asset could not be downloaded.
    #[error("Download failed: {0}")]
    DownloadFailed(#[from] DownloadError),

    /// The asset could not be unpacked.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(#[from] ExtractError),

    /// The execute bit could not be set.
    #[error("Failed to fix permissions on {}: {source}", path.display())]
    PermissionFixFailed {
        /// The binary.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The cache could not be read or written.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl InstallError {
    /// Whether the failure happened before any network access.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPlatform(_) | Self::InvalidConstraint(_)
        )
    }
}
