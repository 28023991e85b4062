//! Request and result types exchanged with callers of the installer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What to install: a GitHub repository whose releases carry prebuilt binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name, also used as the package and binary name.
    pub name: String,
    /// Optional semver range the release version must satisfy.
    pub version_constraint: Option<String>,
    /// Optional path of the executable inside the extracted archive.
    pub explicit_binary_path: Option<PathBuf>,
}

impl PackageRequest {
    /// Request the latest release of `owner/name`.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            version_constraint: None,
            explicit_binary_path: None,
        }
    }

    /// Restrict to releases satisfying `constraint`. Blank means unconstrained.
    pub fn with_version_constraint(mut self, constraint: impl Into<String>) -> Self {
        let constraint = constraint.into();
        self.version_constraint = if constraint.trim().is_empty() {
            None
        } else {
            Some(constraint)
        };
        self
    }

    /// Point at the executable inside the extracted archive.
    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_binary_path = Some(path.into());
        self
    }

    /// The constraint, or `None` when absent or blank.
    pub fn constraint(&self) -> Option<&str> {
        self.version_constraint
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Version spec used for cache lookups (`*` when unconstrained).
    pub fn cache_spec(&self) -> &str {
        self.constraint().unwrap_or("*")
    }
}

/// A published release that matched the platform and constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCandidate {
    /// Release tag exactly as published.
    pub tag: String,
    /// Normalized version (tag with one leading `v` removed).
    pub version: String,
    /// Name of the matched asset.
    pub asset_name: String,
    /// Direct download URL of the matched asset.
    pub download_url: String,
}

/// A package present in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    /// Repository owner.
    pub owner: String,
    /// Package name.
    pub name: String,
    /// Resolved version, read back from the cache layout.
    pub version: String,
    /// Directory holding the extracted package (to be put on `PATH`).
    pub directory: PathBuf,
    /// Executable path inside `directory`, if the caller supplied one.
    pub binary_path: Option<PathBuf>,
}
