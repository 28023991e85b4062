//! Execute-bit repair for extracted binaries.
//!
//! Zip archives built on Windows hosts carry no Unix mode, so the binary comes
//! out of extraction as a plain `0644` file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use prebuilt_schema::Os;
use tracing::debug;

use crate::error::InstallError;

/// Where the package's executable was taken to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryLocation {
    /// The caller named the path explicitly.
    Explicit(PathBuf),
    /// A directory entry matched the package name case-insensitively.
    Discovered(PathBuf),
    /// Nothing matched; `<dir>/<package name>` is assumed to exist.
    Assumed(PathBuf),
}

impl BinaryLocation {
    /// The binary's path, whichever way it was found.
    pub fn path(&self) -> &Path {
        match self {
            Self::Explicit(path) | Self::Discovered(path) | Self::Assumed(path) => path,
        }
    }
}

/// What [`ensure_executable`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionOutcome {
    /// Windows has no execute bits; nothing was inspected.
    Skipped,
    /// The binary already had an execute bit set.
    AlreadyExecutable(BinaryLocation),
    /// Mode was changed to `0o755`.
    Fixed(BinaryLocation),
}

/// Decide which file is the package's executable.
///
/// An explicit path is joined onto `dir`. Otherwise the top level of `dir` is
/// scanned for an entry whose name equals `package_name` ignoring case.
pub fn locate_binary(
    dir: &Path,
    package_name: &str,
    explicit: Option<&Path>,
) -> io::Result<BinaryLocation> {
    if let Some(explicit) = explicit {
        return Ok(BinaryLocation::Explicit(dir.join(explicit)));
    }

    let wanted = package_name.to_lowercase();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().to_lowercase() == wanted {
            return Ok(BinaryLocation::Discovered(entry.path()));
        }
    }

    Ok(BinaryLocation::Assumed(dir.join(package_name)))
}

/// Make sure the package binary inside `dir` can be executed.
pub fn ensure_executable(
    dir: &Path,
    package_name: &str,
    explicit: Option<&Path>,
    os: &Os,
) -> Result<PermissionOutcome, InstallError> {
    if os.is_windows() {
        return Ok(PermissionOutcome::Skipped);
    }

    let location =
        locate_binary(dir, package_name, explicit).map_err(|source| {
            InstallError::PermissionFixFailed {
                path: dir.to_path_buf(),
                source,
            }
        })?;

    let fixed = set_executable(location.path()).map_err(|source| {
        InstallError::PermissionFixFailed {
            path: location.path().to_path_buf(),
            source,
        }
    })?;

    if fixed {
        debug!(path = ?location.path(), "Fixed file permissions (-> 0o755)");
        Ok(PermissionOutcome::Fixed(location))
    } else {
        Ok(PermissionOutcome::AlreadyExecutable(location))
    }
}

/// Returns `true` when the mode had to be changed.
#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)?.permissions().mode();
    if mode & 0o111 != 0 {
        return Ok(false);
    }
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(true)
}

#[cfg(not(unix))]
fn set_executable(path: &Path) -> io::Result<bool> {
    // No mode bits to inspect; only confirm the file exists.
    fs::metadata(path).map(|_| false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("toolx"), "bin").unwrap();

        let location = locate_binary(dir.path(), "toolx", Some(Path::new("bin/tx"))).unwrap();
        assert_eq!(
            location,
            BinaryLocation::Explicit(dir.path().join("bin").join("tx"))
        );
    }

    #[test]
    fn test_discovery_ignores_case() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "hi").unwrap();
        fs::write(dir.path().join("ToolX"), "bin").unwrap();

        let location = locate_binary(dir.path(), "toolx", None).unwrap();
        assert_eq!(location, BinaryLocation::Discovered(dir.path().join("ToolX")));
    }

    #[test]
    fn test_falls_back_to_package_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("other"), "bin").unwrap();

        let location = locate_binary(dir.path(), "toolx", None).unwrap();
        assert_eq!(location, BinaryLocation::Assumed(dir.path().join("toolx")));
    }

    #[test]
    fn test_windows_is_always_skipped() {
        let dir = tempdir().unwrap();
        // not even a binary present: Windows never looks
        let outcome = ensure_executable(dir.path(), "toolx", None, &Os::Windows).unwrap();
        assert_eq!(outcome, PermissionOutcome::Skipped);
    }

    #[cfg(unix)]
    #[test]
    fn test_sets_0755_when_not_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let bin = dir.path().join("toolx");
        fs::write(&bin, "bin").unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o644)).unwrap();

        let outcome = ensure_executable(dir.path(), "toolx", None, &Os::Linux).unwrap();
        assert_eq!(
            outcome,
            PermissionOutcome::Fixed(BinaryLocation::Discovered(bin.clone()))
        );
        let mode = fs::metadata(&bin).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn test_leaves_executable_alone() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let bin = dir.path().join("toolx");
        fs::write(&bin, "bin").unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o700)).unwrap();

        let outcome = ensure_executable(dir.path(), "toolx", None, &Os::MacOs).unwrap();
        assert!(matches!(outcome, PermissionOutcome::AlreadyExecutable(_)));
        let mode = fs::metadata(&bin).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn test_windows_skip_ignores_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let bin = dir.path().join("toolx");
        fs::write(&bin, "bin").unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o644)).unwrap();

        ensure_executable(dir.path(), "toolx", None, &Os::Windows).unwrap();
        let mode = fs::metadata(&bin).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_missing_assumed_binary_fails() {
        let dir = tempdir().unwrap();
        let err = ensure_executable(dir.path(), "toolx", None, &Os::Linux).unwrap_err();
        match err {
            InstallError::PermissionFixFailed { path, .. } => {
                assert_eq!(path, dir.path().join("toolx"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
