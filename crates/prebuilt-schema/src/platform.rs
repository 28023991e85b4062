//! Host platform model and the release target table.
//!
//! Release assets are named after Rust target triples, so a platform is
//! mapped to the ordered list of triples whose binaries it can run.
//!
//! # Example
//!
//! ```
//! use prebuilt_schema::{Arch, Os, Platform};
//!
//! let platform = Platform::new(Arch::X86_64, Os::Linux);
//! let targets = platform.targets().unwrap();
//! assert_eq!(targets.preferred(), "x86_64-unknown-linux-musl");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CPU architecture of the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit x86 (`x64` / `amd64`).
    X86_64,
    /// 64-bit ARM (`arm64`).
    Aarch64,
    /// 32-bit x86.
    X86,
    /// 32-bit ARM.
    Arm,
    /// Any other architecture, by its Rust name.
    Other(String),
}

impl Arch {
    /// Architecture this binary was compiled for.
    pub fn current() -> Self {
        Self::from_rust_name(std::env::consts::ARCH)
    }

    fn from_rust_name(name: &str) -> Self {
        match name {
            "x86_64" => Self::X86_64,
            "aarch64" => Self::Aarch64,
            "x86" => Self::X86,
            "arm" => Self::Arm,
            other => Self::Other(other.to_string()),
        }
    }

    /// Rust-convention architecture name (matches `std::env::consts::ARCH`).
    pub fn as_str(&self) -> &str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::X86 => "x86",
            Self::Arm => "arm",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "x64" | "amd64" | "x86_64" => Self::X86_64,
            "arm64" | "aarch64" => Self::Aarch64,
            "ia32" | "i686" | "x86" => Self::X86,
            "arm" | "armv7" => Self::Arm,
            other => Self::Other(other.to_string()),
        })
    }
}

/// Operating system family of the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Linux, any libc.
    Linux,
    /// macOS.
    MacOs,
    /// Microsoft Windows.
    Windows,
    /// FreeBSD.
    FreeBsd,
    /// Any other operating system, by its Rust name.
    Other(String),
}

impl Os {
    /// Operating system this binary was compiled for.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Self::Linux,
            "macos" => Self::MacOs,
            "windows" => Self::Windows,
            "freebsd" => Self::FreeBsd,
            other => Self::Other(other.to_string()),
        }
    }

    /// Rust-convention OS name (matches `std::env::consts::OS`).
    pub fn as_str(&self) -> &str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Windows => "windows",
            Self::FreeBsd => "freebsd",
            Self::Other(name) => name,
        }
    }

    /// Whether executables on this OS carry no Unix permission bits.
    pub fn is_windows(&self) -> bool {
        matches!(self, Self::Windows)
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "linux" => Self::Linux,
            "darwin" | "macos" | "osx" => Self::MacOs,
            "win32" | "windows" => Self::Windows,
            "freebsd" => Self::FreeBsd,
            other => Self::Other(other.to_string()),
        })
    }
}

/// The architecture/OS combination has no known release target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to determine any valid targets: arch={arch}, os={os}")]
pub struct UnsupportedPlatform {
    /// Offending architecture.
    pub arch: Arch,
    /// Offending operating system.
    pub os: Os,
}

/// An (architecture, operating system) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// CPU architecture.
    pub arch: Arch,
    /// Operating system.
    pub os: Os,
}

impl Platform {
    /// Create a platform from its parts.
    pub fn new(arch: Arch, os: Os) -> Self {
        Self { arch, os }
    }

    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        Self::new(Arch::current(), Os::current())
    }

    /// Target triples this platform can run, most preferred first.
    ///
    /// Statically linked musl builds are preferred on Linux because they run
    /// regardless of the host's glibc version.
    pub fn targets(&self) -> Result<PlatformTargets, UnsupportedPlatform> {
        let triples: &'static [&'static str] = match (&self.arch, &self.os) {
            (Arch::X86_64, Os::Linux) => &["x86_64-unknown-linux-musl", "x86_64-unknown-linux-gnu"],
            (Arch::X86_64, Os::MacOs) => &["x86_64-apple-darwin"],
            (Arch::X86_64, Os::Windows) => &["x86_64-pc-windows-msvc"],
            (Arch::Aarch64, Os::Linux) => {
                &["aarch64-unknown-linux-musl", "aarch64-unknown-linux-gnu"]
            }
            (Arch::Aarch64, Os::MacOs) => &["aarch64-apple-darwin"],
            _ => {
                return Err(UnsupportedPlatform {
                    arch: self.arch.clone(),
                    os: self.os.clone(),
                });
            }
        };
        Ok(PlatformTargets(triples))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch, self.os)
    }
}

/// Ordered, non-empty list of acceptable target triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformTargets(&'static [&'static str]);

impl PlatformTargets {
    /// All targets, most preferred first.
    pub fn as_slice(&self) -> &'static [&'static str] {
        self.0
    }

    /// The most preferred target.
    pub fn preferred(&self) -> &'static str {
        self.0[0]
    }

    /// Iterate targets in preference order.
    pub fn iter(&self) -> impl Iterator<Item = &'static str> {
        self.0.iter().copied()
    }
}

impl fmt::Display for PlatformTargets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}
