//! Shared data types for prebuilt.
//!
//! Nothing in this crate touches the network or the filesystem. It holds the
//! platform model and target table, the request/result types exchanged with
//! callers, and the version helpers used while matching releases.

pub mod platform;
pub mod types;
pub mod version;

// Re-exports
pub use platform::*;
pub use types::*;
pub use version::{ConstraintError, VersionConstraint, normalize_version};
