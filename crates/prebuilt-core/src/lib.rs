//! prebuilt core
//!
//! Installs prebuilt release binaries from GitHub into a local tool cache.
//!
//! # Architecture
//!
//! - **Injected collaborators**: the release listing ([`registry::ReleaseSource`]),
//!   the cache ([`cache::ToolCache`]) and progress output ([`Reporter`]) are
//!   traits, so the [`install::Installer`] can run against fakes in tests.
//! - **Lazy pagination**: release pages are a stream that the matcher stops
//!   pulling once a page produced a qualifying release.
//! - **Atomic cache fill**: entries are staged next to their final location and
//!   only become visible to lookups once a completion marker is written.
//!
//! # Directory Layout
//!
//! ```text
//! <cache root>/
//! ├── .tmp/                       # download + extraction workspaces
//! └── <name>/
//!     └── <version>/
//!         ├── <arch>/             # extracted package, put on PATH
//!         └── <arch>.complete     # written last; lookups require it
//! ```

pub mod cache;
pub mod error;
pub mod install;
pub mod io;
pub mod paths;
pub mod permissions;
pub mod registry;
pub mod reporter;

pub use cache::{DirectoryCache, ToolCache};
pub use error::InstallError;
pub use install::Installer;
pub use paths::*;
pub use reporter::{NullReporter, Reporter};

/// User Agent string sent with every request.
pub const USER_AGENT: &str = concat!("prebuilt/", env!("CARGO_PKG_VERSION"));
