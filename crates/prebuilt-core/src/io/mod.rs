//! IO modules - side effects (network, filesystem)

pub mod download;
pub mod extract;
pub mod fetch;

pub use fetch::{ArtifactFetcher, FetchedArtifact};
