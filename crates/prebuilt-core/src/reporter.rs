//! Reporter trait for dependency injection
//!
//! This trait allows the installer to report progress and status without
//! being coupled to a specific terminal or CI log format.

use prebuilt_schema::ReleaseCandidate;

/// Progress sink for installs. Implementations must be cheap and non-blocking.
pub trait Reporter: Send + Sync {
    /// A release listing is about to be queried for `owner/name`.
    fn resolving(&self, owner: &str, name: &str, constraint: Option<&str>);

    /// A release was selected.
    fn resolved(&self, name: &str, candidate: &ReleaseCandidate);

    /// Updates the progress of a download.
    fn downloading(&self, name: &str, version: &str, current: u64, total: Option<u64>);

    /// The downloaded archive is being unpacked.
    fn extracting(&self, name: &str, version: &str);

    /// A cache entry satisfied the request; nothing was fetched.
    fn cached(&self, name: &str, version: &str);

    /// Marks an install as successfully completed.
    fn done(&self, name: &str, version: &str, detail: &str);

    /// Marks an install as failed with a specific reason.
    fn failed(&self, name: &str, reason: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn resolving(&self, owner: &str, name: &str, constraint: Option<&str>) {
        (**self).resolving(owner, name, constraint);
    }
    fn resolved(&self, name: &str, candidate: &ReleaseCandidate) {
        (**self).resolved(name, candidate);
    }
    fn downloading(&self, name: &str, version: &str, current: u64, total: Option<u64>) {
        (**self).downloading(name, version, current, total);
    }
    fn extracting(&self, name: &str, version: &str) {
        (**self).extracting(name, version);
    }
    fn cached(&self, name: &str, version: &str) {
        (**self).cached(name, version);
    }
    fn done(&self, name: &str, version: &str, detail: &str) {
        (**self).done(name, version, detail);
    }
    fn failed(&self, name: &str, reason: &str) {
        (**self).failed(name, reason);
    }
}

/// A no-op reporter for silent operations (e.g., scripting, testing).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn resolving(&self, _: &str, _: &str, _: Option<&str>) {}
    fn resolved(&self, _: &str, _: &ReleaseCandidate) {}
    fn downloading(&self, _: &str, _: &str, _: u64, _: Option<u64>) {}
    fn extracting(&self, _: &str, _: &str) {}
    fn cached(&self, _: &str, _: &str) {}
    fn done(&self, _: &str, _: &str, _: &str) {}
    fn failed(&self, _: &str, _: &str) {}
}
