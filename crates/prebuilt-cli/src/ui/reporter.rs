//! Progress lines on stderr.
//!
//! stdout is reserved for results (the installed directory), so scripts can
//! capture it while humans still see what is happening. Failures are not
//! written here; `main` prints the returned error once.

use std::io::Write;
use std::sync::Mutex;

use prebuilt_core::Reporter;
use prebuilt_schema::ReleaseCandidate;
use tracing::debug;

/// Download progress is printed at most once per this many percent.
const PROGRESS_STEP: u64 = 25;

/// [`Reporter`] writing one line per event to a sink (stderr by default).
pub struct TermReporter<W: Write + Send = std::io::Stderr> {
    out: Mutex<W>,
    last_step: Mutex<Option<u64>>,
    quiet: bool,
}

impl<W: Write + Send> std::fmt::Debug for TermReporter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermReporter")
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

impl TermReporter {
    pub fn stderr(quiet: bool) -> Self {
        Self::new(std::io::stderr(), quiet)
    }
}

impl<W: Write + Send> TermReporter<W> {
    /// `quiet` suppresses every progress line.
    pub fn new(out: W, quiet: bool) -> Self {
        Self {
            out: Mutex::new(out),
            last_step: Mutex::new(None),
            quiet,
        }
    }

    /// Give back the sink.
    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn line(&self, msg: &str) {
        if let Ok(mut out) = self.out.lock() {
            // progress output is best-effort
            let _ = writeln!(out, "{msg}");
        }
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            self.line(msg);
        }
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024 && unit < UNITS.len() - 1 {
        value /= 1024;
        unit += 1;
    }
    format!("{value} {}", UNITS[unit])
}

impl<W: Write + Send> Reporter for TermReporter<W> {
    fn resolving(&self, owner: &str, name: &str, constraint: Option<&str>) {
        self.info(&format!(
            "resolving {owner}/{name} ({})",
            constraint.unwrap_or("*")
        ));
    }

    fn resolved(&self, name: &str, candidate: &ReleaseCandidate) {
        self.info(&format!(
            "{name}: selected {} ({})",
            candidate.tag, candidate.asset_name
        ));
    }

    fn downloading(&self, name: &str, version: &str, current: u64, total: Option<u64>) {
        let Some(total) = total.filter(|&t| t > 0) else {
            return;
        };
        let step = (current.min(total) * 100 / total) / PROGRESS_STEP;
        let Ok(mut last) = self.last_step.lock() else {
            return;
        };
        if *last == Some(step) {
            return;
        }
        *last = Some(step);
        drop(last);
        self.info(&format!(
            "{name} {version}: downloaded {} of {}",
            format_size(current),
            format_size(total)
        ));
    }

    fn extracting(&self, name: &str, version: &str) {
        if let Ok(mut last) = self.last_step.lock() {
            *last = None;
        }
        self.info(&format!("{name} {version}: extracting"));
    }

    fn cached(&self, name: &str, version: &str) {
        self.info(&format!("{name} {version}: found in cache"));
    }

    fn done(&self, name: &str, version: &str, detail: &str) {
        self.info(&format!("{name} {version}: installed to {detail}"));
    }

    fn failed(&self, name: &str, reason: &str) {
        debug!(%name, %reason, "Install failed");
    }
}
