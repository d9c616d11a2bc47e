//! Progress reporting for long-running pipeline stages.
//!
//! Crawling, catalog fetching, and bulk downloads report progress through
//! [`ProgressCallback`] so the stages stay independent of how progress is
//! rendered. The CLI plugs in `indicatif` bars; tests and library callers
//! use [`NullProgress`] or [`LogProgress`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for reporting progress from long-running operations.
///
/// Implementations must be `Send + Sync`: download workers report from
/// many concurrent futures through one shared `Arc`.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work (enables percentage/ETA).
    fn set_total(&self, total: u64);

    /// Set the current position (absolute, not delta).
    fn set_position(&self, pos: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);

    /// Mark progress as complete and remove the progress indicator.
    fn finish_and_clear(&self);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}

/// Writes a log line every `every` units instead of drawing a bar.
///
/// Useful when stdout is not a terminal (cron jobs, CI logs).
pub struct LogProgress {
    label: String,
    every: u64,
    total: AtomicU64,
    position: AtomicU64,
}

impl LogProgress {
    /// Creates a reporter that logs every `every` units under `label`.
    #[must_use]
    pub fn new(label: &str, every: u64) -> Arc<dyn ProgressCallback> {
        Arc::new(Self {
            label: label.to_string(),
            every: every.max(1),
            total: AtomicU64::new(0),
            position: AtomicU64::new(0),
        })
    }
}

impl ProgressCallback for LogProgress {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    fn set_position(&self, pos: u64) {
        self.position.store(pos, Ordering::Relaxed);
    }

    fn inc(&self, delta: u64) {
        let before = self.position.fetch_add(delta, Ordering::Relaxed);
        let after = before + delta;
        if before / self.every != after / self.every {
            let total = self.total.load(Ordering::Relaxed);
            if total > 0 {
                log::info!("{}: {after}/{total}", self.label);
            } else {
                log::info!("{}: {after}", self.label);
            }
        }
    }

    fn set_message(&self, _msg: String) {}

    fn finish(&self, msg: String) {
        log::info!("{}: {msg}", self.label);
    }

    fn finish_and_clear(&self) {}
}
