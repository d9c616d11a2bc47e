//! Destinations for per-image download failures.

use std::sync::{Mutex, PoisonError};

use autolot_listing_models::ListingId;
use serde::Serialize;

/// One failed image download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub id: ListingId,
    pub url: String,
    pub message: String,
}

/// Receives download failures from concurrent workers.
pub trait ErrorSink: Send + Sync {
    fn record(&self, failure: FailureRecord);
}

/// Writes each failure to the log and keeps nothing.
pub struct LogSink;

impl ErrorSink for LogSink {
    fn record(&self, failure: FailureRecord) {
        log::warn!(
            "Error downloading image for listing {}: {} ({})",
            failure.id,
            failure.message,
            failure.url
        );
    }
}

/// Accumulates failures for an end-of-run report.
#[derive(Default)]
pub struct CollectingSink {
    failures: Mutex<Vec<FailureRecord>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of failures recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns all failures, ordered by listing id.
    #[must_use]
    pub fn take(&self) -> Vec<FailureRecord> {
        let mut failures = std::mem::take(
            &mut *self
                .failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        failures.sort_by_key(|f| f.id);
        failures
    }
}

impl ErrorSink for CollectingSink {
    fn record(&self, failure: FailureRecord) {
        log::debug!("Download failed for listing {}: {}", failure.id, failure.message);
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn collects_from_many_threads() {
        let sink = Arc::new(CollectingSink::new());

        std::thread::scope(|s| {
            for t in 0..4_u64 {
                let sink = Arc::clone(&sink);
                s.spawn(move || {
                    for i in 0..10 {
                        sink.record(FailureRecord {
                            id: ListingId(t * 100 + i),
                            url: format!("https://cdn/{t}/{i}.jpg"),
                            message: "HTTP 404".to_string(),
                        });
                    }
                });
            }
        });

        assert_eq!(sink.len(), 40);
        let failures = sink.take();
        assert_eq!(failures.len(), 40);
        assert!(failures.windows(2).all(|w| w[0].id <= w[1].id));
        assert!(sink.is_empty());
    }
}
