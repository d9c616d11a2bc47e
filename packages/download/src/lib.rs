#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bulk download of listing images into a content-addressed tree.
//!
//! An image's location is a pure function of its listing id
//! ([`paths::destination_path`]), which makes a download run idempotent:
//! [`plan::plan_downloads`] skips every image already on disk, and
//! [`run::run_downloads`] fetches the rest through a bounded worker pool
//! that shares one global [`rate_limit::RequestThrottle`].
//!
//! [`restore`] moves images that a classification pass sorted into
//! separate trees back to their canonical location.

pub mod fetch;
pub mod paths;
pub mod plan;
pub mod rate_limit;
pub mod restore;
pub mod run;
pub mod sink;

pub use fetch::{DownloadStatus, Fetcher, HttpImageClient, ImageClient};
pub use plan::{DownloadPlan, DownloadTask, plan_downloads};
pub use rate_limit::RequestThrottle;
pub use run::{DownloadSummary, run_downloads};
pub use sink::{CollectingSink, ErrorSink, FailureRecord, LogSink};

/// Errors that abort a download stage as a whole.
///
/// Per-image problems never surface here; they become
/// [`DownloadStatus::Failed`] and an [`ErrorSink`] entry.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Listing a destination or source directory failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl DownloadError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
