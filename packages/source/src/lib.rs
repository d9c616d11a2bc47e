#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared plumbing for the autolot pipeline stages.
//!
//! Every stage that talks to the marketplace or touches the flat-file data
//! directory goes through this crate: the HTTP client and retry helpers
//! ([`retry`]), pipeline configuration ([`config`]), progress reporting
//! ([`progress`]), and JSON file I/O for listing records ([`records`]).

pub mod config;
pub mod progress;
pub mod records;
pub mod retry;

use std::time::Duration;

/// User agent sent with every marketplace request.
pub const USER_AGENT: &str = "autolot/0.1 (+https://github.com/BSteffaniak/autolot)";

/// Per-request timeout for marketplace requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur while fetching or persisting pipeline data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a status we do not retry.
    #[error("HTTP {status} for {url}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The response could not be used after all retries.
    #[error("Bad response: {message}")]
    Response {
        /// Description of what went wrong.
        message: String,
    },
}

impl SourceError {
    /// Wraps an I/O error with the path it occurred at.
    #[must_use]
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Builds the shared [`reqwest::Client`] used for marketplace requests.
///
/// # Errors
///
/// Returns [`SourceError::Http`] if the TLS backend cannot be initialized.
pub fn build_http_client() -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(SourceError::Http)
}
