//! Single-image retrieval.
//!
//! Listing thumbnails end in two word characters before `.jpg`
//! (`...__36281654bx.jpg`). Swapping those for `hd` yields the full-size
//! image; when the full-size variant answers with a server error the `f`
//! variant is tried instead. There are no other retries: a failed image is
//! reported and picked up again by the next run.

use std::borrow::Cow;
use std::future::Future;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use autolot_source::USER_AGENT;
use regex::{NoExpand, Regex};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::DownloadError;
use crate::plan::DownloadTask;
use crate::rate_limit::RequestThrottle;
use crate::sink::{ErrorSink, FailureRecord};

static VARIANT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w{2}\.jpg$").expect("valid regex"));

/// Outcome of one listing's image download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DownloadStatus {
    Downloaded,
    Exists,
    Failed,
    NoId,
    NoUrl,
}

/// Why an image request failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The request or body transfer failed.
    #[error("Request for {url} failed: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Error description.
        message: String,
    },
}

impl FetchError {
    /// Returns `true` for HTTP 5xx answers, the only failure that triggers
    /// the fallback variant.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status >= 500)
    }
}

/// Fetches a URL and returns the full response body.
pub trait ImageClient: Send + Sync {
    fn fetch_bytes(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// [`ImageClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpImageClient {
    client: reqwest::Client,
}

impl HttpImageClient {
    /// Builds a client with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the TLS backend cannot be
    /// initialized.
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl ImageClient for HttpImageClient {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }
}

/// Replaces the two word characters before a trailing `.jpg` with
/// `suffix`. Other URLs are returned unchanged.
#[must_use]
pub fn image_url_variant<'a>(url: &'a str, suffix: &str) -> Cow<'a, str> {
    let replacement = format!("{suffix}.jpg");
    VARIANT_SUFFIX.replace(url, NoExpand(&replacement))
}

/// Downloads task images through a shared throttle.
pub struct Fetcher<C> {
    client: C,
    throttle: Arc<RequestThrottle>,
    errors: Arc<dyn ErrorSink>,
    primary_suffix: String,
    fallback_suffix: String,
}

impl<C: ImageClient> Fetcher<C> {
    /// Creates a fetcher using the `hd` and `f` URL variants.
    pub fn new(client: C, throttle: Arc<RequestThrottle>, errors: Arc<dyn ErrorSink>) -> Self {
        Self {
            client,
            throttle,
            errors,
            primary_suffix: "hd".to_string(),
            fallback_suffix: "f".to_string(),
        }
    }

    /// Overrides the primary and fallback URL variant suffixes.
    #[must_use]
    pub fn with_suffixes(mut self, primary: &str, fallback: &str) -> Self {
        self.primary_suffix = primary.to_string();
        self.fallback_suffix = fallback.to_string();
        self
    }

    /// Downloads one task's image.
    ///
    /// Never returns an error: every failure is reported to the error sink
    /// and becomes [`DownloadStatus::Failed`].
    pub async fn fetch(&self, task: &DownloadTask) -> DownloadStatus {
        if tokio::fs::try_exists(&task.destination)
            .await
            .unwrap_or(false)
        {
            return DownloadStatus::Exists;
        }

        let body = match self.attempt(&task.url, &self.primary_suffix).await {
            Ok(body) => body,
            Err(e) if e.is_server_error() && VARIANT_SUFFIX.is_match(&task.url) => {
                log::debug!("{e}, trying '{}' variant", self.fallback_suffix);
                match self.attempt(&task.url, &self.fallback_suffix).await {
                    Ok(body) => body,
                    Err(e) => return self.fail(task, e.to_string()),
                }
            }
            Err(e) => return self.fail(task, e.to_string()),
        };

        let destination = task.destination.clone();
        match tokio::task::spawn_blocking(move || publish(&destination, &body)).await {
            Ok(Ok(true)) => DownloadStatus::Downloaded,
            Ok(Ok(false)) => DownloadStatus::Exists,
            Ok(Err(e)) => self.fail(
                task,
                format!("write to {} failed: {e}", task.destination.display()),
            ),
            Err(e) => self.fail(task, format!("write task failed: {e}")),
        }
    }

    async fn attempt(&self, url: &str, suffix: &str) -> Result<Vec<u8>, FetchError> {
        let variant = image_url_variant(url, suffix);
        self.throttle.acquire().await;
        self.client.fetch_bytes(&variant).await
    }

    fn fail(&self, task: &DownloadTask, message: String) -> DownloadStatus {
        self.errors.record(FailureRecord {
            id: task.id,
            url: task.url.clone(),
            message,
        });
        DownloadStatus::Failed
    }
}

/// Writes `body` next to `destination` and links it into place without
/// replacing an existing file.
///
/// Returns `Ok(false)` when another writer published first.
fn publish(destination: &Path, body: &[u8]) -> std::io::Result<bool> {
    let dir: PathBuf = destination
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;

    match tmp.persist_noclobber(destination) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}
