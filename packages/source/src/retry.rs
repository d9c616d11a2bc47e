//! HTTP retry helpers for transient errors.
//!
//! The crawler and the catalog fetcher use [`send_json`] or [`send_text`]
//! instead of calling `reqwest::RequestBuilder::send()` directly, so every
//! page or reference-data request retries connection failures, timeouts,
//! HTTP 429 and HTTP 5xx with exponential backoff.
//!
//! The bulk image download path deliberately does *not* use these helpers:
//! it makes a single attempt per URL variant and reports `failed` instead.
//!
//! ```ignore
//! let brands: Vec<RawBrand> = retry::send_json(|| client.get(&url)).await?;
//! let html = retry::send_text(|| client.get(&page_url)).await?;
//! ```

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::SourceError;

/// Maximum number of retries for transient HTTP errors.
///
/// With exponential backoff (2s, 4s, 8s, 16s) the total wait before giving
/// up is 30 seconds.
const MAX_RETRIES: u32 = 4;

/// Maximum number of full re-fetches when the body cannot be read or
/// decoded (truncated or garbled response).
const MAX_BODY_RETRIES: u32 = 2;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Sends a request and decodes the response body as JSON into `T`.
///
/// The `build_request` closure is called on each attempt since
/// [`reqwest::RequestBuilder`] is consumed by `.send()`.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries, the
/// server returns a non-retryable status, or the body cannot be decoded
/// after all body retries.
#[allow(clippy::future_not_send)]
pub async fn send_json<T, F>(build_request: F) -> Result<T, SourceError>
where
    T: DeserializeOwned,
    F: Fn() -> reqwest::RequestBuilder,
{
    for body_attempt in 0..=MAX_BODY_RETRIES {
        let response = send_inner(&build_request, MAX_RETRIES).await?;
        let url = response.url().to_string();

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if body_attempt < MAX_BODY_RETRIES => {
                body_backoff(body_attempt, &url, &e.to_string()).await;
                continue;
            }
            Err(e) => return Err(SourceError::Http(e)),
        };

        match serde_json::from_str(&text) {
            Ok(value) => return Ok(value),
            Err(e) if body_attempt < MAX_BODY_RETRIES => {
                log::debug!("body preview: {}", preview(&text));
                body_backoff(body_attempt, &url, &e.to_string()).await;
            }
            Err(e) => {
                log::error!(
                    "JSON decode failed after {MAX_BODY_RETRIES} retries for {url}: {e}\n  \
                     received: {} bytes\n  \
                     body preview: {}",
                    text.len(),
                    preview(&text),
                );
                return Err(SourceError::Response {
                    message: format!("JSON decode failed for {url}: {e}"),
                });
            }
        }
    }

    unreachable!("send_json body retry loop exited without returning")
}

/// Sends a request and returns the response body as text.
///
/// Same retry behaviour as [`send_json`]; used for HTML listing pages.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries or the
/// body cannot be read after all body retries.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(build_request: F) -> Result<String, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    for body_attempt in 0..=MAX_BODY_RETRIES {
        let response = send_inner(&build_request, MAX_RETRIES).await?;
        let url = response.url().to_string();

        match response.text().await {
            Ok(text) => return Ok(text),
            Err(e) if body_attempt < MAX_BODY_RETRIES => {
                body_backoff(body_attempt, &url, &e.to_string()).await;
            }
            Err(e) => return Err(SourceError::Http(e)),
        }
    }

    unreachable!("send_text body retry loop exited without returning")
}

/// Core retry loop shared by [`send_json`] and [`send_text`].
///
/// Returns the first response with a non-error status.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(build_request: &F, max_retries: u32) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<SourceError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    last_error = Some(SourceError::Http(e));
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                let url = response.url().to_string();

                if is_retryable_status(status) {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status} from {url}");
                        last_error = Some(SourceError::Status {
                            url,
                            status: status.as_u16(),
                        });
                        continue;
                    }
                    return Err(SourceError::Status {
                        url,
                        status: status.as_u16(),
                    });
                }

                if status.is_client_error() || status.is_server_error() {
                    return Err(SourceError::Status {
                        url,
                        status: status.as_u16(),
                    });
                }

                return Ok(response);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| SourceError::Response {
        message: "request failed after all retries".to_string(),
    }))
}

/// Sleeps before a body re-fetch, logging why.
async fn body_backoff(body_attempt: u32, url: &str, error: &str) {
    let delay = Duration::from_secs(1u64 << (body_attempt + 1));
    log::warn!(
        "Body read/decode failed (retry {}/{MAX_BODY_RETRIES}) for {url}, re-fetching in {delay:?}: {error}",
        body_attempt + 1,
    );
    tokio::time::sleep(delay).await;
}

/// Returns at most [`BODY_PREVIEW_LEN`] bytes of `text`, cut on a char
/// boundary.
fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// 429 and 5xx are worth another attempt.
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}
