#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Marketplace listing crawler.
//!
//! Starting from the configured listing page, [`crawl`] extracts every
//! listing card and follows the "next page" link until there is none or the
//! page limit is reached.

pub mod parse;

pub use parse::{ListingPage, ListingParser};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use autolot_listing_models::ListingRecord;
use autolot_source::SourceError;
use autolot_source::config::CrawlSettings;
use autolot_source::progress::ProgressCallback;
use autolot_source::retry;

/// Errors that can occur while crawling.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// Fetching a page failed after all retries.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A CSS selector failed to compile.
    #[error("Selector error: {0}")]
    Selector(String),

    /// A page URL could not be parsed.
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        message: String,
    },
}

/// Crawls listing pages and returns every record found.
///
/// A page that fails after the first one ends the crawl early with the
/// records collected so far.
///
/// # Errors
///
/// Returns [`CrawlError`] if the first page cannot be fetched or parsed.
pub async fn crawl(
    client: &reqwest::Client,
    settings: &CrawlSettings,
    progress: Arc<dyn ProgressCallback>,
) -> Result<Vec<ListingRecord>, CrawlError> {
    let parser = ListingParser::new()?;
    let mut records = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(settings.start_url.clone());
    let mut pages = 0_u32;

    if let Some(max) = settings.max_pages {
        progress.set_total(u64::from(max));
    }

    while let Some(url) = next.take() {
        if !visited.insert(url.clone()) {
            log::warn!("Pagination loops back to {url}, stopping");
            break;
        }

        let html = match retry::send_text(|| client.get(&url)).await {
            Ok(html) => html,
            Err(e) if pages > 0 => {
                log::error!("Failed to fetch {url}: {e}. Keeping {} record(s)", records.len());
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let page = parser.parse(&html, &url)?;
        pages += 1;
        log::info!("Page {pages}: {} listing(s) from {url}", page.records.len());
        records.extend(page.records);

        progress.inc(1);
        progress.set_message(format!("{} listings", records.len()));

        if settings.max_pages.is_some_and(|max| pages >= max) {
            log::info!("Reached page limit ({pages})");
            break;
        }

        next = page.next_page;
        if next.is_some() && settings.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(settings.delay_ms)).await;
        }
    }

    progress.finish(format!("{} listing(s) from {pages} page(s)", records.len()));
    Ok(records)
}
