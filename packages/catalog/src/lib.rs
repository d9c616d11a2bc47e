#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Brand and model reference catalog.
//!
//! [`loader`] reads the combined brand catalog and the per-brand,
//! per-category model lists from the data directory. [`fetch`] downloads
//! those files from the marketplace reference API when they are missing.

pub mod fetch;
pub mod loader;

pub use fetch::{FetchSummary, fetch_catalog};
pub use loader::{load_brand_catalog, load_model_catalog, model_file_name, sanitize_filename};

use autolot_source::SourceError;

/// Errors that can occur while loading or fetching the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Reading, decoding, or downloading a reference file failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A model list file exists but does not decode.
    #[error("Invalid model list {path}: {source}")]
    ModelList {
        /// Path of the offending file.
        path: String,
        /// Underlying decode error.
        source: SourceError,
    },
}
