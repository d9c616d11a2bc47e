#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Annotates listing records with brand, model, and vehicle type.
//!
//! [`reconcile`] runs the [`matcher`] over every record's title and tallies
//! how many titles could not be resolved. Records without a title are
//! counted and left untouched.

pub mod matcher;

pub use matcher::{TitleMatch, match_brand, match_model, match_title};

use autolot_catalog_models::{BrandCatalog, ModelCatalog};
use autolot_listing_models::{ListingRecord, Resolved};
use serde::Serialize;

/// Match-rate counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Records seen.
    pub total: u64,
    /// Records whose title matched no brand.
    pub unknown_brand: u64,
    /// Records with a brand but no model.
    pub unknown_model: u64,
    /// Records skipped for a missing or empty title.
    pub missing_fields: u64,
}

impl ReconcileStats {
    /// Records with a matched brand.
    #[must_use]
    pub const fn known_brands(&self) -> u64 {
        self.total
            .saturating_sub(self.unknown_brand)
            .saturating_sub(self.missing_fields)
    }

    /// Unknown brands as a percentage of all records.
    #[must_use]
    pub fn unknown_brand_pct(&self) -> f64 {
        percent(self.unknown_brand, self.total)
    }

    /// Unknown models as a percentage of all records.
    #[must_use]
    pub fn unknown_model_pct(&self) -> f64 {
        percent(self.unknown_model, self.total)
    }

    /// Logs the summary at `info` level.
    pub fn log_summary(&self) {
        log::info!("Processing complete. Total vehicles: {}", self.total);
        log::info!("Vehicles with known brands: {}", self.known_brands());
        log::info!("Vehicles with unknown brands: {}", self.unknown_brand);
        log::info!("Vehicles with unknown models: {}", self.unknown_model);
        log::info!("Vehicles with missing fields: {}", self.missing_fields);
        log::info!(
            "Percentage of unknown brands: {:.2}%",
            self.unknown_brand_pct()
        );
        log::info!(
            "Percentage of unknown models: {:.2}%",
            self.unknown_model_pct()
        );
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Annotates every record and returns them with the match statistics.
///
/// Each record with a title gets `Brand`, `Model`, and `VehicleType` set,
/// using [`Resolved::Unknown`] for whatever did not match. An unknown brand
/// counts only toward `unknown_brand`.
#[must_use]
pub fn reconcile(
    mut records: Vec<ListingRecord>,
    brands: &BrandCatalog,
    models: &ModelCatalog,
) -> (Vec<ListingRecord>, ReconcileStats) {
    let mut stats = ReconcileStats {
        total: records.len() as u64,
        ..ReconcileStats::default()
    };

    for record in &mut records {
        let Some(title) = record.title_text() else {
            log::error!("Missing or empty 'Title' field in record {}", id_label(record));
            stats.missing_fields += 1;
            continue;
        };

        let found = match_title(title, brands, models);

        match (found.brand, found.model) {
            (None, _) => {
                stats.unknown_brand += 1;
                log::warn!("Unknown brand for vehicle: {title} {}", id_label(record));
            }
            (Some(brand), None) => {
                stats.unknown_model += 1;
                log::warn!("No matching model found for: {title} (Brand: {})", brand.name);
            }
            (Some(_), Some(_)) => {}
        }

        let brand = Resolved::from(found.brand.map(|b| b.name.clone()));
        let model = Resolved::from(found.model.map(|m| m.name.clone()));
        let category = Resolved::from(found.category);
        record.annotate(brand, model, category);
    }

    (records, stats)
}

fn id_label(record: &ListingRecord) -> String {
    record
        .id
        .map_or_else(|| "(ID: Missing)".to_string(), |id| format!("(ID: {id})"))
}
