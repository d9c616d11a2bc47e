//! JSON run summary written with `--summary`.

use std::collections::BTreeMap;
use std::path::Path;

use autolot_download::{DownloadStatus, DownloadSummary};
use autolot_reconcile::ReconcileStats;
use autolot_source::SourceError;
use autolot_source::records::write_json;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary of one `reconcile`, `download`, or `run` invocation.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub completed_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile: Option<ReconcileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadReport>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    #[serde(flatten)]
    pub counts: ReconcileStats,
    pub unknown_brand_pct: f64,
    pub unknown_model_pct: f64,
}

#[derive(Debug, Serialize)]
pub struct DownloadReport {
    #[serde(flatten)]
    pub counts: DownloadSummary,
    pub total: u64,
    /// Share of each status among all records, keyed by status name.
    pub percentages: BTreeMap<DownloadStatus, f64>,
}

impl From<ReconcileStats> for ReconcileReport {
    fn from(counts: ReconcileStats) -> Self {
        Self {
            counts,
            unknown_brand_pct: counts.unknown_brand_pct(),
            unknown_model_pct: counts.unknown_model_pct(),
        }
    }
}

impl From<DownloadSummary> for DownloadReport {
    fn from(counts: DownloadSummary) -> Self {
        let percentages = [
            DownloadStatus::Downloaded,
            DownloadStatus::Exists,
            DownloadStatus::Failed,
            DownloadStatus::NoId,
            DownloadStatus::NoUrl,
        ]
        .into_iter()
        .map(|status| (status, counts.percent(status)))
        .collect();

        Self {
            counts,
            total: counts.total(),
            percentages,
        }
    }
}

impl RunReport {
    #[must_use]
    pub fn new(elapsed_secs: f64) -> Self {
        Self {
            completed_at: Utc::now(),
            elapsed_secs,
            reconcile: None,
            download: None,
        }
    }

    #[must_use]
    pub fn with_reconcile(mut self, stats: ReconcileStats) -> Self {
        self.reconcile = Some(stats.into());
        self
    }

    #[must_use]
    pub fn with_download(mut self, summary: DownloadSummary) -> Self {
        self.download = Some(summary.into());
        self
    }

    /// Writes the report as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), SourceError> {
        write_json(path, self)?;
        log::info!("Wrote run summary to {}", path.display());
        Ok(())
    }
}
