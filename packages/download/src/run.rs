//! Bounded-concurrency download run.

use std::future::Future;
use std::sync::Arc;

use autolot_source::progress::ProgressCallback;
use futures::stream::{self, StreamExt as _};
use serde::Serialize;

use crate::fetch::{DownloadStatus, Fetcher, ImageClient};
use crate::plan::DownloadPlan;

/// Per-status counts for one download run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    pub downloaded: u64,
    pub exists: u64,
    pub failed: u64,
    pub no_id: u64,
    pub no_url: u64,
    /// Tasks never started because the run was interrupted.
    pub not_started: u64,
}

impl DownloadSummary {
    /// Seeds a summary with the records the planner filtered out.
    #[must_use]
    pub const fn from_plan(plan: &DownloadPlan) -> Self {
        Self {
            downloaded: 0,
            exists: plan.existing,
            failed: 0,
            no_id: plan.no_id,
            no_url: plan.no_url,
            not_started: 0,
        }
    }

    /// Counts one task outcome.
    pub fn record(&mut self, status: DownloadStatus) {
        match status {
            DownloadStatus::Downloaded => self.downloaded += 1,
            DownloadStatus::Exists => self.exists += 1,
            DownloadStatus::Failed => self.failed += 1,
            DownloadStatus::NoId => self.no_id += 1,
            DownloadStatus::NoUrl => self.no_url += 1,
        }
    }

    /// Count for one status.
    #[must_use]
    pub const fn count(&self, status: DownloadStatus) -> u64 {
        match status {
            DownloadStatus::Downloaded => self.downloaded,
            DownloadStatus::Exists => self.exists,
            DownloadStatus::Failed => self.failed,
            DownloadStatus::NoId => self.no_id,
            DownloadStatus::NoUrl => self.no_url,
        }
    }

    /// All records accounted for, including unstarted tasks.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.downloaded + self.exists + self.failed + self.no_id + self.no_url + self.not_started
    }

    /// Share of `status` among all records, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self, status: DownloadStatus) -> f64 {
        let count = self.count(status);
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        }
    }

    /// Logs the summary at `info` level.
    pub fn log_summary(&self) {
        log::info!("Download complete. Total records: {}", self.total());
        for status in [
            DownloadStatus::Downloaded,
            DownloadStatus::Exists,
            DownloadStatus::Failed,
            DownloadStatus::NoId,
            DownloadStatus::NoUrl,
        ] {
            log::info!(
                "  {status}: {} ({:.2}%)",
                self.count(status),
                self.percent(status)
            );
        }
        if self.not_started > 0 {
            log::warn!("  not started: {}", self.not_started);
        }
    }
}

/// Runs every planned task with at most `workers` in flight.
///
/// When `shutdown` completes no further tasks are started; tasks already
/// in flight run to completion and the rest are counted as
/// `not_started`.
pub async fn run_downloads<C, S>(
    fetcher: &Fetcher<C>,
    plan: DownloadPlan,
    workers: usize,
    progress: Arc<dyn ProgressCallback>,
    shutdown: S,
) -> DownloadSummary
where
    C: ImageClient,
    S: Future<Output = ()>,
{
    let mut summary = DownloadSummary::from_plan(&plan);
    let total = plan.tasks.len() as u64;

    progress.set_total(total);
    log::info!(
        "Downloading {total} image(s) with {} worker(s)...",
        workers.max(1)
    );

    let mut finished = 0_u64;
    let mut outcomes = std::pin::pin!(
        stream::iter(plan.tasks.iter())
            .take_until(shutdown)
            .map(|task| fetcher.fetch(task))
            .buffer_unordered(workers.max(1))
    );

    while let Some(status) = outcomes.next().await {
        summary.record(status);
        finished += 1;
        progress.inc(1);
    }

    summary.not_started = total - finished;
    if summary.not_started > 0 {
        log::warn!(
            "Interrupted: {} task(s) were not started",
            summary.not_started
        );
        progress.finish(format!("Interrupted after {finished}/{total}"));
    } else {
        progress.finish(format!("{} downloaded, {} failed", summary.downloaded, summary.failed));
    }

    summary
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use autolot_listing_models::{ListingId, ListingRecord};
    use autolot_source::progress::null_progress;

    use super::*;
    use crate::fetch::tests::{FakeClient, fetcher, fetcher_at};
    use crate::plan::plan_downloads;
    use crate::rate_limit::tests::busiest_second;

    fn records(count: u64) -> (Vec<ListingRecord>, FakeClient) {
        let mut client = FakeClient::default();
        let mut records = Vec::new();
        for id in 1..=count {
            let url = format!("https://cdn/car__{id}bx.jpg");
            if id % 10 != 0 {
                client = client.with(&format!("https://cdn/car__{id}hd.jpg"), Ok(b"jpeg"));
            }
            records.push(ListingRecord {
                id: Some(ListingId(id)),
                image_url: Some(url),
                ..ListingRecord::default()
            });
        }
        records.push(ListingRecord::default());
        (records, client)
    }

    #[tokio::test]
    async fn tallies_every_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let (records, client) = records(30);
        let (fetcher, sink) = fetcher(client);

        let plan = plan_downloads(&records, dir.path()).unwrap();
        let summary = run_downloads(
            &fetcher,
            plan,
            8,
            null_progress(),
            std::future::pending(),
        )
        .await;

        assert_eq!(summary.downloaded, 27);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.no_id, 1);
        assert_eq!(summary.total(), 31);
        assert_eq!(sink.len(), 3);

        // A second run only retries the failures.
        let plan = plan_downloads(&records, dir.path()).unwrap();
        assert_eq!(plan.existing, 27);
        assert_eq!(plan.tasks.len(), 3);
    }

    #[tokio::test]
    async fn shutdown_stops_new_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let (records, mut client) = records(40);
        client.delay = Duration::from_millis(50);
        let (fetcher, _) = fetcher(client);

        let plan = plan_downloads(&records, dir.path()).unwrap();
        let summary = run_downloads(
            &fetcher,
            plan,
            2,
            null_progress(),
            tokio::time::sleep(Duration::from_millis(120)),
        )
        .await;

        assert!(summary.not_started > 0);
        assert!(summary.downloaded + summary.failed < 40);
        assert_eq!(
            summary.downloaded + summary.failed + summary.not_started,
            40
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn workers_share_one_request_budget() {
        let dir = tempfile::tempdir().unwrap();
        let (records, mut client) = records(100);
        client.delay = Duration::from_millis(30);
        let stamps = Arc::clone(&client.stamps);
        let (fetcher, _) = fetcher_at(client, 20);

        let plan = plan_downloads(&records, dir.path()).unwrap();
        let summary = run_downloads(
            &fetcher,
            plan,
            20,
            null_progress(),
            std::future::pending(),
        )
        .await;

        assert_eq!(summary.downloaded + summary.failed, 100);
        let stamps = stamps.lock().unwrap().clone();
        assert_eq!(stamps.len(), 100);
        assert!(busiest_second(&stamps) <= 20);
    }

    #[test]
    fn percentages_include_skipped_records() {
        let summary = DownloadSummary {
            downloaded: 6,
            exists: 2,
            failed: 1,
            no_id: 1,
            ..DownloadSummary::default()
        };
        assert!((summary.percent(DownloadStatus::Downloaded) - 60.0).abs() < 1e-9);
        assert!(DownloadSummary::default().percent(DownloadStatus::Failed).abs() < f64::EPSILON);
    }
}
