//! Pipeline stages as invoked from the command line.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use autolot_catalog::{load_brand_catalog, load_model_catalog};
use autolot_cli_utils::{IndicatifProgress, MultiProgress, detail, headline};
use autolot_download::restore::{RestoreSummary, restore_sorted_images};
use autolot_download::{
    CollectingSink, DownloadSummary, ErrorSink, Fetcher, HttpImageClient, LogSink,
    RequestThrottle, plan_downloads, run_downloads,
};
use autolot_reconcile::{ReconcileStats, reconcile};
use autolot_source::config::PipelineConfig;
use autolot_source::records::{load_listings, save_listings, write_json};
use clap::Args;

use crate::report::RunReport;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Options shared by `download` and `run`.
#[derive(Debug, Clone, Default, Args)]
pub struct DownloadArgs {
    /// Maximum concurrent downloads (overrides `download.workers`)
    #[arg(long)]
    pub workers: Option<usize>,
    /// Requests allowed per rolling second (overrides
    /// `download.requests_per_second`)
    #[arg(long)]
    pub rate: Option<u32>,
    /// Write a JSON run summary to this file
    #[arg(long)]
    pub summary: Option<PathBuf>,
    /// Write failed downloads (id, url, message) as JSON to this file
    #[arg(long)]
    pub errors: Option<PathBuf>,
}

impl DownloadArgs {
    /// Applies the flag overrides to `config` and re-validates it.
    fn apply(&self, config: &mut PipelineConfig) -> CliResult<()> {
        if let Some(workers) = self.workers {
            config.download.workers = workers;
        }
        if let Some(rate) = self.rate {
            config.download.requests_per_second = rate;
        }
        config.validate()?;
        Ok(())
    }
}

/// Crawls listing pages and writes the records to `output`.
pub async fn crawl(
    config: &PipelineConfig,
    multi: &MultiProgress,
    max_pages: Option<u32>,
    output: Option<PathBuf>,
) -> CliResult<()> {
    let mut settings = config.crawl.clone();
    if max_pages.is_some() {
        settings.max_pages = max_pages;
    }
    let output = output.unwrap_or_else(|| config.paths.listings());

    headline("Crawling listings");
    detail("Start", &settings.start_url);

    let client = autolot_source::build_http_client()?;
    let bar = IndicatifProgress::pages_bar(multi, "Crawling");
    let records = autolot_crawl::crawl(&client, &settings, bar).await?;

    save_listings(&output, &records)?;
    log::info!("Wrote {} listing(s) to {}", records.len(), output.display());
    Ok(())
}

/// Downloads any missing brand and model lists.
pub async fn catalog(config: &PipelineConfig, multi: &MultiProgress) -> CliResult<()> {
    headline("Fetching brand and model catalog");

    let client = autolot_source::build_http_client()?;
    let bar = IndicatifProgress::steps_bar(multi, "Brands");
    let summary =
        autolot_catalog::fetch_catalog(&client, &config.catalog, &config.paths, bar).await?;

    detail("Brands", summary.brands);
    detail("Brand lists downloaded", summary.brand_lists_downloaded);
    detail("Model lists downloaded", summary.model_lists_downloaded);
    detail("Reused from disk", summary.reused);
    if summary.failed > 0 {
        log::warn!("{} list(s) could not be downloaded", summary.failed);
    }
    Ok(())
}

/// Annotates listings with brand, model, and vehicle type.
pub fn reconcile_listings(
    config: &PipelineConfig,
    input: &Path,
    output: &Path,
) -> CliResult<ReconcileStats> {
    headline("Reconciling listings");

    let brands = load_brand_catalog(&config.paths.brands())?;
    let models = load_model_catalog(&config.paths.models_dir(), &brands)?;
    log::info!(
        "Loaded {} brand(s) and {} model list(s)",
        brands.len(),
        models.list_count()
    );

    let records = load_listings(input)?;
    let (records, stats) = reconcile(records, &brands, &models);

    save_listings(output, &records)?;
    log::info!("Updated data saved to {}", output.display());
    stats.log_summary();
    Ok(stats)
}

/// Downloads every missing listing image under the pictures root.
pub async fn download(
    config: &PipelineConfig,
    multi: &MultiProgress,
    args: &DownloadArgs,
    input: &Path,
) -> CliResult<DownloadSummary> {
    let mut config = config.clone();
    args.apply(&mut config)?;
    let settings = &config.download;
    let root = config.paths.pictures();

    headline("Downloading listing images");
    detail("Input", input.display());
    detail("Destination", root.display());
    detail("Workers", settings.workers);
    detail("Requests per second", settings.requests_per_second);

    let records = load_listings(input)?;
    let plan = plan_downloads(&records, &root)?;

    let rate = NonZeroU32::new(settings.requests_per_second)
        .ok_or("download.requests_per_second must be at least 1")?;
    let throttle = Arc::new(RequestThrottle::per_second(rate));

    let collector = args.errors.as_ref().map(|_| Arc::new(CollectingSink::new()));
    let sink: Arc<dyn ErrorSink> = match &collector {
        Some(collector) => Arc::clone(collector) as Arc<dyn ErrorSink>,
        None => Arc::new(LogSink),
    };

    let client = HttpImageClient::new(Duration::from_secs(settings.timeout_secs))?;
    let fetcher = Fetcher::new(client, throttle, sink)
        .with_suffixes(&settings.primary_suffix, &settings.fallback_suffix);

    let bar = IndicatifProgress::download_bar(multi, "Images");
    let summary = run_downloads(&fetcher, plan, settings.workers, bar, shutdown_signal()).await;
    summary.log_summary();

    if let (Some(path), Some(collector)) = (&args.errors, &collector) {
        let failures = collector.take();
        write_json(path, &failures)?;
        log::info!(
            "Wrote {} download error(s) to {}",
            failures.len(),
            path.display()
        );
    }

    Ok(summary)
}

/// Moves classified images back into the pictures tree.
pub fn restore(config: &PipelineConfig) -> CliResult<RestoreSummary> {
    headline("Restoring sorted images");

    let sources = [
        config.paths.valid_pictures(),
        config.paths.invalid_pictures(),
    ];
    let summary = restore_sorted_images(&sources, &config.paths.pictures())?;

    detail("Moved", summary.moved);
    detail("Errors", summary.errors);
    detail("Empty directories removed", summary.removed_dirs);
    Ok(summary)
}

/// Reconciles the crawled listings, then downloads their images.
pub async fn run(
    config: &PipelineConfig,
    multi: &MultiProgress,
    args: &DownloadArgs,
) -> CliResult<()> {
    let start = Instant::now();
    let annotated = config.paths.annotated();

    log::info!("[1/2] Reconciling...");
    let stats = reconcile_listings(config, &config.paths.listings(), &annotated)?;

    log::info!("[2/2] Downloading images...");
    let summary = download(config, multi, args, &annotated).await?;

    let elapsed = start.elapsed();
    log::info!("Pipeline complete in {:.1}s", elapsed.as_secs_f64());

    if let Some(path) = &args.summary {
        RunReport::new(elapsed.as_secs_f64())
            .with_reconcile(stats)
            .with_download(summary)
            .write(path)?;
    }
    Ok(())
}

/// Completes on the first Ctrl-C. If the handler cannot be installed the
/// future never completes.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Could not listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    log::warn!("Interrupt received. Finishing in-flight downloads...");
}
