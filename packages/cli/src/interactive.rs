//! Menu shown when `autolot` is started without a subcommand.

use autolot_cli_utils::MultiProgress;
use autolot_source::config::PipelineConfig;
use dialoguer::{Confirm, Input, Select};

use crate::commands::{self, DownloadArgs};

enum Action {
    RunPipeline,
    Crawl,
    Catalog,
    Reconcile,
    Download,
    Restore,
}

impl Action {
    const ALL: &[Self] = &[
        Self::RunPipeline,
        Self::Crawl,
        Self::Catalog,
        Self::Reconcile,
        Self::Download,
        Self::Restore,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunPipeline => "Reconcile and download images",
            Self::Crawl => "Crawl listings",
            Self::Catalog => "Fetch brand & model catalog",
            Self::Reconcile => "Reconcile listings",
            Self::Download => "Download images",
            Self::Restore => "Restore sorted images",
        }
    }
}

/// Prompts for an action and runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the chosen stage fails.
pub async fn run(
    config: &PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("autolot listing pipeline");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::RunPipeline => {
            let args = prompt_download_args(config)?;
            commands::run(config, multi, &args).await?;
        }
        Action::Crawl => {
            let max_pages = prompt_optional_u32("Maximum pages (empty for no limit)")?;
            commands::crawl(config, multi, max_pages, None).await?;
        }
        Action::Catalog => commands::catalog(config, multi).await?,
        Action::Reconcile => {
            commands::reconcile_listings(
                config,
                &config.paths.listings(),
                &config.paths.annotated(),
            )?;
        }
        Action::Download => {
            let args = prompt_download_args(config)?;
            commands::download(config, multi, &args, &config.paths.annotated()).await?;
        }
        Action::Restore => {
            if confirm_restore()? {
                commands::restore(config)?;
            }
        }
    }

    Ok(())
}

/// Asks before moving every sorted image back.
///
/// # Errors
///
/// Returns an error if the prompt fails.
pub fn confirm_restore() -> Result<bool, Box<dyn std::error::Error>> {
    Ok(Confirm::new()
        .with_prompt("Move all sorted images back into the pictures tree?")
        .default(false)
        .interact()?)
}

fn prompt_download_args(
    config: &PipelineConfig,
) -> Result<DownloadArgs, Box<dyn std::error::Error>> {
    let workers: usize = Input::new()
        .with_prompt("Concurrent downloads")
        .default(config.download.workers)
        .interact_text()?;
    let rate: u32 = Input::new()
        .with_prompt("Requests per second")
        .default(config.download.requests_per_second)
        .interact_text()?;

    Ok(DownloadArgs {
        workers: Some(workers),
        rate: Some(rate),
        ..DownloadArgs::default()
    })
}

/// Prompts for an optional `u32` value.
///
/// Returns `None` if the input is empty.
fn prompt_optional_u32(prompt: &str) -> Result<Option<u32>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    if input.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(input.trim().parse()?))
    }
}
