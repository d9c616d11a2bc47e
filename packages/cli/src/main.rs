#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the autolot listing pipeline.
//!
//! Each stage is a subcommand; running `autolot` without one opens an
//! interactive menu. Uses `indicatif-log-bridge` (via
//! [`autolot_cli_utils::init_logger`]) so that log lines and progress bars
//! never fight for the terminal.

mod commands;
mod interactive;
mod report;

use std::path::PathBuf;
use std::time::Instant;

use autolot_source::config::PipelineConfig;
use clap::{Parser, Subcommand};

use crate::commands::DownloadArgs;
use crate::report::RunReport;

#[derive(Parser)]
#[command(name = "autolot", about = "Used-vehicle listing pipeline")]
struct Cli {
    /// TOML file overriding the built-in configuration (also
    /// `AUTOLOT_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl marketplace listing pages into the listings file
    Crawl {
        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<u32>,
        /// Output file (defaults to `paths.listings`)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Download missing brand and model reference lists
    Catalog,
    /// Annotate listings with brand, model, and vehicle type
    Reconcile {
        /// Input listings (defaults to `paths.listings`)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output file (defaults to `paths.annotated`)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write a JSON run summary to this file
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Download listing images into the pictures tree
    Download {
        /// Input listings (defaults to `paths.annotated`)
        #[arg(long)]
        input: Option<PathBuf>,
        #[command(flatten)]
        args: DownloadArgs,
    },
    /// Move classified images back into the pictures tree
    Restore {
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// Reconcile the crawled listings, then download their images
    Run {
        #[command(flatten)]
        args: DownloadArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = autolot_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref())?;
    log::debug!("Data directory: {}", config.paths.data_dir.display());

    let Some(command) = cli.command else {
        return interactive::run(&config, &multi).await;
    };

    match command {
        Commands::Crawl { max_pages, output } => {
            commands::crawl(&config, &multi, max_pages, output).await?;
        }
        Commands::Catalog => commands::catalog(&config, &multi).await?,
        Commands::Reconcile {
            input,
            output,
            summary,
        } => {
            let start = Instant::now();
            let input = input.unwrap_or_else(|| config.paths.listings());
            let output = output.unwrap_or_else(|| config.paths.annotated());
            let stats = commands::reconcile_listings(&config, &input, &output)?;
            if let Some(path) = summary {
                RunReport::new(start.elapsed().as_secs_f64())
                    .with_reconcile(stats)
                    .write(&path)?;
            }
        }
        Commands::Download { input, args } => {
            let start = Instant::now();
            let input = input.unwrap_or_else(|| config.paths.annotated());
            let summary = commands::download(&config, &multi, &args, &input).await?;
            if let Some(path) = &args.summary {
                RunReport::new(start.elapsed().as_secs_f64())
                    .with_download(summary)
                    .write(path)?;
            }
        }
        Commands::Restore { yes } => {
            if yes || interactive::confirm_restore()? {
                commands::restore(&config)?;
            } else {
                println!("Restore cancelled.");
            }
        }
        Commands::Run { args } => commands::run(&config, &multi, &args).await?,
    }

    Ok(())
}
