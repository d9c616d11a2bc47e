#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the autolot pipeline.
//!
//! Provides `indicatif`-backed progress bars behind the [`ProgressCallback`]
//! trait, plus [`init_logger`] which sets up `indicatif-log-bridge` so that
//! `log::info!` and friends are suspended while progress bars redraw.
//!
//! When stderr is not a terminal, [`pages_bar`](IndicatifProgress::pages_bar)
//! and friends fall back to [`LogProgress`] so cron and CI logs get periodic
//! progress lines instead of escape codes.

use std::sync::Arc;
use std::time::Duration;

use autolot_source::progress::{LogProgress, ProgressCallback};
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Log a line every this many downloads when no terminal is attached.
const LOG_EVERY_DOWNLOADS: u64 = 500;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once `set_total()` provides a known length.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Progress for the listing crawl. Starts as a spinner since the page
    /// count is usually unknown, and becomes a bar if a page limit is set.
    #[must_use]
    pub fn pages_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        if !is_terminal() {
            return LogProgress::new(message, 10);
        }

        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {prefix} {wide_bar:.cyan/dim} {pos}/{len} pages {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }

    /// Progress over a list whose length is reported later, e.g. the
    /// brands of one category while fetching the catalog.
    #[must_use]
    pub fn steps_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        if !is_terminal() {
            return LogProgress::new(message, 50);
        }

        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }

    /// Progress for a bulk image download, with throughput and ETA.
    #[must_use]
    pub fn download_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        if !is_terminal() {
            return LogProgress::new(message, LOG_EVERY_DOWNLOADS);
        }

        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.yellow} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.yellow/dim} {pos}/{len} {percent}% {per_sec} [{eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        // Switch from spinner to bar style now that we know the total.
        self.bar.set_style(self.bar_style.clone());
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Whether stderr, where bars are drawn, is an interactive terminal.
#[must_use]
pub fn is_terminal() -> bool {
    Term::stderr().is_term()
}

/// Prints a bold section heading to stdout.
pub fn headline(text: &str) {
    println!("{}", style(text).bold().cyan());
}

/// Prints a dimmed `label: value` line to stdout.
pub fn detail(label: &str, value: impl std::fmt::Display) {
    println!("  {} {value}", style(format!("{label}:")).dim());
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    // Build the pretty-env-logger logger manually so we can wrap it.
    // `RUST_LOG` overrides the `info` default.
    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Ignore error if logger was already set (e.g., in tests)

    log::set_max_level(level);

    multi
}
