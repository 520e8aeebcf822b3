//! # AA Crawler
//!
//! Collects Anadolu Agency news articles in two sequential phases: search
//! metadata behind an anti-forgery token, then the article bodies.
//!
//! ## Usage
//!
//! ```sh
//! aa_crawler --edition en metadata -n 50 -o data/aa_metadata_en.jsonl
//! aa_crawler --edition en bodies -i data/aa_metadata_en.jsonl -o data/aa_bodies_en.jsonl
//! ```
//!
//! ## Architecture
//!
//! 1. **Session**: fetch the search page, keep its cookies and token
//! 2. **Metadata**: POST the search form page by page, append raw documents
//! 3. **Bodies**: GET each article page, extract the text, append one record
//!    per article and resume from that output on the next run
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod error;
mod extract;
mod http;
mod models;
mod outputs;
mod pacing;
mod scrapers;
mod session;
mod site;
mod utils;

use cli::{Cli, Command};
use config::Settings;
use scrapers::bodies::{load_stubs, window, DetailFetcher};
use scrapers::metadata::MetadataCrawler;
use utils::{default_metadata_path, ensure_writable_dir, output_dir};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("aa_crawler starting up");

    // Parse CLI, then layer it over the config file
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");
    let mut settings = Settings::load_optional(args.config.as_deref())?;
    args.apply(&mut settings);

    match &args.command {
        Command::Metadata(_) => run_metadata(&settings).await?,
        Command::Bodies(_) => run_bodies(&settings).await?,
    }

    info!(
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "aa_crawler finished"
    );
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_metadata(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let mut config = settings.metadata_config()?;
    let path = config
        .save_path
        .get_or_insert_with(|| default_metadata_path(Path::new(".")))
        .clone();

    if let Err(e) = ensure_writable_dir(output_dir(&path)).await {
        error!(
            path = %path.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let mut crawler = MetadataCrawler::new(config)?;
    match crawler.run().await {
        Ok(summary) => {
            for (title, url) in crawler.article_links().iter().take(5) {
                debug!(title = title.as_deref().unwrap_or_default(), %url, "Sample article");
            }
            info!(
                documents = summary.documents,
                pages = summary.pages_fetched,
                path = %path.display(),
                "Saved metadata"
            );
            Ok(())
        }
        Err(e) => {
            error!(
                error = %e,
                collected = crawler.stubs().len(),
                path = %path.display(),
                "Metadata crawl aborted; pages fetched so far are on disk"
            );
            Err(e.into())
        }
    }
}

#[instrument(level = "info", skip_all)]
async fn run_bodies(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let config = settings.fetcher_config()?;
    let input = settings
        .fetcher
        .input
        .clone()
        .ok_or("no metadata input: pass --input or set fetcher.input")?;
    let output = settings.bodies_output();

    if let Err(e) = ensure_writable_dir(output_dir(&output)).await {
        error!(
            path = %output.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let stubs = load_stubs(&input).await?;
    let selected = window(&stubs, settings.fetcher.start.unwrap_or(0), settings.fetcher.end);
    info!(
        selected = selected.len(),
        total = stubs.len(),
        input = %input.display(),
        "Selected metadata rows"
    );

    let mut fetcher = DetailFetcher::new(config)?;
    let summary = fetcher.run(selected, &output).await?;
    let progress = fetcher.progress();
    info!(
        done = progress.len(),
        malformed = progress.malformed(),
        path = %output.display(),
        "Body output state"
    );
    info!(
        "Done! {}/{} articles with text ({} failed, {} already done, {} without route)",
        summary.succeeded,
        summary.total,
        summary.failed,
        summary.already_done,
        summary.missing_route
    );
    Ok(())
}
