//! # Menu News Archiver
//!
//! Scrapes a news portal's topic menu, extracts each topic's latest
//! headlines, fetches full story text for key topics, and merges the
//! result into a growing, deduplicated JSON archive.
//!
//! ## Usage
//!
//! ```sh
//! SCRAPE_PROXY_KEY=... menu_news_archiver -o ./data
//! ```
//!
//! ## Architecture
//!
//! The application is a one-shot pipeline, run by an external scheduler:
//! 1. **Load**: Read the previous `headlines.json` (local or published URL)
//! 2. **Menu**: Discover topic pages from the portal's navigation menu
//! 3. **Collect**: Scrape topic pages sequentially, stories for key topics
//! 4. **Merge**: Dedup by `(headline, link)`, keep archived copies, sort by date
//! 5. **Output**: Write `headlines.json`, `links.json` and dated snapshots

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod archive;
mod cli;
mod collector;
mod dates;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use cli::Cli;
use dates::DateNormalizer;
use pipeline::Pipeline;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
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

    info!(version = env!("CARGO_PKG_VERSION"), "menu_news_archiver starting up");

    let args = Cli::parse();
    debug!(
        output_dir = %args.output_dir.display(),
        menu_url = %args.menu_url,
        proxy = args.proxy_key.is_some(),
        "Parsed CLI arguments"
    );

    // Early check: fail before any network work if outputs can't be written
    let snapshot_dir = args.output_dir.join(outputs::json::SNAPSHOT_DIR);
    if let Err(e) = ensure_writable_dir(&snapshot_dir).await {
        error!(
            path = %snapshot_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let client_config = args.client_config();
    let fetcher = fetch::build_fetcher(client_config)?;
    let http = fetcher.inner().http().clone();

    let normalizer = DateNormalizer::new(args.date_policy());
    info!(
        legacy_dual_calendar = normalizer.policy().legacy_dual_calendar,
        "Date policy selected"
    );
    let pipeline = Pipeline::new(fetcher, normalizer, args.pipeline_settings());

    let run_date = Local::now().date_naive();
    match pipeline.run(&http, run_date).await {
        Ok(summary) => {
            info!(
                topics = summary.topics,
                existing = summary.existing_records,
                new = summary.new_records,
                merged = summary.merged_records,
                headlines = %summary.paths.headlines.display(),
                secs = summary.elapsed.as_secs(),
                millis = summary.elapsed.subsec_millis(),
                "Execution complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            Err(e)
        }
    }
}
