//! One scrape-and-merge run.
//!
//! 1. **Load**: read the previous archive (strict; aborts the run on corruption)
//! 2. **Menu**: fetch the topic list
//! 3. **Collect**: scrape every topic page, plus stories for key topics
//! 4. **Merge**: fold the new batch into the archive
//! 5. **Output**: write the latest files and dated snapshots
//!
//! The archive is loaded before any network scraping or file writing, so a
//! corrupt archive costs no requests and leaves no partial output.

use chrono::NaiveDate;
use reqwest::Client;
use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};
use url::Url;

use crate::archive::{self, ArchiveSource};
use crate::collector::{self, CollectSettings};
use crate::dates::DateNormalizer;
use crate::fetch::FetchPage;
use crate::outputs::json::{self, OutputPaths, RunOutputs, SnapshotMode};
use crate::scrapers::menu;

/// Settings for a [`Pipeline`] run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub menu_url: String,
    pub collect: CollectSettings,
    pub archive_source: ArchiveSource,
    pub output_dir: PathBuf,
    pub snapshot_mode: SnapshotMode,
}

/// What a run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub topics: usize,
    pub existing_records: usize,
    pub new_records: usize,
    pub merged_records: usize,
    pub paths: OutputPaths,
    pub elapsed: Duration,
}

/// Scrape-and-merge pipeline over any page fetcher.
#[derive(Debug)]
pub struct Pipeline<F> {
    fetcher: F,
    normalizer: DateNormalizer,
    settings: PipelineSettings,
}

impl<F: FetchPage> Pipeline<F> {
    pub fn new(fetcher: F, normalizer: DateNormalizer, settings: PipelineSettings) -> Self {
        Self {
            fetcher,
            normalizer,
            settings,
        }
    }

    /// Run once. `http` is used only to download a remote archive.
    #[instrument(level = "info", skip_all, fields(%run_date))]
    pub async fn run(&self, http: &Client, run_date: NaiveDate) -> Result<RunSummary, Box<dyn Error>> {
        let t0 = Instant::now();
        let s = &self.settings;

        let existing = match archive::load_archive(&s.archive_source, http).await {
            Ok(records) => records,
            Err(e) => {
                error!(source = %s.archive_source, error = %e, "Existing archive is unusable; aborting before any write");
                return Err(e.into());
            }
        };
        let existing_records = existing.len();

        let origin: &Url = &s.collect.origin;
        let links = menu::fetch_menu(&self.fetcher, &s.menu_url, origin).await;
        let batch = collector::collect(&self.fetcher, &links, &s.collect, &self.normalizer).await;

        let merged = archive::merge(existing, batch.clone());
        info!(
            existing = existing_records,
            new = batch.len(),
            merged = merged.len(),
            // The archive itself may hold duplicates that merge folds away.
            added = merged.len().saturating_sub(existing_records),
            "Merged new records into archive"
        );

        let outputs = RunOutputs {
            merged: &merged,
            batch: &batch,
            links: &links,
        };
        let paths = json::write_outputs(&s.output_dir, run_date, &outputs, s.snapshot_mode).await?;

        Ok(RunSummary {
            topics: links.len(),
            existing_records,
            new_records: batch.len(),
            merged_records: merged.len(),
            paths,
            elapsed: t0.elapsed(),
        })
    }
}
