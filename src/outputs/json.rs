//! Pretty-printed JSON output files.
//!
//! # Snapshot contents
//!
//! `archive/headlines_<date>.json` holds either only this run's new batch
//! ([`SnapshotMode::Delta`], the default) or the whole merged archive
//! ([`SnapshotMode::Full`]). The "latest" `headlines.json` always holds the
//! merged archive.

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::models::{ArticleRecord, TopicLink};

pub const HEADLINES_FILE: &str = "headlines.json";
pub const LINKS_FILE: &str = "links.json";
pub const SNAPSHOT_DIR: &str = "archive";

/// What the per-run headline snapshot contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SnapshotMode {
    /// Only the records scraped in this run.
    #[default]
    Delta,
    /// The full merged archive as of this run.
    Full,
}

/// Paths written by [`write_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub headlines: PathBuf,
    pub headlines_snapshot: PathBuf,
    pub links: PathBuf,
    pub links_snapshot: PathBuf,
}

impl OutputPaths {
    pub fn new(output_dir: &Path, run_date: NaiveDate) -> Self {
        let day = run_date.format("%Y-%m-%d");
        let snapshots = output_dir.join(SNAPSHOT_DIR);
        Self {
            headlines: output_dir.join(HEADLINES_FILE),
            headlines_snapshot: snapshots.join(format!("headlines_{day}.json")),
            links: output_dir.join(LINKS_FILE),
            links_snapshot: snapshots.join(format!("links_{day}.json")),
        }
    }
}

/// Everything one run persists.
#[derive(Debug)]
pub struct RunOutputs<'a> {
    pub merged: &'a [ArticleRecord],
    pub batch: &'a [ArticleRecord],
    pub links: &'a [TopicLink],
}

/// Write the latest files and the dated snapshots.
///
/// Everything is serialized before the first file is touched, so a
/// serialization failure leaves the output directory unchanged.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), %run_date, ?mode))]
pub async fn write_outputs(
    output_dir: &Path,
    run_date: NaiveDate,
    outputs: &RunOutputs<'_>,
    mode: SnapshotMode,
) -> Result<OutputPaths, Box<dyn Error>> {
    let paths = OutputPaths::new(output_dir, run_date);

    let merged_json = to_pretty_json(outputs.merged)?;
    let snapshot_json = match mode {
        SnapshotMode::Delta => to_pretty_json(outputs.batch)?,
        SnapshotMode::Full => merged_json.clone(),
    };
    let links_json = to_pretty_json(outputs.links)?;

    fs::create_dir_all(output_dir.join(SNAPSHOT_DIR)).await?;

    write_file(&paths.headlines, &merged_json).await?;
    write_file(&paths.headlines_snapshot, &snapshot_json).await?;
    write_file(&paths.links, &links_json).await?;
    write_file(&paths.links_snapshot, &links_json).await?;

    info!(
        merged = outputs.merged.len(),
        batch = outputs.batch.len(),
        links = outputs.links.len(),
        "Wrote outputs"
    );
    Ok(paths)
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

async fn write_file(path: &Path, contents: &str) -> Result<(), Box<dyn Error>> {
    fs::write(path, contents).await?;
    info!(path = %path.display(), bytes = contents.len(), "Wrote JSON");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::parse_archive;

    fn rec(headline: &str, day: u32) -> ArticleRecord {
        ArticleRecord::new(
            "World".to_string(),
            headline.to_string(),
            format!("/{headline}"),
            NaiveDate::from_ymd_opt(2024, 10, day),
            String::new(),
        )
    }

    fn links() -> Vec<TopicLink> {
        vec![TopicLink {
            topic: "World".to_string(),
            link: "http://www.kcna.kp/en/world".to_string(),
        }]
    }

    #[test]
    fn test_output_paths_use_run_date() {
        let paths = OutputPaths::new(Path::new("data"), NaiveDate::from_ymd_opt(2025, 5, 6).unwrap());
        assert_eq!(paths.headlines, Path::new("data/headlines.json"));
        assert_eq!(paths.headlines_snapshot, Path::new("data/archive/headlines_2025-05-06.json"));
        assert_eq!(paths.links, Path::new("data/links.json"));
        assert_eq!(paths.links_snapshot, Path::new("data/archive/links_2025-05-06.json"));
    }

    #[tokio::test]
    async fn test_delta_snapshot_holds_only_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let merged = vec![rec("old", 1), rec("new", 2)];
        let batch = vec![rec("new", 2)];
        let links = links();
        let run_date = NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();

        let paths = write_outputs(
            tmp.path(),
            run_date,
            &RunOutputs { merged: &merged, batch: &batch, links: &links },
            SnapshotMode::Delta,
        )
        .await
        .unwrap();

        let latest = parse_archive(&std::fs::read_to_string(&paths.headlines).unwrap()).unwrap();
        assert_eq!(latest, merged);
        let snapshot =
            parse_archive(&std::fs::read_to_string(&paths.headlines_snapshot).unwrap()).unwrap();
        assert_eq!(snapshot, batch);

        let links_text = std::fs::read_to_string(&paths.links).unwrap();
        assert_eq!(links_text, std::fs::read_to_string(&paths.links_snapshot).unwrap());
        let parsed: Vec<TopicLink> = serde_json::from_str(&links_text).unwrap();
        assert_eq!(parsed, links);
        // pretty-printed
        assert!(links_text.contains("\n  {"));
    }

    #[tokio::test]
    async fn test_full_snapshot_holds_merged_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let merged = vec![rec("old", 1), rec("new", 2)];
        let batch = vec![rec("new", 2)];
        let links = links();

        let paths = write_outputs(
            tmp.path(),
            NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
            &RunOutputs { merged: &merged, batch: &batch, links: &links },
            SnapshotMode::Full,
        )
        .await
        .unwrap();

        let snapshot =
            parse_archive(&std::fs::read_to_string(&paths.headlines_snapshot).unwrap()).unwrap();
        assert_eq!(snapshot, merged);
    }
}
