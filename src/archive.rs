//! The headline archive: loading, strict date parsing, and merging.
//!
//! # Merge policy
//!
//! 1. Existing records followed by the new batch, each in original order
//! 2. Deduplicate by `(headline, link)`, first occurrence wins, so an
//!    archived record always beats a freshly scraped copy
//! 3. Stable sort ascending by date; records with a missing date go
//!    after every dated record
//! 4. Recompute `date_str` for every record
//!
//! # Strictness
//!
//! The archive is the canonical history. A date in it that cannot be
//! parsed aborts the run (see [`ArchiveError::BadDate`]) before anything is
//! written. Missing dates (`null`) are accepted.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use itertools::Itertools;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::models::ArticleRecord;

/// Why the existing archive could not be loaded.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive is not a JSON array of records: {0}")]
    Json(#[from] serde_json::Error),
    #[error("archive record {index} ({headline:?}) has an unparseable date: {value}")]
    BadDate {
        index: usize,
        headline: String,
        value: String,
    },
    #[error("failed to read archive {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to download archive from {url}: {source}")]
    Http { url: String, source: reqwest::Error },
    #[error("archive download from {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
}

/// Where the previous archive is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
    /// A published `headlines.json`. Any failure to fetch it is fatal.
    Remote(String),
    /// A local `headlines.json`. A missing file means a first run.
    Local(PathBuf),
}

impl ArchiveSource {
    /// `http(s)://` locations are remote, everything else is a path.
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            ArchiveSource::Remote(s.to_string())
        } else {
            ArchiveSource::Local(PathBuf::from(s))
        }
    }
}

impl fmt::Display for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveSource::Remote(url) => f.write_str(url),
            ArchiveSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A record as stored on disk, before its date is checked.
#[derive(Debug, Deserialize)]
struct StoredRecord {
    #[serde(default)]
    topic: Option<String>,
    headline: String,
    link: String,
    #[serde(default)]
    date: Value,
    #[serde(default)]
    story_text: Option<String>,
}

/// Parse an archive JSON document strictly.
///
/// Dates may be `null`, `YYYY-MM-DD`, an RFC 3339 / ISO timestamp, or
/// integer epoch milliseconds (how older archives were written).
pub fn parse_archive(json: &str) -> Result<Vec<ArticleRecord>, ArchiveError> {
    let stored: Vec<StoredRecord> = serde_json::from_str(json)?;
    stored
        .into_iter()
        .enumerate()
        .map(|(index, r)| {
            let date = parse_stored_date(&r.date).map_err(|()| ArchiveError::BadDate {
                index,
                headline: r.headline.clone(),
                value: r.date.to_string(),
            })?;
            Ok(ArticleRecord::new(
                r.topic.unwrap_or_default(),
                r.headline,
                r.link,
                date,
                r.story_text.unwrap_or_default(),
            ))
        })
        .collect()
}

fn parse_stored_date(value: &Value) -> Result<Option<NaiveDate>, ()> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| Some(dt.date_naive()))
            .ok_or(()),
        Value::String(s) => parse_date_string(s.trim()).map(Some).ok_or(()),
        _ => Err(()),
    }
}

fn parse_date_string(s: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

/// Merge the new batch into the existing archive.
///
/// Pure and infallible: the strict checks happen in [`parse_archive`].
pub fn merge(existing: Vec<ArticleRecord>, incoming: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    let mut merged: Vec<ArticleRecord> = existing
        .into_iter()
        .chain(incoming)
        .unique_by(|r| {
            let (headline, link) = r.identity();
            (headline.to_owned(), link.to_owned())
        })
        .collect();

    // `sort_by_key` is stable; `true` sorts after `false`.
    merged.sort_by_key(|r| (r.date.is_none(), r.date));

    for record in &mut merged {
        record.refresh_date_str();
    }
    merged
}

/// Load the previous archive.
#[instrument(level = "info", skip_all, fields(source = %source))]
pub async fn load_archive(
    source: &ArchiveSource,
    http: &Client,
) -> Result<Vec<ArticleRecord>, ArchiveError> {
    let json = match source {
        ArchiveSource::Remote(url) => {
            let resp = http.get(url).send().await.map_err(|e| ArchiveError::Http {
                url: url.clone(),
                source: e,
            })?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ArchiveError::Status {
                    url: url.clone(),
                    status,
                });
            }
            resp.text().await.map_err(|e| ArchiveError::Http {
                url: url.clone(),
                source: e,
            })?
        }
        ArchiveSource::Local(path) => match fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "No existing archive; starting a new one");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(ArchiveError::Io {
                    path: path.clone(),
                    source: e,
                });
            }
        },
    };

    let records = parse_archive(&json)?;
    info!(count = records.len(), "Loaded existing archive");
    Ok(records)
}
