//! Command-line interface definitions.
//!
//! Every option has a default matching the production deployment; the
//! proxy credential and the archive location are usually supplied through
//! the environment by the scheduled job.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::archive::ArchiveSource;
use crate::collector::{CollectSettings, DEFAULT_KEY_TOPICS};
use crate::dates::DatePolicy;
use crate::fetch::{ClientConfig, DEFAULT_PROXY_ENDPOINT, DEFAULT_USER_AGENTS, ProxyConfig, RetryPolicy};
use crate::outputs::json::{HEADLINES_FILE, SnapshotMode};
use crate::pipeline::PipelineSettings;
use crate::scrapers::DEFAULT_ORIGIN;
use crate::scrapers::menu::DEFAULT_MENU_URL;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Merge into ./data/headlines.json, fetching through the proxy
/// SCRAPE_PROXY_KEY=... menu_news_archiver -o ./data
///
/// # Bootstrap from the published archive, snapshot the full archive
/// menu_news_archiver -o ./data \
///     --archive https://example.com/north-korea-news/headlines.json \
///     --snapshot-mode full
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory for headlines.json, links.json and archive/
    #[arg(short, long, env = "OUTPUT_DIR", default_value = "data")]
    pub output_dir: PathBuf,

    /// Previous archive: a URL or a local path (default: <output-dir>/headlines.json)
    #[arg(short, long, env = "ARCHIVE_URL")]
    pub archive: Option<String>,

    /// Scraping-proxy API key; pages are fetched directly when absent
    #[arg(long, env = "SCRAPE_PROXY_KEY", hide_env_values = true)]
    pub proxy_key: Option<String>,

    /// Scraping-proxy endpoint
    #[arg(long, default_value = DEFAULT_PROXY_ENDPOINT)]
    pub proxy_endpoint: String,

    /// Do not request the proxy's premium pool
    #[arg(long)]
    pub no_premium: bool,

    /// Menu page listing the topics
    #[arg(long, default_value = DEFAULT_MENU_URL)]
    pub menu_url: String,

    /// Origin relative links are resolved against
    #[arg(long, default_value = DEFAULT_ORIGIN)]
    pub origin: Url,

    /// Topic whose stories get full text (repeatable; replaces the default list)
    #[arg(long = "key-topic")]
    pub key_topics: Vec<String>,

    /// Total attempts per page fetch
    #[arg(long, default_value_t = 3)]
    pub max_attempts: usize,

    /// Backoff unit in milliseconds; attempt k waits k times this
    #[arg(long, default_value_t = 2000)]
    pub retry_base_delay_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Pause before each story fetch, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub story_delay_ms: u64,

    /// Contents of archive/headlines_<date>.json
    #[arg(long, value_enum, default_value_t = SnapshotMode::Delta)]
    pub snapshot_mode: SnapshotMode,

    /// Reject era-marked ("Juche N") dates instead of converting them
    #[arg(long)]
    pub strict_gregorian: bool,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            proxy: self.proxy_key.as_ref().map(|key| ProxyConfig {
                endpoint: self.proxy_endpoint.clone(),
                api_key: key.clone(),
                premium: !self.no_premium,
            }),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
            },
        }
    }

    pub fn date_policy(&self) -> DatePolicy {
        DatePolicy {
            legacy_dual_calendar: !self.strict_gregorian,
        }
    }

    pub fn archive_source(&self) -> ArchiveSource {
        match &self.archive {
            Some(location) => ArchiveSource::parse(location),
            None => ArchiveSource::Local(self.output_dir.join(HEADLINES_FILE)),
        }
    }

    pub fn collect_settings(&self) -> CollectSettings {
        let key_topics = if self.key_topics.is_empty() {
            DEFAULT_KEY_TOPICS.iter().map(|s| s.to_string()).collect()
        } else {
            self.key_topics.clone()
        };
        CollectSettings {
            origin: self.origin.clone(),
            key_topics,
            story_delay: Duration::from_millis(self.story_delay_ms),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            menu_url: self.menu_url.clone(),
            collect: self.collect_settings(),
            archive_source: self.archive_source(),
            output_dir: self.output_dir.clone(),
            snapshot_mode: self.snapshot_mode,
        }
    }
}
