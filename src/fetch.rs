//! Page retrieval through the scraping proxy, with linear-backoff retries.
//!
//! # Architecture
//!
//! - [`FetchPage`]: Core trait, "give me the body of this URL"
//! - [`HttpFetcher`]: `reqwest` implementation routed through the proxy
//! - [`RetryFetch`]: Decorator that retries transient failures
//!
//! All knobs live in an explicitly constructed [`ClientConfig`]; nothing is
//! read from globals.
//!
//! # Retry Strategy
//!
//! - Up to `max_attempts` attempts in total
//! - After failed attempt `k` the decorator sleeps `base_delay * k`
//! - Only transport errors, `429` and `5xx` are retried
//!
//! With the defaults (3 attempts, 2s base) a hopeless URL costs 2s + 4s of
//! waiting before the caller sees [`FetchError::Exhausted`].

use rand::seq::IndexedRandom;
use reqwest::{Client, StatusCode, header::USER_AGENT};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::utils::truncate_for_log;

/// Default scraping-proxy endpoint.
pub const DEFAULT_PROXY_ENDPOINT: &str = "https://proxy.scrapeops.io/v1/";

/// User agents rotated across requests.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Firefox/78.0",
];

/// Why a page could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failure, timeout, or body read error.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Transport failures, `429 Too Many Requests` and any `5xx`.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status(s) => *s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error(),
            FetchError::Exhausted { .. } => false,
        }
    }

    /// Status code carried by this error, looking through exhaustion.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Transport(e) => e.status(),
            FetchError::Status(s) => Some(*s),
            FetchError::Exhausted { last, .. } => last.status(),
        }
    }
}

/// Trait for fetching a page body.
///
/// Implementors return the response body for `url`, or a [`FetchError`].
/// The scrapers only depend on this trait, so tests can substitute canned
/// HTML for the network.
pub trait FetchPage {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Scraping-proxy settings.
#[derive(Clone)]
pub struct ProxyConfig {
    /// Proxy URL that receives the `api_key`, `url` and `premium` query.
    pub endpoint: String,
    pub api_key: String,
    /// Ask the proxy for its premium (residential) pool.
    pub premium: bool,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("premium", &self.premium)
            .finish()
    }
}

/// Retry settings for [`RetryFetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Treated as at least 1.
    pub max_attempts: usize,
    /// Delay unit; the wait after attempt `k` is `base_delay * k`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: usize) -> Duration {
        self.base_delay
            .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
    }

    /// Total time spent sleeping when every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts.max(1))
            .map(|k| self.delay_after(k))
            .fold(Duration::ZERO, |acc, d| acc.saturating_add(d))
    }
}

/// Everything needed to talk to the upstream site.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Route requests through a scraping proxy; `None` fetches directly.
    pub proxy: Option<ProxyConfig>,
    /// One of these is picked at random for each request.
    pub user_agents: Vec<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// [`FetchPage`] over HTTP, optionally through the scraping proxy.
///
/// Makes exactly one request per call; wrap it in [`RetryFetch`] for
/// retries (see [`build_fetcher`]).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
    config: ClientConfig,
}

impl HttpFetcher {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// The underlying client, for requests that must bypass the proxy.
    pub fn http(&self) -> &Client {
        &self.http
    }

    fn pick_user_agent(&self) -> Option<&str> {
        self.config
            .user_agents
            .choose(&mut rand::rng())
            .map(String::as_str)
    }
}

impl FetchPage for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut req = match &self.config.proxy {
            Some(proxy) => {
                let premium = if proxy.premium { "true" } else { "false" };
                self.http.get(&proxy.endpoint).query(&[
                    ("api_key", proxy.api_key.as_str()),
                    ("url", url),
                    ("premium", premium),
                ])
            }
            None => self.http.get(url),
        };
        if let Some(ua) = self.pick_user_agent() {
            req = req.header(USER_AGENT, ua);
        }

        let t0 = Instant::now();
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        let elapsed_ms = t0.elapsed().as_millis();

        if !status.is_success() {
            warn!(
                %url,
                status = status.as_u16(),
                elapsed_ms,
                body_preview = %truncate_for_log(&body, 200),
                "Non-success response"
            );
            return Err(FetchError::Status(status));
        }
        debug!(%url, bytes = body.len(), elapsed_ms, "Fetched page");
        Ok(body)
    }
}

/// Wrapper that adds linear-backoff retries to any [`FetchPage`].
pub struct RetryFetch<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryFetch<T>
where
    T: FetchPage,
{
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_attempts", &self.policy.max_attempts)
            .field("base_delay", &self.policy.base_delay)
            .finish()
    }
}

impl<T> FetchPage for RetryFetch<T>
where
    T: FetchPage,
{
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let err = match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };
            let status = err.status().map(|s| s.as_u16());

            if !err.is_retryable() {
                error!(%url, attempt, ?status, error = %err, "Fetch failed with non-retryable error");
                return Err(err);
            }

            if attempt >= max_attempts {
                warn!(
                    %url,
                    attempt,
                    max = max_attempts,
                    ?status,
                    elapsed_ms_total = total_t0.elapsed().as_millis(),
                    error = %err,
                    "Fetch exhausted retries"
                );
                return Err(FetchError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                %url,
                attempt,
                max = max_attempts,
                ?status,
                ?delay,
                error = %err,
                "Fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

/// Build the production fetcher: [`HttpFetcher`] wrapped in [`RetryFetch`].
pub fn build_fetcher(config: ClientConfig) -> Result<RetryFetch<HttpFetcher>, FetchError> {
    let policy = config.retry;
    match &config.proxy {
        Some(p) => info!(endpoint = %p.endpoint, premium = p.premium, "Fetching through proxy"),
        None => warn!("No proxy key configured; fetching pages directly"),
    }
    info!(
        max_attempts = policy.max_attempts,
        base_delay = ?policy.base_delay,
        worst_case_backoff = ?policy.total_backoff(),
        "Retry policy"
    );
    Ok(RetryFetch::new(HttpFetcher::new(config)?, policy))
}
