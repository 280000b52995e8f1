//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with timeouts and compression
//! - Rotating the client identity per attempt
//! - Randomized politeness delays before each request
//! - A shared pause after rate-limit responses
//! - Error classification for the retry policy

use crate::config::{Config, FetcherConfig};
use crate::crawler::retry::{RetryHint, RetryPolicy, Retryable};
use crate::url::build_page_url;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use url::Url;

/// Why a single fetch attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("rate limited, pausing for {pause:?}")]
    RateLimited { pause: Duration },

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid page URL: {0}")]
    InvalidUrl(String),
}

impl Retryable for FetchError {
    fn retry_hint(&self) -> RetryHint {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Body(_) | Self::Request(_) => {
                RetryHint::Backoff
            }
            Self::Status(code) if *code >= 500 => RetryHint::Backoff,
            Self::Status(_) | Self::InvalidUrl(_) => RetryHint::Fatal,
            Self::RateLimited { pause } => RetryHint::SlowDown(*pause),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Result of fetching one page, after all retries
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Page content was obtained
    Fetched { body: String, attempts: u32 },

    /// Every attempt failed, or the failure was not retryable
    Failed { attempts: u32, error: FetchError },
}

impl FetchOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fetched { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Pause shared by every in-flight fetch after a rate-limit response
///
/// Clones share the same deadline.
#[derive(Debug, Clone, Default)]
pub struct RateLimitGate {
    until: Arc<Mutex<Option<Instant>>>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extends the shared pause to at least `pause` from now
    pub fn slow_down(&self, pause: Duration) {
        let target = Instant::now() + pause;
        let mut until = self.until.lock().unwrap_or_else(|e| e.into_inner());
        if until.map_or(true, |current| current < target) {
            *until = Some(target);
        }
    }

    /// Returns the end of the current pause, if one is active
    pub fn paused_until(&self) -> Option<Instant> {
        let until = *self.until.lock().unwrap_or_else(|e| e.into_inner());
        until.filter(|deadline| *deadline > Instant::now())
    }

    /// Waits until no pause is active
    pub async fn wait(&self) {
        while let Some(deadline) = self.paused_until() {
            tokio::time::sleep_until(deadline).await;
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// The first configured user agent is the client default; each attempt
/// overrides it with a random pick.
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true);

    if let Some(user_agent) = config.user_agents.first() {
        builder = builder.user_agent(user_agent.clone());
    }

    builder.build()
}

/// Parses a `Retry-After` header given in seconds
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Anything that can produce the raw content of a catalog page
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page_number: u32) -> FetchOutcome;
}

/// Page source backed by the storefront's HTTP listing
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
    user_agents: Vec<String>,
    min_delay: Duration,
    max_delay: Duration,
    gate: RateLimitGate,
    url_template: String,
    page_size: u32,
}

impl HttpFetcher {
    /// Creates a fetcher from the fetcher section and a retry policy
    pub fn new(config: &FetcherConfig, policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            policy,
            user_agents: config.user_agents.clone(),
            min_delay: Duration::from_millis(config.min_request_delay_ms),
            max_delay: Duration::from_millis(config.max_request_delay_ms),
            gate: RateLimitGate::new(),
            url_template: config.url_template.clone(),
            page_size: config.page_size,
        })
    }

    pub fn from_config(config: &Config) -> crate::Result<Self> {
        Ok(Self::new(
            &config.fetcher,
            RetryPolicy::from_config(&config.retry),
        )?)
    }

    /// URL of the given listing page
    pub fn page_url(&self, page_number: u32) -> crate::UrlResult<Url> {
        build_page_url(&self.url_template, page_number, self.page_size)
    }

    /// Fetches a URL, retrying per the policy
    pub async fn fetch(&self, url: &Url) -> FetchOutcome {
        match self
            .policy
            .execute(move |attempt| self.attempt(url, attempt))
            .await
        {
            Ok((body, attempts)) => FetchOutcome::Fetched { body, attempts },
            Err(failure) => FetchOutcome::Failed {
                attempts: failure.attempts,
                error: failure.error,
            },
        }
    }

    async fn attempt(&self, url: &Url, attempt: u32) -> Result<String, FetchError> {
        self.gate.wait().await;
        tokio::time::sleep(self.politeness_delay()).await;

        let user_agent = self.pick_user_agent();
        let mut request = self.client.get(url.clone());
        if let Some(user_agent) = user_agent {
            request = request.header(USER_AGENT, user_agent);
        }

        tracing::trace!("GET {} (attempt {})", url, attempt + 1);
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let pause = self
                .policy
                .rate_limit_pause(parse_retry_after(response.headers()));
            self.gate.slow_down(pause);
            tracing::warn!("Rate limited on {}; pausing all fetches for {:?}", url, pause);
            return Err(FetchError::RateLimited { pause });
        }

        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }

    fn politeness_delay(&self) -> Duration {
        if self.min_delay < self.max_delay {
            rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
        } else {
            self.min_delay
        }
    }

    fn pick_user_agent(&self) -> Option<String> {
        self.user_agents.choose(&mut rand::thread_rng()).cloned()
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch_page(&self, page_number: u32) -> FetchOutcome {
        let url = match self.page_url(page_number) {
            Ok(url) => url,
            Err(e) => {
                return FetchOutcome::Failed {
                    attempts: 0,
                    error: FetchError::InvalidUrl(e.to_string()),
                }
            }
        };

        let outcome = self.fetch(&url).await;
        match &outcome {
            FetchOutcome::Fetched { body, attempts } => tracing::debug!(
                "Fetched page {} ({} bytes, {} attempts)",
                page_number,
                body.len(),
                attempts
            ),
            FetchOutcome::Failed { attempts, error } => tracing::warn!(
                "Failed to fetch page {} after {} attempts: {}",
                page_number,
                attempts,
                error
            ),
        }
        outcome
    }
}
