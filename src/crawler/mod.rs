//! Crawler module for catalog page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with bounded, jittered retries
//! - Product extraction from listing pages
//! - Concurrent batch orchestration with end-of-catalog detection
//! - The resumable crawl controller

mod controller;
mod extractor;
mod fetcher;
mod orchestrator;
mod retry;
mod signal;

#[cfg(test)]
pub(crate) mod test_support;

pub use controller::{ControllerSettings, CrawlController, CrawlStats};
pub use extractor::{parse_price, PageExtractor, PageResult};
pub use fetcher::{
    build_http_client, parse_retry_after, FetchError, FetchOutcome, HttpFetcher, PageSource,
    RateLimitGate,
};
pub use orchestrator::{BatchOrchestrator, BatchOutcome, OrchestratorSettings, StopReason};
pub use retry::{RetryFailure, RetryHint, RetryPolicy, Retryable};
pub use signal::StopSignal;

use crate::catalog::ProductRecord;
use crate::config::Config;
use crate::output::StatusReporter;
use crate::storage::{open_store, ProgressStore};

/// Runs a complete catalog pass against the configured storefront
///
/// This is the main entry point for a crawl. It will:
/// 1. Build the HTTP fetcher and open the state directory
/// 2. Clear saved progress if `fresh` is set
/// 3. Wire Ctrl-C to the stop signal
/// 4. Resume or start the pass and save the final catalog
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `fresh` - Discard saved progress and start a new pass
/// * `reporter` - Optional receiver of status updates
///
/// # Returns
///
/// * `Ok(Vec<ProductRecord>)` - The saved catalog, sorted by name
/// * `Err(CrawlerError)` - Setup failed or the final catalog could not be saved
pub async fn crawl(
    config: Config,
    fresh: bool,
    reporter: Option<&dyn StatusReporter>,
) -> crate::Result<Vec<ProductRecord>> {
    let signal = StopSignal::new();

    let interrupt = {
        let signal = signal.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received; saving progress");
                signal.stop();
            }
        })
    };

    let result = crawl_with_signal(config, fresh, signal, reporter).await;
    interrupt.abort();
    result
}

/// Runs a complete catalog pass, stopping when `signal` is triggered
pub async fn crawl_with_signal(
    config: Config,
    fresh: bool,
    signal: StopSignal,
    reporter: Option<&dyn StatusReporter>,
) -> crate::Result<Vec<ProductRecord>> {
    let fetcher = HttpFetcher::from_config(&config)?;
    let base_url = fetcher.page_url(config.crawler.start_page).ok();

    let mut store = open_store(&config.output)?;
    tracing::info!("Using state directory {}", store.dir().display());
    if fresh {
        tracing::info!("Discarding saved progress");
        store.clear_progress()?;
    }

    let mut controller = CrawlController::new(fetcher, store, &config, base_url, signal)?;
    controller.run(reporter).await
}
