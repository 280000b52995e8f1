//! Batch orchestration
//!
//! One batch is a contiguous page range fetched concurrently under a
//! semaphore. Results are merged strictly in page order once the fetches have
//! finished, so the catalog and the completed-page set are only touched by
//! the task that owns them.
//!
//! # Stop Rules
//!
//! | Page result | Action |
//! |-------------|--------|
//! | Empty | Stop; nothing from this page on is absorbed |
//! | Out-of-stock ratio above threshold | Absorb this page, then stop |
//! | Fetch failed | Skip; counts toward the failure cooldown |

use crate::catalog::AccumulatedCatalog;
use crate::config::CrawlerConfig;
use crate::crawler::extractor::{PageExtractor, PageResult};
use crate::crawler::fetcher::{FetchOutcome, PageSource};
use crate::crawler::signal::StopSignal;
use crate::state::PageStatus;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Why a crawl stopped advancing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    /// A page had no product entries
    EmptyPage { page: u32 },
    /// A page was mostly out of stock
    Depleted { page: u32, ratio: f64 },
    /// The cursor passed the configured page ceiling
    PageLimit,
    /// A stop was requested
    Interrupted,
}

impl StopReason {
    /// Returns true if the catalog pass reached its natural end
    pub fn is_end_of_catalog(&self) -> bool {
        self.last_catalog_page().is_some()
    }

    /// Last page that still belongs to the catalog, for end-of-catalog stops
    pub fn last_catalog_page(&self) -> Option<u32> {
        match self {
            Self::EmptyPage { page } => Some(page.saturating_sub(1)),
            Self::Depleted { page, .. } => Some(*page),
            Self::PageLimit | Self::Interrupted => None,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPage { page } => write!(f, "page {} is empty", page),
            Self::Depleted { page, ratio } => {
                write!(f, "page {} is {:.0}% out of stock", page, ratio * 100.0)
            }
            Self::PageLimit => write!(f, "page limit reached"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Summary of one batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Records added to the catalog
    pub new_records: usize,
    /// Pages in the range that were not already completed
    pub pages_attempted: usize,
    /// Pages whose content was fetched
    pub pages_processed: usize,
    pub fetch_failures: usize,
    /// A fetch-failure cooldown was taken during this batch
    pub failure_cooldown: bool,
    pub should_continue: bool,
    pub stop_reason: Option<StopReason>,
}

impl BatchOutcome {
    fn proceed(pages_attempted: usize) -> Self {
        Self {
            new_records: 0,
            pages_attempted,
            pages_processed: 0,
            fetch_failures: 0,
            failure_cooldown: false,
            should_continue: true,
            stop_reason: None,
        }
    }

    fn stop(&mut self, reason: StopReason) {
        self.should_continue = false;
        self.stop_reason = Some(reason);
    }
}

/// Knobs of the batch orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_concurrent_fetches: usize,
    pub out_of_stock_threshold: f64,
    /// Consecutive failed pages before a cooldown (0 disables)
    pub max_consecutive_fetch_failures: u32,
    pub fetch_failure_cooldown: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_concurrent_fetches: config.max_concurrent_fetches.max(1) as usize,
            out_of_stock_threshold: config.out_of_stock_threshold,
            max_consecutive_fetch_failures: config.max_consecutive_fetch_failures,
            fetch_failure_cooldown: Duration::from_millis(config.fetch_failure_cooldown_ms),
        }
    }
}

/// Runs batches of page fetches and folds their results into the catalog
pub struct BatchOrchestrator<S: PageSource> {
    source: S,
    extractor: PageExtractor,
    settings: OrchestratorSettings,
    consecutive_fetch_failures: u32,
    signal: StopSignal,
}

impl<S: PageSource> BatchOrchestrator<S> {
    pub fn new(
        source: S,
        extractor: PageExtractor,
        settings: OrchestratorSettings,
        signal: StopSignal,
    ) -> Self {
        Self {
            source,
            extractor,
            settings,
            consecutive_fetch_failures: 0,
            signal,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Failed pages since the last successful fetch, across batches
    pub fn consecutive_fetch_failures(&self) -> u32 {
        self.consecutive_fetch_failures
    }

    /// Fetches, extracts and absorbs one page range
    ///
    /// Pages already in `completed` are skipped. Every page whose records are
    /// absorbed is added to `completed` before returning. A stop request that
    /// arrives while fetches are in flight abandons the unfinished pages; the
    /// finished pages ahead of the first unfinished one are still absorbed.
    ///
    /// # Arguments
    ///
    /// * `pages` - Inclusive page range of this batch
    /// * `completed` - Pages already absorbed; grows with this batch
    /// * `catalog` - Accumulated records; grows with this batch
    pub async fn run_batch(
        &mut self,
        pages: RangeInclusive<u32>,
        completed: &mut BTreeSet<u32>,
        catalog: &mut AccumulatedCatalog,
    ) -> BatchOutcome {
        let pending: Vec<u32> = pages.filter(|page| !completed.contains(page)).collect();
        let mut outcome = BatchOutcome::proceed(pending.len());

        if pending.is_empty() {
            return outcome;
        }
        if self.signal.is_stopped() {
            outcome.stop(StopReason::Interrupted);
            return outcome;
        }

        let mut finished: BTreeMap<u32, FetchOutcome> = BTreeMap::new();
        let interrupted = {
            let semaphore = Semaphore::new(self.settings.max_concurrent_fetches);
            let source = &self.source;
            let signal = &self.signal;
            let mut fetches: FuturesUnordered<_> = pending
                .iter()
                .map(|&page| {
                    let semaphore = &semaphore;
                    async move {
                        let _permit = semaphore.acquire().await.ok();
                        (page, source.fetch_page(page).await)
                    }
                })
                .collect();

            loop {
                tokio::select! {
                    next = fetches.next() => match next {
                        Some((page, fetch)) => {
                            finished.insert(page, fetch);
                        }
                        None => break false,
                    },
                    _ = signal.stopped() => break true,
                }
            }
        };

        if interrupted {
            tracing::warn!(
                "Stop requested; {} of {} pages in the batch finished",
                finished.len(),
                pending.len()
            );
        }

        // Page order; stops at the first page still in flight
        for page in &pending {
            let Some(fetch) = finished.remove(page) else {
                break;
            };
            if !self.absorb(*page, fetch, completed, catalog, &mut outcome).await {
                break;
            }
        }

        if interrupted && outcome.stop_reason.is_none() {
            outcome.stop(StopReason::Interrupted);
        }
        outcome
    }

    /// Folds one finished page into the catalog
    ///
    /// Returns false once the batch must not absorb further pages.
    async fn absorb(
        &mut self,
        page: u32,
        fetch: FetchOutcome,
        completed: &mut BTreeSet<u32>,
        catalog: &mut AccumulatedCatalog,
        outcome: &mut BatchOutcome,
    ) -> bool {
        let result = match fetch {
            FetchOutcome::Fetched { body, .. } => self.extractor.extract(page, &body),
            FetchOutcome::Failed { .. } => PageResult::fetch_failed(page),
        };

        match result.status {
            PageStatus::FetchFailed => {
                outcome.fetch_failures += 1;
                if !self.record_fetch_failure(outcome).await {
                    outcome.stop(StopReason::Interrupted);
                    return false;
                }
                true
            }
            PageStatus::Empty => {
                self.consecutive_fetch_failures = 0;
                outcome.pages_processed += 1;
                tracing::info!("Page {} has no entries; end of catalog", page);
                outcome.stop(StopReason::EmptyPage { page });
                false
            }
            PageStatus::Extracted => {
                self.consecutive_fetch_failures = 0;
                outcome.pages_processed += 1;

                let found = result.records.len();
                let added = catalog.extend(result.records);
                completed.insert(page);
                outcome.new_records += added;

                tracing::debug!(
                    "Page {}: {} entries, {} in stock, {} new, {:.0}% out of stock",
                    page,
                    result.total_entries,
                    found,
                    added,
                    result.out_of_stock_ratio * 100.0
                );

                if result.out_of_stock_ratio > self.settings.out_of_stock_threshold {
                    tracing::info!(
                        "Page {} is {:.0}% out of stock; end of catalog",
                        page,
                        result.out_of_stock_ratio * 100.0
                    );
                    outcome.stop(StopReason::Depleted {
                        page,
                        ratio: result.out_of_stock_ratio,
                    });
                    return false;
                }
                true
            }
        }
    }

    /// Counts a failed page and cools down at the limit
    ///
    /// At most one cooldown is taken per batch; a limit reached again in the
    /// same batch carries over to the next failure. Returns false if a stop
    /// request cut the cooldown short.
    async fn record_fetch_failure(&mut self, outcome: &mut BatchOutcome) -> bool {
        self.consecutive_fetch_failures += 1;

        let limit = self.settings.max_consecutive_fetch_failures;
        if limit == 0 || self.consecutive_fetch_failures < limit {
            return true;
        }
        if outcome.failure_cooldown {
            tracing::debug!(
                "{} consecutive page fetches failed; cooldown already taken this batch",
                self.consecutive_fetch_failures
            );
            return true;
        }

        tracing::warn!(
            "{} consecutive page fetches failed; cooling down for {:?}",
            self.consecutive_fetch_failures,
            self.settings.fetch_failure_cooldown
        );
        self.consecutive_fetch_failures = 0;
        outcome.failure_cooldown = true;
        self.signal.sleep(self.settings.fetch_failure_cooldown).await
    }
}
