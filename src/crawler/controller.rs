//! Crawl controller - the top-level crawl state machine
//!
//! This module advances the page cursor batch by batch, including:
//! - Restoring saved progress and picking the resume page
//! - Periodic checkpoints of the catalog and completed pages
//! - Cooldowns after repeated unproductive batches
//! - Sorting and persisting the final catalog

use crate::catalog::{AccumulatedCatalog, ProductRecord};
use crate::config::{Config, CrawlerConfig};
use crate::crawler::extractor::PageExtractor;
use crate::crawler::fetcher::PageSource;
use crate::crawler::orchestrator::{BatchOrchestrator, OrchestratorSettings, StopReason};
use crate::crawler::signal::StopSignal;
use crate::output::{StatusReporter, StatusUpdate};
use crate::state::{CrawlCheckpoint, CrawlPhase};
use crate::storage::ProgressStore;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use url::Url;

/// Knobs of the crawl loop
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub start_page: u32,
    pub max_page: u32,
    pub batch_size: u32,
    pub checkpoint_every: u32,
    pub inter_batch_delay: Duration,
    /// Consecutive unproductive batches before a cooldown (0 disables)
    pub max_empty_batches: u32,
    pub empty_batch_cooldown: Duration,
}

impl ControllerSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            start_page: config.start_page.max(1),
            max_page: config.max_page,
            batch_size: config.batch_size.max(1),
            checkpoint_every: config.checkpoint_every.max(1),
            inter_batch_delay: Duration::from_millis(config.inter_batch_delay_ms),
            max_empty_batches: config.max_empty_batches,
            empty_batch_cooldown: Duration::from_millis(config.empty_batch_cooldown_ms),
        }
    }
}

/// Counters of one controller run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub batches: u32,
    pub pages_processed: usize,
    pub fetch_failures: usize,
    pub new_records: usize,
    pub empty_batch_cooldowns: u32,
    pub fetch_failure_cooldowns: u32,
    pub checkpoints_saved: u32,
}

/// Drives one catalog pass from saved progress to the final catalog
pub struct CrawlController<S: PageSource, P: ProgressStore> {
    orchestrator: BatchOrchestrator<S>,
    store: P,
    settings: ControllerSettings,
    signal: StopSignal,
    phase: CrawlPhase,
    stop_reason: Option<StopReason>,
    stats: CrawlStats,
}

impl<S: PageSource, P: ProgressStore> CrawlController<S, P> {
    /// Creates a controller
    ///
    /// # Arguments
    ///
    /// * `source` - Where page content comes from
    /// * `store` - Where progress and the final catalog go
    /// * `config` - Crawler and extractor configuration
    /// * `base_url` - Base for resolving relative product links
    /// * `signal` - Stop requests observed throughout the run
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlController)` - Ready to run
    /// * `Err(CrawlerError)` - An extractor selector did not compile
    pub fn new(
        source: S,
        store: P,
        config: &Config,
        base_url: Option<Url>,
        signal: StopSignal,
    ) -> crate::Result<Self> {
        let extractor = PageExtractor::new(&config.extractor, base_url)?;
        let orchestrator = BatchOrchestrator::new(
            source,
            extractor,
            OrchestratorSettings::from_config(&config.crawler),
            signal.clone(),
        );

        Ok(Self {
            orchestrator,
            store,
            settings: ControllerSettings::from_config(&config.crawler),
            signal,
            phase: CrawlPhase::Init,
            stop_reason: None,
            stats: CrawlStats::default(),
        })
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Why the last run stopped crawling
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn source(&self) -> &S {
        self.orchestrator.source()
    }

    /// Runs the crawl to completion, a hard stop, or an interrupt
    ///
    /// Progress is checkpointed along the way. The returned records are the
    /// whole catalog, sorted by name, exactly as saved.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ProductRecord>)` - The final catalog was saved
    /// * `Err(CrawlerError::Storage)` - The final catalog could not be saved
    pub async fn run(
        &mut self,
        reporter: Option<&dyn StatusReporter>,
    ) -> crate::Result<Vec<ProductRecord>> {
        let started = Instant::now();
        notify(reporter, StatusUpdate::new("Loading saved progress").with_progress(0));

        let (checkpoint, mut catalog) = self.load_progress();
        let mut completed = checkpoint.completed_pages.clone();

        self.transition(CrawlPhase::Resuming);
        let mut cursor = checkpoint.resume_page(self.settings.start_page);
        if checkpoint.is_fresh() {
            tracing::info!("Starting a new pass at page {}", cursor);
        } else {
            tracing::info!(
                "Resuming at page {} with {} records from {} completed pages",
                cursor,
                catalog.len(),
                completed.len()
            );
        }

        let reason = if self.signal.is_stopped() {
            StopReason::Interrupted
        } else {
            self.transition(CrawlPhase::Crawling);
            self.crawl(&mut cursor, &mut completed, &mut catalog, reporter)
                .await
        };

        self.stop_reason = Some(reason);
        self.transition(match reason {
            r if r.is_end_of_catalog() => CrawlPhase::StoppingNormal,
            StopReason::Interrupted => CrawlPhase::Interrupted,
            _ => CrawlPhase::StoppingLimit,
        });
        tracing::info!("Crawl stopped: {}", reason);

        self.transition(CrawlPhase::Finalizing);
        notify(
            reporter,
            StatusUpdate::new("Saving catalog")
                .with_progress(95)
                .with_details(format!("{} records", catalog.len())),
        );
        self.save_progress(cursor, &completed, &catalog);

        catalog.sort_by_name();
        match self.store.save_final(&catalog) {
            Ok(metadata) => catalog.set_metadata(metadata),
            Err(e) => {
                tracing::error!("Failed to save final catalog: {}", e);
                notify(reporter, StatusUpdate::failed(format!("Failed to save catalog: {}", e)));
                return Err(e.into());
            }
        }

        if let Some(last) = reason.last_catalog_page() {
            self.clear_if_complete(last, &completed);
        }

        self.transition(CrawlPhase::Done);
        tracing::info!(
            "Catalog pass finished in {:.1}s: {} records, {} new, {} batches, {} failed pages",
            started.elapsed().as_secs_f64(),
            catalog.len(),
            self.stats.new_records,
            self.stats.batches,
            self.stats.fetch_failures
        );
        notify(
            reporter,
            StatusUpdate::new("Catalog update complete")
                .with_progress(100)
                .with_details(format!("{} records ({})", catalog.len(), reason)),
        );

        Ok(catalog.into_records())
    }

    async fn crawl(
        &mut self,
        cursor: &mut u32,
        completed: &mut BTreeSet<u32>,
        catalog: &mut AccumulatedCatalog,
        reporter: Option<&dyn StatusReporter>,
    ) -> StopReason {
        let mut empty_batches = 0u32;

        loop {
            if self.signal.is_stopped() {
                return StopReason::Interrupted;
            }
            if *cursor > self.settings.max_page {
                tracing::info!(
                    "Cursor {} passed the page limit {}",
                    cursor,
                    self.settings.max_page
                );
                return StopReason::PageLimit;
            }

            let first = *cursor;
            let last = first
                .saturating_add(self.settings.batch_size - 1)
                .min(self.settings.max_page);
            tracing::debug!("Batch {}: pages {}-{}", self.stats.batches + 1, first, last);

            let outcome = self
                .orchestrator
                .run_batch(first..=last, completed, catalog)
                .await;

            self.stats.pages_processed += outcome.pages_processed;
            self.stats.fetch_failures += outcome.fetch_failures;
            self.stats.new_records += outcome.new_records;
            if outcome.failure_cooldown {
                self.stats.fetch_failure_cooldowns += 1;
            }

            // Pages absorbed before the stop are in `completed`; the cursor stays
            if outcome.stop_reason == Some(StopReason::Interrupted) {
                return StopReason::Interrupted;
            }

            *cursor = last.saturating_add(1);
            self.stats.batches += 1;

            tracing::info!(
                "Pages {}-{}: {} new records ({} total), {} failed",
                first,
                last,
                outcome.new_records,
                catalog.len(),
                outcome.fetch_failures
            );
            notify(
                reporter,
                StatusUpdate::new(format!("Scraped pages {}-{}", first, last))
                    .with_progress(self.progress_percent(*cursor))
                    .with_details(format!("{} records", catalog.len())),
            );

            if let Some(reason) = outcome.stop_reason {
                return reason;
            }

            if self.stats.batches % self.settings.checkpoint_every == 0 {
                self.save_progress(*cursor, completed, catalog);
            }

            if outcome.pages_attempted > 0 && outcome.new_records == 0 {
                empty_batches += 1;
                if self.settings.max_empty_batches > 0
                    && empty_batches >= self.settings.max_empty_batches
                {
                    tracing::warn!(
                        "{} batches without new records; cooling down for {:?}",
                        empty_batches,
                        self.settings.empty_batch_cooldown
                    );
                    empty_batches = 0;
                    self.stats.empty_batch_cooldowns += 1;
                    if !self.signal.sleep(self.settings.empty_batch_cooldown).await {
                        return StopReason::Interrupted;
                    }
                }
            } else if outcome.new_records > 0 {
                empty_batches = 0;
            }

            if !self.signal.sleep(self.settings.inter_batch_delay).await {
                return StopReason::Interrupted;
            }
        }
    }

    /// Loads checkpoint and partial catalog, or starts fresh if either is unreadable
    fn load_progress(&self) -> (CrawlCheckpoint, AccumulatedCatalog) {
        match (self.store.load_checkpoint(), self.store.load_partial()) {
            (Ok(checkpoint), Ok(catalog)) => (checkpoint, catalog),
            (checkpoint, catalog) => {
                if let Err(e) = checkpoint {
                    tracing::warn!("Saved checkpoint is unreadable: {}", e);
                }
                if let Err(e) = catalog {
                    tracing::warn!("Saved partial catalog is unreadable: {}", e);
                }
                tracing::warn!("Discarding saved progress and starting fresh");
                (CrawlCheckpoint::default(), AccumulatedCatalog::new())
            }
        }
    }

    /// Clears saved progress once every page up to `last` is completed
    ///
    /// Pages that failed during the pass keep the progress files so the next
    /// run resumes at the first of them.
    fn clear_if_complete(&mut self, last: u32, completed: &BTreeSet<u32>) {
        let missing: Vec<u32> = (self.settings.start_page..=last)
            .filter(|page| !completed.contains(page))
            .collect();

        if let Some(first) = missing.first() {
            tracing::warn!(
                "Keeping saved progress: {} pages failed, the next run resumes at page {}",
                missing.len(),
                first
            );
            return;
        }

        if let Err(e) = self.store.clear_progress() {
            tracing::warn!("Failed to clear saved progress: {}", e);
        }
    }

    /// Saves the partial catalog, then the checkpoint
    ///
    /// Failures are logged and retried at the next interval.
    fn save_progress(
        &mut self,
        cursor: u32,
        completed: &BTreeSet<u32>,
        catalog: &AccumulatedCatalog,
    ) {
        if let Err(e) = self.store.save_partial(catalog) {
            tracing::warn!("Failed to save partial catalog: {}", e);
            return;
        }
        if let Err(e) = self.store.save_checkpoint(cursor, completed) {
            tracing::warn!("Failed to save checkpoint: {}", e);
            return;
        }
        self.stats.checkpoints_saved += 1;
        tracing::debug!(
            "Checkpoint at page {}: {} records, {} completed pages",
            cursor,
            catalog.len(),
            completed.len()
        );
    }

    fn progress_percent(&self, cursor: u32) -> u8 {
        let span = self
            .settings
            .max_page
            .saturating_sub(self.settings.start_page)
            .saturating_add(1);
        let done = cursor.saturating_sub(self.settings.start_page);
        ((u64::from(done) * 90) / u64::from(span.max(1))).min(90) as u8
    }

    fn transition(&mut self, next: CrawlPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::warn!("Unexpected phase transition {} -> {}", self.phase, next);
        }
        if next.is_stopping() {
            tracing::info!("Phase {} -> {}", self.phase, next);
        } else {
            tracing::debug!("Phase {} -> {}", self.phase, next);
        }
        self.phase = next;
    }
}

fn notify(reporter: Option<&dyn StatusReporter>, update: StatusUpdate) {
    if let Some(reporter) = reporter {
        reporter.report(&update);
    }
}
