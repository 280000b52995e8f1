//! In-memory progress store
//!
//! Clones share the same state, so a test can hand one clone to the crawler
//! and inspect what was persisted through another.

use crate::catalog::{AccumulatedCatalog, CatalogMetadata};
use crate::state::CrawlCheckpoint;
use crate::storage::schema::{CatalogDocument, CheckpointDocument, CompletedPagesDocument};
use crate::storage::traits::{ProgressStore, StorageError, StorageResult};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    checkpoint: Option<CheckpointDocument>,
    completed: Option<CompletedPagesDocument>,
    partial: Option<CatalogDocument>,
    final_catalog: Option<CatalogDocument>,
    reject_writes: bool,
    checkpoint_saves: usize,
    partial_saves: usize,
}

/// Progress store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail with `StorageError::Unavailable`
    pub fn set_reject_writes(&self, reject: bool) -> StorageResult<()> {
        self.lock()?.reject_writes = reject;
        Ok(())
    }

    /// Number of successful checkpoint saves
    pub fn checkpoint_saves(&self) -> StorageResult<usize> {
        Ok(self.lock()?.checkpoint_saves)
    }

    /// Number of successful partial catalog saves
    pub fn partial_saves(&self) -> StorageResult<usize> {
        Ok(self.lock()?.partial_saves)
    }

    /// The last final catalog written, if any
    pub fn final_catalog(&self) -> StorageResult<Option<CatalogDocument>> {
        Ok(self.lock()?.final_catalog.clone())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn writable(&self) -> StorageResult<MutexGuard<'_, MemoryState>> {
        let state = self.lock()?;
        if state.reject_writes {
            return Err(StorageError::Unavailable("writes rejected".to_string()));
        }
        Ok(state)
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load_checkpoint(&self) -> StorageResult<CrawlCheckpoint> {
        let state = self.lock()?;
        Ok(crate::storage::schema::checkpoint_from_documents(
            state.checkpoint.clone(),
            state.completed.clone(),
        ))
    }

    fn load_partial(&self) -> StorageResult<AccumulatedCatalog> {
        let state = self.lock()?;
        Ok(state
            .partial
            .clone()
            .map(CatalogDocument::into_catalog)
            .unwrap_or_default())
    }

    fn save_checkpoint(
        &mut self,
        cursor_page: u32,
        completed_pages: &BTreeSet<u32>,
    ) -> StorageResult<()> {
        let mut state = self.writable()?;
        state.completed = Some(CompletedPagesDocument::from_pages(completed_pages));
        state.checkpoint = Some(CheckpointDocument {
            cursor_page,
            timestamp: Utc::now(),
        });
        state.checkpoint_saves += 1;
        Ok(())
    }

    fn save_partial(&mut self, catalog: &AccumulatedCatalog) -> StorageResult<()> {
        let mut state = self.writable()?;
        state.partial = Some(CatalogDocument::partial(catalog, Utc::now()));
        state.partial_saves += 1;
        Ok(())
    }

    fn save_final(&mut self, catalog: &AccumulatedCatalog) -> StorageResult<CatalogMetadata> {
        let mut state = self.writable()?;
        let document = CatalogDocument::finalized(catalog, Utc::now());
        let metadata = document.metadata();
        state.final_catalog = Some(document);
        Ok(metadata)
    }

    fn load_final(&self) -> StorageResult<Option<CatalogDocument>> {
        self.final_catalog()
    }

    fn clear_progress(&mut self) -> StorageResult<()> {
        let mut state = self.writable()?;
        state.checkpoint = None;
        state.completed = None;
        state.partial = None;
        Ok(())
    }
}
