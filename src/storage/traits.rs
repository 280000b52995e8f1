//! Storage traits and error types
//!
//! This module defines the trait interface for progress persistence and the
//! associated error types.

use crate::catalog::{AccumulatedCatalog, CatalogMetadata};
use crate::state::CrawlCheckpoint;
use crate::storage::CatalogDocument;
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for crawl progress persistence
///
/// Writes must never leave a half-written document visible: a reader sees
/// either the previous version or the new one.
pub trait ProgressStore {
    // ===== Resume =====

    /// Loads the saved checkpoint, or an empty one if nothing was saved
    fn load_checkpoint(&self) -> StorageResult<CrawlCheckpoint>;

    /// Loads the partial catalog, or an empty one if nothing was saved
    fn load_partial(&self) -> StorageResult<AccumulatedCatalog>;

    // ===== Progress =====

    /// Persists the page cursor and the set of completed pages
    fn save_checkpoint(
        &mut self,
        cursor_page: u32,
        completed_pages: &BTreeSet<u32>,
    ) -> StorageResult<()>;

    /// Persists the catalog accumulated so far
    fn save_partial(&mut self, catalog: &AccumulatedCatalog) -> StorageResult<()>;

    // ===== Final output =====

    /// Persists the finished catalog with its fingerprint and timestamp
    ///
    /// The catalog is written in its current order; callers sort it first.
    ///
    /// # Returns
    ///
    /// The metadata that was written alongside the records
    fn save_final(&mut self, catalog: &AccumulatedCatalog) -> StorageResult<CatalogMetadata>;

    /// Loads the last final catalog, if any
    fn load_final(&self) -> StorageResult<Option<CatalogDocument>>;

    /// Removes checkpoint, completed pages and partial catalog
    ///
    /// The final catalog is kept.
    fn clear_progress(&mut self) -> StorageResult<()>;
}
