//! Storage module for persisting crawl progress
//!
//! This module handles every durable artifact of a crawl:
//! - The page cursor and completed pages used to resume
//! - The partial catalog saved at checkpoints
//! - The final, sorted catalog with its content fingerprint

mod file;
mod memory;
mod schema;
mod traits;

pub use file::FileProgressStore;
pub use memory::MemoryProgressStore;
pub use schema::{
    CatalogDocument, CheckpointDocument, CompletedPagesDocument, CHECKPOINT_FILE,
    COMPLETED_PAGES_FILE, PARTIAL_CATALOG_FILE,
};
pub use traits::{ProgressStore, StorageError, StorageResult};

use crate::config::OutputConfig;
use crate::CrawlerError;

/// Opens the file store configured by the output section
///
/// # Arguments
///
/// * `config` - Output configuration naming the state directory
///
/// # Returns
///
/// * `Ok(FileProgressStore)` - Store ready for reading and writing
/// * `Err(CrawlerError)` - The state directory could not be created
pub fn open_store(config: &OutputConfig) -> Result<FileProgressStore, CrawlerError> {
    Ok(FileProgressStore::from_config(config)?)
}
