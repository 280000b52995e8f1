//! File-backed progress store
//!
//! Every document is written to a temporary sibling, synced, and renamed over
//! the canonical name, so a crash mid-write leaves the previous version intact.

use crate::catalog::{AccumulatedCatalog, CatalogMetadata};
use crate::config::OutputConfig;
use crate::state::CrawlCheckpoint;
use crate::storage::schema::{
    checkpoint_from_documents, CatalogDocument, CheckpointDocument, CompletedPagesDocument,
    CHECKPOINT_FILE, COMPLETED_PAGES_FILE, PARTIAL_CATALOG_FILE,
};
use crate::storage::traits::{ProgressStore, StorageResult};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Progress store keeping JSON documents in a state directory
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    dir: PathBuf,
    catalog_file: String,
}

impl FileProgressStore {
    /// Opens (creating if needed) a state directory
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory for checkpoint, partial and final documents
    /// * `catalog_file` - File name of the final catalog
    pub fn new(dir: impl Into<PathBuf>, catalog_file: impl Into<String>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            catalog_file: catalog_file.into(),
        })
    }

    /// Opens the state directory named by the output configuration
    pub fn from_config(config: &OutputConfig) -> StorageResult<Self> {
        Self::new(&config.state_dir, config.catalog_file.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    pub fn completed_pages_path(&self) -> PathBuf {
        self.dir.join(COMPLETED_PAGES_FILE)
    }

    pub fn partial_path(&self) -> PathBuf {
        self.dir.join(PARTIAL_CATALOG_FILE)
    }

    pub fn final_path(&self) -> PathBuf {
        self.dir.join(&self.catalog_file)
    }
}

impl ProgressStore for FileProgressStore {
    fn load_checkpoint(&self) -> StorageResult<CrawlCheckpoint> {
        let cursor: Option<CheckpointDocument> = read_json(&self.checkpoint_path())?;
        let completed: Option<CompletedPagesDocument> = read_json(&self.completed_pages_path())?;
        Ok(checkpoint_from_documents(cursor, completed))
    }

    fn load_partial(&self) -> StorageResult<AccumulatedCatalog> {
        let document: Option<CatalogDocument> = read_json(&self.partial_path())?;
        Ok(document
            .map(CatalogDocument::into_catalog)
            .unwrap_or_default())
    }

    fn save_checkpoint(
        &mut self,
        cursor_page: u32,
        completed_pages: &BTreeSet<u32>,
    ) -> StorageResult<()> {
        // Completed pages first: a cursor is only meaningful next to its page set
        write_json_atomic(
            &self.completed_pages_path(),
            &CompletedPagesDocument::from_pages(completed_pages),
        )?;
        write_json_atomic(
            &self.checkpoint_path(),
            &CheckpointDocument {
                cursor_page,
                timestamp: Utc::now(),
            },
        )?;
        tracing::debug!(
            "Saved checkpoint: cursor {}, {} completed pages",
            cursor_page,
            completed_pages.len()
        );
        Ok(())
    }

    fn save_partial(&mut self, catalog: &AccumulatedCatalog) -> StorageResult<()> {
        write_json_atomic(
            &self.partial_path(),
            &CatalogDocument::partial(catalog, Utc::now()),
        )?;
        tracing::debug!("Saved partial catalog with {} records", catalog.len());
        Ok(())
    }

    fn save_final(&mut self, catalog: &AccumulatedCatalog) -> StorageResult<CatalogMetadata> {
        let document = CatalogDocument::finalized(catalog, Utc::now());
        write_json_atomic(&self.final_path(), &document)?;
        tracing::info!(
            "Saved final catalog: {} records to {}",
            document.count,
            self.final_path().display()
        );
        Ok(document.metadata())
    }

    fn load_final(&self) -> StorageResult<Option<CatalogDocument>> {
        read_json(&self.final_path())
    }

    fn clear_progress(&mut self) -> StorageResult<()> {
        for path in [
            self.checkpoint_path(),
            self.completed_pages_path(),
            self.partial_path(),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Reads a JSON document, returning None if the file does not exist
fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

/// Writes a JSON document with the temp-file-then-rename pattern
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");

    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}
