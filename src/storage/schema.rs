//! Persisted document formats
//!
//! All progress is stored as pretty-printed JSON so operators can inspect it.

use crate::catalog::{AccumulatedCatalog, CatalogMetadata, ProductRecord};
use crate::state::CrawlCheckpoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File name of the page cursor document
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// File name of the completed pages document
pub const COMPLETED_PAGES_FILE: &str = "completed_pages.json";

/// File name of the partial catalog document
pub const PARTIAL_CATALOG_FILE: &str = "scraped_cards_partial.json";

/// `checkpoint.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointDocument {
    pub cursor_page: u32,
    pub timestamp: DateTime<Utc>,
}

/// `completed_pages.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletedPagesDocument {
    /// Sorted page numbers
    pub pages: Vec<u32>,
}

/// Partial and final catalog files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub last_updated: DateTime<Utc>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<String>,
    pub cards: Vec<ProductRecord>,
}

impl CatalogDocument {
    /// Snapshot of an in-progress catalog
    pub fn partial(catalog: &AccumulatedCatalog, now: DateTime<Utc>) -> Self {
        Self {
            last_updated: now,
            count: catalog.len(),
            data_hash: None,
            cards: catalog.records().to_vec(),
        }
    }

    /// Final catalog with its content fingerprint
    pub fn finalized(catalog: &AccumulatedCatalog, now: DateTime<Utc>) -> Self {
        Self {
            last_updated: now,
            count: catalog.len(),
            data_hash: Some(catalog.content_hash()),
            cards: catalog.records().to_vec(),
        }
    }

    pub fn metadata(&self) -> CatalogMetadata {
        CatalogMetadata {
            last_updated: Some(self.last_updated),
            count: self.count,
            content_hash: self.data_hash.clone(),
        }
    }

    /// Rebuilds the catalog, including its dedup index
    pub fn into_catalog(self) -> AccumulatedCatalog {
        let metadata = self.metadata();
        let mut catalog = AccumulatedCatalog::from_records(self.cards);
        catalog.set_metadata(CatalogMetadata {
            count: catalog.len(),
            ..metadata
        });
        catalog
    }
}

impl CompletedPagesDocument {
    pub fn from_pages<'a, I>(pages: I) -> Self
    where
        I: IntoIterator<Item = &'a u32>,
    {
        let mut pages: Vec<u32> = pages.into_iter().copied().collect();
        pages.sort_unstable();
        pages.dedup();
        Self { pages }
    }
}

/// Assembles a checkpoint from its two stored documents
pub fn checkpoint_from_documents(
    cursor: Option<CheckpointDocument>,
    completed: Option<CompletedPagesDocument>,
) -> CrawlCheckpoint {
    CrawlCheckpoint {
        cursor_page: cursor.as_ref().map(|c| c.cursor_page).unwrap_or(0),
        completed_pages: completed
            .map(|c| c.pages.into_iter().collect())
            .unwrap_or_default(),
        last_saved_at: cursor.map(|c| c.timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ProductRecord {
        ProductRecord {
            name: name.to_string(),
            price: 10.0,
            store_url: String::new(),
            image_url: String::new(),
        }
    }

    #[test]
    fn test_partial_document_has_no_hash() {
        let catalog = AccumulatedCatalog::from_records(vec![record("Opt")]);
        let doc = CatalogDocument::partial(&catalog, Utc::now());
        let json = serde_json::to_string(&doc).unwrap();

        assert!(!json.contains("data_hash"));
        assert!(json.contains("\"count\":1"));
        assert!(json.contains("\"cards\""));
        assert!(json.contains("\"last_updated\""));
    }

    #[test]
    fn test_final_document_has_hash() {
        let catalog = AccumulatedCatalog::from_records(vec![record("Opt")]);
        let doc = CatalogDocument::finalized(&catalog, Utc::now());

        assert_eq!(doc.data_hash.as_deref(), Some(catalog.content_hash().as_str()));
        assert_eq!(doc.metadata().count, 1);
    }

    #[test]
    fn test_into_catalog_dedups_hand_edited_files() {
        let doc = CatalogDocument {
            last_updated: Utc::now(),
            count: 3,
            data_hash: None,
            cards: vec![record("Opt"), record("OPT"), record("Ponder")],
        };
        let catalog = doc.into_catalog();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.metadata().count, 2);
    }

    #[test]
    fn test_completed_pages_sorted() {
        let doc = CompletedPagesDocument::from_pages(&[5, 1, 3, 1]);
        assert_eq!(doc.pages, vec![1, 3, 5]);
    }

    #[test]
    fn test_checkpoint_from_missing_documents() {
        let cp = checkpoint_from_documents(None, None);
        assert!(cp.is_fresh());
        assert!(cp.last_saved_at.is_none());
    }
}
