use crate::catalog::record::{normalize_name, ProductRecord};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Metadata describing a persisted catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogMetadata {
    /// When the catalog was last written
    pub last_updated: Option<DateTime<Utc>>,

    /// Number of records
    pub count: usize,

    /// Fingerprint of the record set (final saves only)
    pub content_hash: Option<String>,
}

/// The growing, deduplicated set of products found during a pass
///
/// Records keep insertion order until [`sort_by_name`](Self::sort_by_name) is
/// called. No two records share an identity key; the first record seen for a
/// key is kept and later ones are discarded.
#[derive(Debug, Clone, Default)]
pub struct AccumulatedCatalog {
    records: Vec<ProductRecord>,
    keys: HashSet<String>,
    metadata: CatalogMetadata,
}

impl AccumulatedCatalog {
    /// Creates an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a catalog (and its dedup index) from previously saved records
    ///
    /// Duplicate keys in the input are dropped, keeping the earliest record.
    pub fn from_records(records: Vec<ProductRecord>) -> Self {
        let mut catalog = Self::new();
        catalog.extend(records);
        catalog
    }

    /// Inserts a record unless its identity key is already present
    ///
    /// # Returns
    ///
    /// `true` if the record was added
    pub fn insert(&mut self, record: ProductRecord) -> bool {
        if self.keys.insert(record.identity_key()) {
            self.records.push(record);
            self.metadata.count = self.records.len();
            true
        } else {
            false
        }
    }

    /// Inserts records in order, returning how many were new
    pub fn extend<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = ProductRecord>,
    {
        records
            .into_iter()
            .map(|record| self.insert(record))
            .filter(|added| *added)
            .count()
    }

    /// Returns true if a record with this name's identity key exists
    pub fn contains_name(&self, name: &str) -> bool {
        self.keys.contains(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ProductRecord> {
        self.records
    }

    pub fn metadata(&self) -> &CatalogMetadata {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: CatalogMetadata) {
        self.metadata = metadata;
    }

    /// Sorts records by name, case-insensitively, with a stable tie-break
    pub fn sort_by_name(&mut self) {
        self.records
            .sort_by_cached_key(|record| (record.name.to_lowercase(), record.name.clone()));
    }

    /// Computes a SHA-256 fingerprint over the records in their current order
    ///
    /// Callers sort first so the hash only changes when the data does.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            hasher.update(record.name.as_bytes());
            hasher.update([0]);
            hasher.update(format!("{:.2}", record.price).as_bytes());
            hasher.update([0]);
            hasher.update(record.store_url.as_bytes());
            hasher.update([0]);
            hasher.update(record.image_url.as_bytes());
            hasher.update([0xff]);
        }
        hex::encode(hasher.finalize())
    }
}
