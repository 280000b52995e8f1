//! Statistics of the saved catalog
//!
//! This module provides functionality for summarizing the final catalog and
//! any in-progress pass from the progress store.

use crate::storage::{CatalogDocument, ProgressStore};
use crate::CrawlerError;
use chrono::{DateTime, Utc};

/// Catalog statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogStatistics {
    /// Records in the final catalog
    pub count: usize,

    /// When the final catalog was written
    pub last_updated: DateTime<Utc>,

    /// Fingerprint stored with the final catalog
    pub data_hash: Option<String>,

    pub min_price: Option<f64>,
    pub median_price: Option<f64>,
    pub max_price: Option<f64>,

    /// Records without an image URL
    pub without_image: usize,

    /// Cursor of an unfinished pass, if one can be resumed
    pub resume_cursor: Option<u32>,

    /// Pages completed by the unfinished pass
    pub completed_pages: usize,
}

impl CatalogStatistics {
    /// Computes statistics of a final catalog document
    pub fn from_document(document: &CatalogDocument) -> Self {
        let mut prices: Vec<f64> = document.cards.iter().map(|card| card.price).collect();
        prices.sort_by(|a, b| a.total_cmp(b));

        let median_price = match prices.len() {
            0 => None,
            n if n % 2 == 1 => Some(prices[n / 2]),
            n => Some((prices[n / 2 - 1] + prices[n / 2]) / 2.0),
        };

        Self {
            count: document.cards.len(),
            last_updated: document.last_updated,
            data_hash: document.data_hash.clone(),
            min_price: prices.first().copied(),
            median_price,
            max_price: prices.last().copied(),
            without_image: document
                .cards
                .iter()
                .filter(|card| card.image_url.is_empty())
                .count(),
            resume_cursor: None,
            completed_pages: 0,
        }
    }
}

/// Loads statistics from the progress store
///
/// # Arguments
///
/// * `store` - The store holding the final catalog and saved progress
///
/// # Returns
///
/// * `Ok(Some(CatalogStatistics))` - A final catalog exists
/// * `Ok(None)` - No final catalog has been written yet
/// * `Err(CrawlerError)` - The store could not be read
pub fn load_statistics(
    store: &dyn ProgressStore,
) -> Result<Option<CatalogStatistics>, CrawlerError> {
    let Some(document) = store.load_final()? else {
        return Ok(None);
    };

    let mut stats = CatalogStatistics::from_document(&document);

    let checkpoint = store.load_checkpoint()?;
    if !checkpoint.is_fresh() {
        stats.resume_cursor = Some(checkpoint.cursor_page);
        stats.completed_pages = checkpoint.completed_pages.len();
    }

    Ok(Some(stats))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Overview:");
    println!("  Records: {}", stats.count);
    println!("  Last updated: {}", stats.last_updated.to_rfc3339());
    println!(
        "  Data hash: {}",
        stats.data_hash.as_deref().unwrap_or("(none)")
    );
    println!();

    println!("Prices:");
    match (stats.min_price, stats.median_price, stats.max_price) {
        (Some(min), Some(median), Some(max)) => {
            println!("  Min: {:.2}", min);
            println!("  Median: {:.2}", median);
            println!("  Max: {:.2}", max);
        }
        _ => println!("  (no records)"),
    }
    println!();

    if stats.without_image > 0 {
        println!("Records without image: {}", stats.without_image);
        println!();
    }

    if let Some(cursor) = stats.resume_cursor {
        println!(
            "Unfinished pass: resumes at page {} ({} pages completed)",
            cursor, stats.completed_pages
        );
    }
}
