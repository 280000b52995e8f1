//! Product extraction from listing pages
//!
//! This module turns the HTML of one catalog page into product records:
//! - Entries are located with configurable CSS selectors
//! - Out-of-stock entries are counted and skipped
//! - Names are cleaned and prices normalized
//! - Relative links are resolved against the listing URL
//!
//! Missing fields never fail a page. An entry without a usable name or price is
//! dropped, a missing link or image falls back to a default.

use crate::catalog::{clean_name, ProductRecord};
use crate::config::{validate_selector, ExtractorConfig};
use crate::state::PageStatus;
use crate::url::resolve_link;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extraction result for one catalog page
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub page_number: u32,

    /// In-stock records, in page order, unique per identity key
    pub records: Vec<ProductRecord>,

    /// Out-of-stock entries divided by all entries (0 for an empty page)
    pub out_of_stock_ratio: f64,

    /// Entries matched on the page, whether usable or not
    pub total_entries: usize,

    pub status: PageStatus,
}

impl PageResult {
    /// Result for a page whose content could not be fetched
    pub fn fetch_failed(page_number: u32) -> Self {
        Self {
            page_number,
            records: Vec::new(),
            out_of_stock_ratio: 0.0,
            total_entries: 0,
            status: PageStatus::FetchFailed,
        }
    }

    /// Returns false only when the page could not be fetched
    pub fn succeeded(&self) -> bool {
        self.status.is_fetched()
    }
}

/// Compiled selectors and markers for one storefront layout
#[derive(Debug, Clone)]
pub struct PageExtractor {
    entry: Selector,
    name: Selector,
    price: Selector,
    link: Selector,
    image: Selector,
    unavailable: Selector,
    out_of_stock_markers: Vec<String>,
    image_placeholder: String,
    base_url: Option<Url>,
}

impl PageExtractor {
    /// Compiles the configured selectors
    ///
    /// # Arguments
    ///
    /// * `config` - Selectors and markers of the storefront layout
    /// * `base_url` - Base for resolving relative links (usually the listing URL)
    ///
    /// # Returns
    ///
    /// * `Ok(PageExtractor)` - Every selector compiled
    /// * `Err(ConfigError::InvalidSelector)` - A selector did not parse
    pub fn new(config: &ExtractorConfig, base_url: Option<Url>) -> Result<Self, ConfigError> {
        Ok(Self {
            entry: validate_selector(&config.entry_selector)?,
            name: validate_selector(&config.name_selector)?,
            price: validate_selector(&config.price_selector)?,
            link: validate_selector(&config.link_selector)?,
            image: validate_selector(&config.image_selector)?,
            unavailable: validate_selector(&config.unavailable_selector)?,
            out_of_stock_markers: config.out_of_stock_markers.clone(),
            image_placeholder: config.image_placeholder.clone(),
            base_url,
        })
    }

    /// Extracts every in-stock product on a page
    ///
    /// Deterministic: the same content always yields the same result.
    pub fn extract(&self, page_number: u32, content: &str) -> PageResult {
        let document = Html::parse_document(content);

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut total_entries = 0usize;
        let mut out_of_stock = 0usize;

        for entry in document.select(&self.entry) {
            total_entries += 1;

            if self.is_out_of_stock(&entry) {
                out_of_stock += 1;
                continue;
            }

            let Some(record) = self.extract_entry(&entry) else {
                continue;
            };

            if seen.insert(record.identity_key()) {
                records.push(record);
            } else {
                tracing::trace!(
                    "Page {}: duplicate entry '{}' dropped",
                    page_number,
                    record.name
                );
            }
        }

        let (status, out_of_stock_ratio) = if total_entries == 0 {
            (PageStatus::Empty, 0.0)
        } else {
            (
                PageStatus::Extracted,
                out_of_stock as f64 / total_entries as f64,
            )
        };

        PageResult {
            page_number,
            records,
            out_of_stock_ratio,
            total_entries,
            status,
        }
    }

    fn is_out_of_stock(&self, entry: &ElementRef<'_>) -> bool {
        if entry.select(&self.unavailable).next().is_some() {
            return true;
        }

        let text = entry.text().collect::<String>();
        self.out_of_stock_markers
            .iter()
            .any(|marker| text.contains(marker.as_str()))
    }

    fn extract_entry(&self, entry: &ElementRef<'_>) -> Option<ProductRecord> {
        let name_element = entry.select(&self.name).next();

        let name = name_element
            .map(|el| clean_name(&el.text().collect::<String>()))
            .unwrap_or_default();
        if name.is_empty() {
            tracing::trace!("Entry without a name dropped");
            return None;
        }

        let price_text = entry
            .select(&self.price)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let price = match parse_price(&price_text) {
            Some(price) if price > 0.0 => price,
            _ => {
                tracing::trace!("Entry '{}' has no usable price: {:?}", name, price_text);
                return None;
            }
        };

        let store_url = entry
            .select(&self.link)
            .next()
            .and_then(|el| el.value().attr("href"))
            .or_else(|| name_element.and_then(|el| el.value().attr("href")))
            .and_then(|href| resolve_link(href, self.base_url.as_ref()))
            .unwrap_or_default();

        let image_url = entry
            .select(&self.image)
            .next()
            .and_then(|el| el.value().attr("src").or_else(|| el.value().attr("data-src")))
            .and_then(|src| resolve_link(src, self.base_url.as_ref()))
            .unwrap_or_else(|| self.image_placeholder.clone());

        Some(ProductRecord {
            name,
            price,
            store_url,
            image_url,
        })
    }
}

/// Parses a displayed price into a number
///
/// Only digits, `,` and `.` are kept. The last separator is the decimal
/// separator when one or two digits follow it; otherwise every separator
/// groups thousands.
///
/// # Examples
///
/// ```
/// use catalog_crawler::crawler::parse_price;
///
/// assert_eq!(parse_price("kr 149,90"), Some(149.90));
/// assert_eq!(parse_price("1 299,-"), Some(1299.0));
/// assert_eq!(parse_price("1.299,00"), Some(1299.0));
/// assert_eq!(parse_price("N/A"), None);
/// ```
pub fn parse_price(raw: &str) -> Option<f64> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let is_separator = |c: char| c == ',' || c == '.';
    let digits = |s: &str| s.chars().filter(|c| c.is_ascii_digit()).collect::<String>();

    let normalized = match kept.rfind(is_separator) {
        Some(index) if matches!(kept.len() - index - 1, 1 | 2) => {
            let integer = digits(&kept[..index]);
            let fraction = &kept[index + 1..];
            format!(
                "{}.{}",
                if integer.is_empty() { "0" } else { integer.as_str() },
                fraction
            )
        }
        _ => digits(&kept),
    };

    normalized.parse::<f64>().ok()
}
