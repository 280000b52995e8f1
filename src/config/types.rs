use serde::Deserialize;

/// Main configuration structure for the catalog crawler
///
/// Every section is optional; a missing section falls back to the defaults
/// for the Outland singles listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl loop behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// First catalog page of a fresh pass
    #[serde(rename = "start-page")]
    pub start_page: u32,

    /// Sanity ceiling: the crawl stops once the cursor passes this page
    #[serde(rename = "max-page")]
    pub max_page: u32,

    /// Number of pages per batch
    #[serde(rename = "batch-size")]
    pub batch_size: u32,

    /// Permit count of the per-batch fetch pool
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: u32,

    /// Persist progress every N batches
    #[serde(rename = "checkpoint-every")]
    pub checkpoint_every: u32,

    /// Pause between batches (milliseconds)
    #[serde(rename = "inter-batch-delay-ms")]
    pub inter_batch_delay_ms: u64,

    /// Out-of-stock ratio above which a page is treated as the end of the catalog
    #[serde(rename = "out-of-stock-threshold")]
    pub out_of_stock_threshold: f64,

    /// Consecutive page fetch failures before the pool cools down
    #[serde(rename = "max-consecutive-fetch-failures")]
    pub max_consecutive_fetch_failures: u32,

    /// Cooldown after repeated fetch failures (milliseconds)
    #[serde(rename = "fetch-failure-cooldown-ms")]
    pub fetch_failure_cooldown_ms: u64,

    /// Consecutive batches without new records before a long cooldown
    #[serde(rename = "max-empty-batches")]
    pub max_empty_batches: u32,

    /// Long cooldown after repeated empty batches (milliseconds)
    #[serde(rename = "empty-batch-cooldown-ms")]
    pub empty_batch_cooldown_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_page: 1,
            max_page: 500,
            batch_size: 5,
            max_concurrent_fetches: 3,
            checkpoint_every: 2,
            inter_batch_delay_ms: 2_000,
            out_of_stock_threshold: 0.5,
            max_consecutive_fetch_failures: 3,
            fetch_failure_cooldown_ms: 30_000,
            max_empty_batches: 3,
            empty_batch_cooldown_ms: 120_000,
        }
    }
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Listing URL with `{page}` and optional `{page_size}` placeholders
    #[serde(rename = "url-template")]
    pub url_template: String,

    /// Products per listing page
    #[serde(rename = "page-size")]
    pub page_size: u32,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Lower bound of the randomized pre-request delay (milliseconds)
    #[serde(rename = "min-request-delay-ms")]
    pub min_request_delay_ms: u64,

    /// Upper bound of the randomized pre-request delay (milliseconds)
    #[serde(rename = "max-request-delay-ms")]
    pub max_request_delay_ms: u64,

    /// Client identity strings rotated per attempt
    #[serde(rename = "user-agents")]
    pub user_agents: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            url_template: "https://www.outland.no/samlekort-og-kortspill/magic-the-gathering/singles?p={page}&product_list_limit={page_size}".to_string(),
            page_size: 36,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            min_request_delay_ms: 1_000,
            max_request_delay_ms: 3_000,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0".to_string(),
            ],
        }
    }
}

/// Retry and backoff policy shared by every fetch
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per page, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt (milliseconds)
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Upper bound on any single backoff wait (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Smallest jitter multiplier
    #[serde(rename = "jitter-min")]
    pub jitter_min: f64,

    /// Largest jitter multiplier
    #[serde(rename = "jitter-max")]
    pub jitter_max: f64,

    /// Minimum pause after an HTTP 429 (milliseconds)
    #[serde(rename = "rate-limit-delay-ms")]
    pub rate_limit_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            jitter_min: 0.5,
            jitter_max: 1.5,
            rate_limit_delay_ms: 30_000,
        }
    }
}

/// CSS selectors and markers describing a product entry
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// One match per product entry on a listing page
    #[serde(rename = "entry-selector")]
    pub entry_selector: String,

    /// Product name element within an entry
    #[serde(rename = "name-selector")]
    pub name_selector: String,

    /// Price element within an entry
    #[serde(rename = "price-selector")]
    pub price_selector: String,

    /// Store link within an entry
    #[serde(rename = "link-selector")]
    pub link_selector: String,

    /// Product image within an entry
    #[serde(rename = "image-selector")]
    pub image_selector: String,

    /// Structural marker of an unavailable entry
    #[serde(rename = "unavailable-selector")]
    pub unavailable_selector: String,

    /// Text markers of an out-of-stock entry
    #[serde(rename = "out-of-stock-markers")]
    pub out_of_stock_markers: Vec<String>,

    /// Image URL recorded when an entry has none
    #[serde(rename = "image-placeholder")]
    pub image_placeholder: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            entry_selector: "li.item.product.product-item".to_string(),
            name_selector: "a.product-item-link".to_string(),
            price_selector: "span.price".to_string(),
            link_selector: "a.product-item-photo".to_string(),
            image_selector: "img.product-image-photo".to_string(),
            unavailable_selector: ".stock.unavailable".to_string(),
            out_of_stock_markers: vec![
                "Utsolgt".to_string(),
                "Ikke på lager".to_string(),
                "Out of stock".to_string(),
            ],
            image_placeholder: String::new(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding checkpoint, partial and final catalog files
    #[serde(rename = "state-dir")]
    pub state_dir: String,

    /// File name of the final catalog inside `state-dir`
    #[serde(rename = "catalog-file")]
    pub catalog_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            state_dir: "./data".to_string(),
            catalog_file: "scraped_cards.json".to_string(),
        }
    }
}
