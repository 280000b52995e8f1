use crate::config::types::{
    Config, CrawlerConfig, ExtractorConfig, FetcherConfig, OutputConfig, RetryConfig,
};
use crate::url::build_page_url;
use crate::ConfigError;
use scraper::Selector;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_retry_config(&config.retry)?;
    validate_extractor_config(&config.extractor)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl loop configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.start_page < 1 {
        return Err(ConfigError::Validation(
            "start_page must be >= 1".to_string(),
        ));
    }

    if config.start_page > config.max_page {
        return Err(ConfigError::Validation(format!(
            "start_page ({}) must not exceed max_page ({})",
            config.start_page, config.max_page
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch_size must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 32 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 32, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.checkpoint_every < 1 {
        return Err(ConfigError::Validation(
            "checkpoint_every must be >= 1".to_string(),
        ));
    }

    if !(config.out_of_stock_threshold > 0.0 && config.out_of_stock_threshold <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "out_of_stock_threshold must be in (0, 1], got {}",
            config.out_of_stock_threshold
        )));
    }

    if config.max_consecutive_fetch_failures < 1 {
        return Err(ConfigError::Validation(
            "max_consecutive_fetch_failures must be >= 1".to_string(),
        ));
    }

    if config.max_empty_batches < 1 {
        return Err(ConfigError::Validation(
            "max_empty_batches must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    build_page_url(&config.url_template, 1, config.page_size)
        .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;

    if config.page_size < 1 {
        return Err(ConfigError::Validation(
            "page_size must be >= 1".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.min_request_delay_ms > config.max_request_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_request_delay_ms ({}) must not exceed max_request_delay_ms ({})",
            config.min_request_delay_ms, config.max_request_delay_ms
        )));
    }

    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user_agents must contain at least one entry".to_string(),
        ));
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents cannot contain empty strings".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry policy configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    if !(config.jitter_min > 0.0 && config.jitter_min <= config.jitter_max) {
        return Err(ConfigError::Validation(format!(
            "jitter range must satisfy 0 < jitter_min <= jitter_max, got [{}, {}]",
            config.jitter_min, config.jitter_max
        )));
    }

    Ok(())
}

/// Validates that every selector parses
fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    for selector in [
        &config.entry_selector,
        &config.name_selector,
        &config.price_selector,
        &config.link_selector,
        &config.image_selector,
        &config.unavailable_selector,
    ] {
        validate_selector(selector)?;
    }

    if config.out_of_stock_markers.iter().any(|m| m.is_empty()) {
        return Err(ConfigError::Validation(
            "out_of_stock_markers cannot contain empty strings".to_string(),
        ));
    }

    Ok(())
}

/// Parses a CSS selector, mapping failures to a configuration error
pub(crate) fn validate_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.state_dir.is_empty() {
        return Err(ConfigError::Validation(
            "state_dir cannot be empty".to_string(),
        ));
    }

    if config.catalog_file.is_empty() || config.catalog_file.contains(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "catalog_file must be a plain file name, got '{}'",
            config.catalog_file
        )));
    }

    Ok(())
}
