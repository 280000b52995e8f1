//! Catalog Crawler main entry point
//!
//! This is the command-line interface for the resumable storefront catalog crawler.

use anyhow::Context;
use catalog_crawler::config::{load_config_with_hash, Config};
use catalog_crawler::crawler::crawl;
use catalog_crawler::output::{load_statistics, print_statistics, TracingReporter};
use catalog_crawler::storage::open_store;
use catalog_crawler::url::build_page_url;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Catalog Crawler: a resumable storefront catalog crawler
///
/// Paginates a storefront listing, extracts product records, and saves a
/// deduplicated catalog. An interrupted pass resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "catalog-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A resumable storefront catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults if omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discard saved progress and start a new pass
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "fresh"])]
    dry_run: bool,

    /// Show statistics of the saved catalog and exit
    #[arg(long, conflicts_with_all = ["dry_run", "fresh"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given; using built-in defaults");
            Config::default()
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_crawler=info,warn"),
            1 => EnvFilter::new("catalog_crawler=debug,info"),
            2 => EnvFilter::new("catalog_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Catalog Crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Pages: {} to {} (batches of {})",
        config.crawler.start_page, config.crawler.max_page, config.crawler.batch_size
    );
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!(
        "  Checkpoint every: {} batches",
        config.crawler.checkpoint_every
    );
    println!(
        "  Out-of-stock threshold: {:.0}%",
        config.crawler.out_of_stock_threshold * 100.0
    );

    println!("\nFetcher:");
    println!("  Page size: {}", config.fetcher.page_size);
    println!(
        "  Request delay: {}-{}ms",
        config.fetcher.min_request_delay_ms, config.fetcher.max_request_delay_ms
    );
    println!("  User agents: {}", config.fetcher.user_agents.len());

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms base, {}ms cap",
        config.retry.base_delay_ms, config.retry.max_delay_ms
    );

    println!("\nOutput:");
    println!("  State directory: {}", config.output.state_dir);
    println!("  Catalog file: {}", config.output.catalog_file);

    let first_page = build_page_url(
        &config.fetcher.url_template,
        config.crawler.start_page,
        config.fetcher.page_size,
    )?;

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling at {}", first_page);

    Ok(())
}

/// Handles the --stats mode: shows statistics of the saved catalog
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let store = open_store(&config.output)?;
    println!("State directory: {}\n", store.dir().display());

    match load_statistics(&store)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No catalog has been saved yet"),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting a fresh pass (ignoring saved progress)");
    } else {
        tracing::info!("Starting crawl (will resume saved progress if any)");
    }

    let records = crawl(config, fresh, Some(&TracingReporter))
        .await
        .context("Crawl failed")?;

    tracing::info!("Crawl finished with {} records", records.len());
    Ok(())
}
