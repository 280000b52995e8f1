//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a mock storefront listing and test
//! fetching, retries and the full crawl cycle end-to-end.

use catalog_crawler::config::Config;
use catalog_crawler::crawler::{crawl_with_signal, FetchError, FetchOutcome, HttpFetcher, PageSource, StopSignal};
use catalog_crawler::storage::{FileProgressStore, ProgressStore};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Renders one listing entry in the storefront's markup
fn entry(name: &str, price: &str, in_stock: bool) -> String {
    let slug: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let stock = if in_stock {
        ""
    } else {
        r#"<div class="stock unavailable"><span>Utsolgt</span></div>"#
    };
    format!(
        r#"<li class="item product product-item">
  <a class="product photo product-item-photo" href="/{slug}.html"><img class="product-image-photo" src="/media/{slug}.jpg"></a>
  <strong class="product name product-item-name"><a class="product-item-link" href="/{slug}.html">{name} (Enkeltkort)</a></strong>
  <span class="price">{price}</span>
  {stock}
</li>"#
    )
}

/// A listing page with `in_stock` available and `sold_out` unavailable entries
fn listing_page(prefix: &str, in_stock: usize, sold_out: usize) -> String {
    let mut items = String::new();
    for i in 0..in_stock {
        items.push_str(&entry(&format!("{} {}", prefix, i), "kr 149,90", true));
    }
    for i in 0..sold_out {
        items.push_str(&entry(&format!("{} Sold {}", prefix, i), "kr 20,00", false));
    }
    format!(
        r#"<html><head><title>Singles</title></head><body><ol class="products list items product-items">{}</ol></body></html>"#,
        items
    )
}

/// Creates a test configuration pointing at the mock server with no delays
fn create_test_config(server: &MockServer, state_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.fetcher.url_template = format!(
        "{}/singles?p={{page}}&product_list_limit={{page_size}}",
        server.uri()
    );
    config.fetcher.min_request_delay_ms = 0;
    config.fetcher.max_request_delay_ms = 0;
    config.fetcher.user_agents = vec!["TestAgent/1.0".to_string()];
    config.retry.max_attempts = 3;
    config.retry.base_delay_ms = 0;
    config.retry.max_delay_ms = 0;
    config.retry.rate_limit_delay_ms = 0;
    config.crawler.inter_batch_delay_ms = 0;
    config.crawler.fetch_failure_cooldown_ms = 0;
    config.crawler.empty_batch_cooldown_ms = 0;
    config.output.state_dir = state_dir.path().to_string_lossy().to_string();
    config
}

async fn mount_page(server: &MockServer, page: u32, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/singles"))
        .and(query_param("p", page.to_string().as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_saves_catalog() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, 1, listing_page("Alpha", 4, 0), 1).await;
    mount_page(&server, 2, listing_page("Beta", 3, 0), 1).await;
    mount_page(&server, 3, listing_page("Gamma", 0, 0), 1).await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.batch_size = 1;

    let records = crawl_with_signal(config.clone(), false, StopSignal::new(), None)
        .await
        .unwrap();

    assert_eq!(records.len(), 7);
    assert_eq!(records[0].name, "Alpha 0");
    assert_eq!(records[0].price, 149.90);
    assert_eq!(
        records[0].store_url,
        format!("{}/alpha0.html", server.uri())
    );
    assert_eq!(
        records[0].image_url,
        format!("{}/media/alpha0.jpg", server.uri())
    );

    let store = FileProgressStore::from_config(&config.output).unwrap();
    let saved = store.load_final().unwrap().unwrap();
    assert_eq!(saved.cards, records);
    assert_eq!(saved.count, 7);
    assert!(saved.data_hash.is_some());

    // A complete pass leaves no progress behind
    assert!(!store.checkpoint_path().exists());
    assert!(!store.partial_path().exists());
}

#[tokio::test]
async fn test_depleted_page_ends_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, 1, listing_page("Alpha", 8, 2), 1).await;
    mount_page(&server, 2, listing_page("Beta", 4, 6), 1).await;
    mount_page(&server, 3, listing_page("Gamma", 10, 0), 0).await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.batch_size = 2;

    let records = crawl_with_signal(config, false, StopSignal::new(), None)
        .await
        .unwrap();

    assert_eq!(records.len(), 12);
    assert!(records.iter().all(|r| !r.name.contains("Sold")));
    assert!(records.iter().all(|r| !r.name.starts_with("Gamma")));
}

#[tokio::test]
async fn test_resume_does_not_refetch_completed_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, 1, listing_page("Alpha", 3, 0), 1).await;
    mount_page(&server, 2, listing_page("Beta", 3, 0), 1).await;
    mount_page(&server, 3, listing_page("Gamma", 3, 0), 1).await;
    mount_page(&server, 4, listing_page("Delta", 0, 0), 1).await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.batch_size = 1;
    config.crawler.max_page = 2;

    let first = crawl_with_signal(config.clone(), false, StopSignal::new(), None)
        .await
        .unwrap();
    assert_eq!(first.len(), 6);

    let store = FileProgressStore::from_config(&config.output).unwrap();
    let checkpoint = store.load_checkpoint().unwrap();
    assert_eq!(checkpoint.cursor_page, 3);

    config.crawler.max_page = 500;
    let second = crawl_with_signal(config, false, StopSignal::new(), None)
        .await
        .unwrap();
    assert_eq!(second.len(), 9);
}

#[tokio::test]
async fn test_fresh_discards_progress() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, 1, listing_page("Alpha", 3, 0), 2).await;
    mount_page(&server, 2, listing_page("Beta", 0, 0), 1).await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.batch_size = 1;
    config.crawler.max_page = 1;

    crawl_with_signal(config.clone(), false, StopSignal::new(), None)
        .await
        .unwrap();

    config.crawler.max_page = 500;
    let records = crawl_with_signal(config, true, StopSignal::new(), None)
        .await
        .unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn test_server_errors_are_retried_up_to_the_bound() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/singles"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir);
    let fetcher = HttpFetcher::from_config(&config).unwrap();

    let outcome = fetcher.fetch_page(1).await;
    assert_eq!(
        outcome,
        FetchOutcome::Failed {
            attempts: 3,
            error: FetchError::Status(500)
        }
    );
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/singles"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir);
    let fetcher = HttpFetcher::from_config(&config).unwrap();

    let outcome = fetcher.fetch_page(1).await;
    assert_eq!(outcome.attempts(), 1);
    assert!(matches!(
        outcome,
        FetchOutcome::Failed {
            error: FetchError::Status(404),
            ..
        }
    ));
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/singles"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 1, listing_page("Alpha", 2, 0), 1).await;

    let config = create_test_config(&server, &dir);
    let fetcher = HttpFetcher::from_config(&config).unwrap();

    match fetcher.fetch_page(1).await {
        FetchOutcome::Fetched { body, attempts } => {
            assert_eq!(attempts, 2);
            assert!(body.contains("Alpha 0"));
        }
        other => panic!("expected a fetched page, got {:?}", other),
    }
}

#[tokio::test]
async fn test_configured_user_agent_and_page_size_sent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/singles"))
        .and(query_param("p", "5"))
        .and(query_param("product_list_limit", "36"))
        .and(header("user-agent", "TestAgent/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page("Alpha", 1, 0)))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir);
    let fetcher = HttpFetcher::from_config(&config).unwrap();

    assert!(matches!(
        fetcher.fetch_page(5).await,
        FetchOutcome::Fetched { attempts: 1, .. }
    ));
}

#[tokio::test]
async fn test_failed_page_is_retried_on_next_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, 1, listing_page("Alpha", 3, 0), 1).await;
    Mock::given(method("GET"))
        .and(path("/singles"))
        .and(query_param("p", "2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    mount_page(&server, 2, listing_page("Beta", 3, 0), 1).await;
    mount_page(&server, 3, listing_page("Gamma", 0, 0), 1).await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.batch_size = 1;
    config.crawler.max_page = 2;

    let first = crawl_with_signal(config.clone(), false, StopSignal::new(), None)
        .await
        .unwrap();
    assert_eq!(first.len(), 3);

    config.crawler.max_page = 500;
    let second = crawl_with_signal(config, false, StopSignal::new(), None)
        .await
        .unwrap();
    assert_eq!(second.len(), 6);
}
