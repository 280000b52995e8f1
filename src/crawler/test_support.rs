//! Synthetic listing pages and a scripted page source for crawler tests

use crate::config::Config;
use crate::crawler::fetcher::{FetchError, FetchOutcome, PageSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One product entry of a synthetic listing page
#[derive(Debug, Clone)]
pub struct Entry {
    name: String,
    price: String,
    href: Option<String>,
    image: Option<String>,
    out_of_stock: bool,
    note: Option<String>,
}

pub fn entry(name: &str, price: &str) -> Entry {
    let slug: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    Entry {
        name: name.to_string(),
        price: price.to_string(),
        href: Some(format!("https://shop.example.com/{}.html", slug)),
        image: Some(format!("https://cdn.example.com/{}.jpg", slug)),
        out_of_stock: false,
        note: None,
    }
}

impl Entry {
    /// Marks the entry with the structural unavailable marker
    pub fn out_of_stock(mut self) -> Self {
        self.out_of_stock = true;
        self
    }

    /// Adds free text to the entry
    pub fn note(mut self, text: &str) -> Self {
        self.note = Some(text.to_string());
        self
    }

    pub fn href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    pub fn image(mut self, src: &str) -> Self {
        self.image = Some(src.to_string());
        self
    }

    pub fn without_image(mut self) -> Self {
        self.image = None;
        self
    }

    fn render(&self) -> String {
        let href = self.href.as_deref().unwrap_or("");
        let photo = match &self.image {
            Some(src) => format!(
                r#"<a class="product photo product-item-photo" href="{href}"><img class="product-image-photo" src="{src}" alt=""></a>"#
            ),
            None => format!(r#"<a class="product photo product-item-photo" href="{href}"></a>"#),
        };
        let stock = if self.out_of_stock {
            r#"<div class="stock unavailable"><span>Utsolgt</span></div>"#
        } else {
            r#"<div class="stock available"><span>På lager</span></div>"#
        };
        let note = self
            .note
            .as_deref()
            .map(|text| format!(r#"<span class="note">{text}</span>"#))
            .unwrap_or_default();

        format!(
            r#"<li class="item product product-item">
  <div class="product-item-info">
    {photo}
    <div class="product details product-item-details">
      <strong class="product name product-item-name"><a class="product-item-link" href="{href}">{name}</a></strong>
      <div class="price-box"><span class="price">{price}</span></div>
      {stock}{note}
    </div>
  </div>
</li>"#,
            name = self.name,
            price = self.price,
        )
    }
}

/// Renders a listing page with the default storefront markup
pub fn listing(entries: &[Entry]) -> String {
    let items: String = entries.iter().map(Entry::render).collect();
    format!(
        r#"<!DOCTYPE html><html><head><title>Singles</title></head><body>
<ol class="products list items product-items">{items}</ol>
</body></html>"#
    )
}

/// A page of in-stock products priced 10,00
pub fn products_page(names: &[&str]) -> String {
    let entries: Vec<Entry> = names.iter().map(|name| entry(name, "kr 10,00")).collect();
    listing(&entries)
}

/// A page with the given in-stock names plus `sold_out` unavailable entries
pub fn depleted_page(names: &[&str], sold_out: usize) -> String {
    let mut entries: Vec<Entry> = names.iter().map(|name| entry(name, "kr 10,00")).collect();
    for i in 0..sold_out {
        entries.push(entry(&format!("Sold Out Card {}", i), "kr 10,00").out_of_stock());
    }
    listing(&entries)
}

/// Configuration with every delay and cooldown set to zero
pub fn instant_config() -> Config {
    let mut config = Config::default();
    config.crawler.inter_batch_delay_ms = 0;
    config.crawler.fetch_failure_cooldown_ms = 0;
    config.crawler.empty_batch_cooldown_ms = 0;
    config.fetcher.min_request_delay_ms = 0;
    config.fetcher.max_request_delay_ms = 0;
    config.retry.base_delay_ms = 0;
    config.retry.max_delay_ms = 0;
    config.retry.rate_limit_delay_ms = 0;
    config
}

#[derive(Debug, Clone)]
enum Script {
    Body(String),
    Fail,
}

#[derive(Debug, Default)]
struct ScriptState {
    pages: HashMap<u32, Script>,
    delays: HashMap<u32, Duration>,
    fetches: HashMap<u32, u32>,
}

/// Page source serving scripted content; unscripted pages are empty listings
///
/// Clones share scripts and fetch counters.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    state: Arc<Mutex<ScriptState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, page_number: u32, body: String) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(page_number, Script::Body(body));
        self
    }

    /// Every fetch of this page fails
    pub fn failing(self, page_number: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(page_number, Script::Fail);
        self
    }

    /// Delays every fetch of this page
    pub fn delayed(self, page_number: u32, delay: Duration) -> Self {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(page_number, delay);
        self
    }

    /// Replaces a page's script, e.g. to let a failing page recover
    pub fn set_page(&self, page_number: u32, body: String) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(page_number, Script::Body(body));
    }

    pub fn fetch_count(&self, page_number: u32) -> u32 {
        self.state
            .lock()
            .unwrap()
            .fetches
            .get(&page_number)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> u32 {
        self.state.lock().unwrap().fetches.values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(&self, page_number: u32) -> FetchOutcome {
        let (script, delay) = {
            let mut state = self.state.lock().unwrap();
            *state.fetches.entry(page_number).or_insert(0) += 1;
            (
                state.pages.get(&page_number).cloned(),
                state.delays.get(&page_number).copied(),
            )
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(delay.unwrap_or(Duration::from_millis(1))).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match script {
            Some(Script::Body(body)) => FetchOutcome::Fetched { body, attempts: 1 },
            Some(Script::Fail) => FetchOutcome::Failed {
                attempts: 1,
                error: FetchError::Status(503),
            },
            None => FetchOutcome::Fetched {
                body: listing(&[]),
                attempts: 1,
            },
        }
    }
}
