//! URL handling for the catalog crawler
//!
//! This module builds listing page URLs from the configured template and
//! resolves product links found on a page into absolute URLs.

mod resolve;
mod template;

pub use resolve::resolve_link;
pub use template::{build_page_url, PAGE_PLACEHOLDER, PAGE_SIZE_PLACEHOLDER};
