//! Output module for crawl progress and catalog reports
//!
//! This module handles:
//! - Status updates pushed to an optional observer during a crawl
//! - Forwarding those updates to the log
//! - Statistics of the saved catalog

mod progress;
pub mod stats;

pub use progress::{StatusReporter, StatusUpdate, TracingReporter, UpdateStatus};
pub use stats::{load_statistics, print_statistics, CatalogStatistics};
