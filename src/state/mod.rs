//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageStatus`: Outcome of one fetched and extracted catalog page
//! - `CrawlCheckpoint`: Durable cursor and completed-page set used to resume
//! - `CrawlPhase`: Phases of the crawl controller's state machine

mod checkpoint;
mod crawl_phase;
mod page_state;

// Re-export main types
pub use checkpoint::CrawlCheckpoint;
pub use crawl_phase::CrawlPhase;
pub use page_state::PageStatus;
