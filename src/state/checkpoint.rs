use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Durable snapshot of crawl progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlCheckpoint {
    /// Next page the controller would start a batch at (0 if never saved)
    pub cursor_page: u32,

    /// Pages whose records are already in the partial catalog
    pub completed_pages: BTreeSet<u32>,

    /// When the checkpoint was written
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl CrawlCheckpoint {
    /// Returns true if nothing has been saved yet
    pub fn is_fresh(&self) -> bool {
        self.cursor_page == 0 && self.completed_pages.is_empty()
    }

    /// Returns the first page at or after `start_page` that is not completed
    pub fn first_missing_page(&self, start_page: u32) -> u32 {
        let mut page = start_page;
        while self.completed_pages.contains(&page) {
            page += 1;
        }
        page
    }

    /// Computes where a resumed crawl should start
    ///
    /// The saved cursor is never trusted past the first gap in
    /// `completed_pages`, so pages that failed in an earlier run are retried.
    pub fn resume_page(&self, start_page: u32) -> u32 {
        let first_missing = self.first_missing_page(start_page);
        if self.cursor_page < start_page {
            first_missing
        } else {
            self.cursor_page.min(first_missing)
        }
    }
}
