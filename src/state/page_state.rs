/// Page status definitions for a single processed catalog page
use std::fmt;

/// Outcome of fetching and extracting one catalog page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    /// Page was fetched and at least one product entry was recognized
    Extracted,

    /// Page was fetched but contained no product entries (end of catalog)
    Empty,

    /// Page could not be fetched after all retries
    FetchFailed,
}

impl PageStatus {
    /// Returns true if the page content was obtained
    pub fn is_fetched(&self) -> bool {
        !matches!(self, Self::FetchFailed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracted => "extracted",
            Self::Empty => "empty",
            Self::FetchFailed => "fetch_failed",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
