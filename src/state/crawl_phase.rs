use std::fmt;

/// Phases of the crawl controller
///
/// ```text
/// Init -> Resuming -> Crawling -> {StoppingNormal | StoppingLimit | Interrupted}
///      -> Finalizing -> Done
/// ```
///
/// `Finalizing` is reachable from every phase after `Init` so that progress
/// is saved even when crawling aborts early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    Init,
    Resuming,
    Crawling,
    /// The end-of-catalog signal was observed
    StoppingNormal,
    /// The page cursor passed the configured ceiling
    StoppingLimit,
    /// A stop request was received
    Interrupted,
    Finalizing,
    Done,
}

impl CrawlPhase {
    /// Returns true if the controller may move from `self` to `next`
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;
        matches!(
            (*self, next),
            (Init, Resuming)
                | (Resuming, Crawling)
                | (Resuming, Interrupted)
                | (Crawling, StoppingNormal)
                | (Crawling, StoppingLimit)
                | (Crawling, Interrupted)
                | (Resuming | Crawling | StoppingNormal | StoppingLimit | Interrupted, Finalizing)
                | (Finalizing, Done)
        )
    }

    /// Returns true for the three stopping phases
    pub fn is_stopping(&self) -> bool {
        matches!(
            self,
            Self::StoppingNormal | Self::StoppingLimit | Self::Interrupted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Resuming => "resuming",
            Self::Crawling => "crawling",
            Self::StoppingNormal => "stopping_normal",
            Self::StoppingLimit => "stopping_limit",
            Self::Interrupted => "interrupted",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
