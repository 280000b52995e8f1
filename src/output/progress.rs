//! Status updates pushed to an optional observer during a crawl

use std::fmt;

/// Terminal status attached to an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Failed,
}

/// One progress notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Percentage in 0..=100, if known
    pub progress: Option<u8>,
    pub message: String,
    pub details: Option<String>,
    pub status: Option<UpdateStatus>,
}

impl StatusUpdate {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            progress: None,
            message: message.into(),
            details: None,
            status: None,
        }
    }

    /// An update announcing that the crawl failed
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(UpdateStatus::Failed),
            ..Self::new(message)
        }
    }

    /// Sets the percentage, clamped to 100
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == Some(UpdateStatus::Failed)
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(progress) = self.progress {
            write!(f, "{}% - ", progress)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Receiver of crawl status updates
///
/// Any `Fn(&StatusUpdate)` closure is a reporter.
pub trait StatusReporter: Send + Sync {
    fn report(&self, update: &StatusUpdate);
}

impl<F> StatusReporter for F
where
    F: Fn(&StatusUpdate) + Send + Sync,
{
    fn report(&self, update: &StatusUpdate) {
        self(update)
    }
}

/// Forwards updates to the log
///
/// Updates on a 10% boundary are logged at info, the rest at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    fn report(&self, update: &StatusUpdate) {
        if update.is_failed() {
            tracing::error!("Catalog update failed: {}", update);
            return;
        }

        match update.progress {
            Some(progress) if progress % 10 == 0 => tracing::info!("Catalog update: {}", update),
            _ => tracing::debug!("Catalog update: {}", update),
        }
    }
}
