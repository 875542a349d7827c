//! Network traffic capture through a headless browser
//!
//! The browser is driven behind [`TrafficRecorder`] so the audit engine can
//! run against a fake recorder in tests. The Chromium implementation is only
//! available with the `browser` feature.

pub mod browser;
pub mod har;
pub mod traffic;

use crate::error::CheckError;
use async_trait::async_trait;
use std::time::Duration;

pub use browser::ChromiumRecorder;
pub use traffic::{TrafficEntry, TrafficLog};

/// Timing knobs for a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Upper bound for the page load
    pub navigation_timeout: Duration,
    /// Extra time after load to catch late asynchronous requests
    pub settle: Duration,
}

impl CaptureSettings {
    /// Headroom over the navigation timeout for individual DevTools commands
    const CDP_MARGIN: Duration = Duration::from_secs(10);

    /// Timeout for a single DevTools command. It must outlast the navigation
    /// timeout so a slow `goto` fails with our message, not the client's.
    pub fn cdp_timeout(&self) -> Duration {
        self.navigation_timeout + Self::CDP_MARGIN
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(60),
            settle: Duration::from_secs(3),
        }
    }
}

/// Records every request/response a page load triggers
#[async_trait]
pub trait TrafficRecorder: Send + Sync {
    /// Navigates to `url` and returns the captured traffic. The browser
    /// session is torn down before returning, on success and on error.
    async fn record(
        &self,
        url: &str,
        settings: &CaptureSettings,
    ) -> Result<Vec<TrafficEntry>, CheckError>;
}
