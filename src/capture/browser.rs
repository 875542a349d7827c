//! Headless Chromium traffic recorder
//!
//! Subscribes to the DevTools network domain before navigating, so every
//! request of the page load (and of the settle period after it) lands in a
//! [`TrafficLog`](super::TrafficLog). Response bodies are fetched as soon as
//! the browser reports a load as finished.

use super::{CaptureSettings, TrafficEntry, TrafficRecorder};
use crate::error::CheckError;
use async_trait::async_trait;

#[cfg(feature = "browser")]
use super::traffic::{ResponseRecord, TrafficLog};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived, GetResponseBodyParams,
    Headers,
};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

/// Records page traffic with a headless Chromium instance
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumRecorder;

#[cfg(feature = "browser")]
#[async_trait]
impl TrafficRecorder for ChromiumRecorder {
    async fn record(
        &self,
        url: &str,
        settings: &CaptureSettings,
    ) -> Result<Vec<TrafficEntry>, CheckError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .request_timeout(settings.cdp_timeout())
            .build()
            .map_err(|e| CheckError::navigation(format!("Browser config error: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CheckError::navigation(format!("Failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {e}");
                }
            }
        });
        info!("Browser launched for traffic capture");

        let outcome = capture_page(&browser, url, settings).await;

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser cleanly: {e}");
        }
        let _ = browser.wait().await;
        handler_task.abort();

        outcome
    }
}

#[cfg(feature = "browser")]
async fn capture_page(
    browser: &Browser,
    url: &str,
    settings: &CaptureSettings,
) -> Result<Vec<TrafficEntry>, CheckError> {
    let nav_err = |e: chromiumoxide::error::CdpError| CheckError::navigation(e.to_string());

    let page: Page = browser.new_page("about:blank").await.map_err(nav_err)?;
    let mut requests = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(nav_err)?;
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(nav_err)?;
    let mut finished_loads = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(nav_err)?;

    let log = TrafficLog::new();
    let navigation = async {
        match tokio::time::timeout(settings.navigation_timeout, page.goto(url)).await {
            Err(_) => Err(CheckError::navigation(format!(
                "Navigation timeout of {}ms exceeded",
                settings.navigation_timeout.as_millis()
            ))),
            Ok(Err(e)) => Err(CheckError::navigation(format!("Navigation failed: {e}"))),
            Ok(Ok(_)) => {
                tokio::time::sleep(settings.settle).await;
                Ok(())
            }
        }
    };
    tokio::pin!(navigation);

    let finished = loop {
        tokio::select! {
            result = &mut navigation => break result,
            Some(event) = requests.next() => {
                let mut entry = TrafficEntry::new(event.request.method.clone(), event.request.url.clone());
                entry.request_headers = header_pairs(&event.request.headers);
                log.record_request(event.request_id.inner(), entry);
            }
            Some(event) = responses.next() => {
                let response = &event.response;
                log.record_response(
                    event.request_id.inner(),
                    ResponseRecord {
                        status: u16::try_from(response.status).unwrap_or_default(),
                        status_text: response.status_text.clone(),
                        protocol: response.protocol.clone(),
                        headers: header_pairs(&response.headers),
                        mime_type: response.mime_type.clone(),
                        size: response.encoded_data_length.max(0.0) as u64,
                    },
                );
            }
            Some(event) = finished_loads.next() => {
                match page.execute(GetResponseBodyParams::new(event.request_id.clone())).await {
                    Ok(body) => {
                        let body = body.result;
                        log.record_body(event.request_id.inner(), body.body, body.base64_encoded);
                    }
                    Err(e) => debug!("No body for request {}: {e}", event.request_id.inner()),
                }
            }
        }
    };

    finished?;
    debug!("Captured {} network entries for {}", log.len(), url);
    Ok(log.entries())
}

#[cfg(feature = "browser")]
fn header_pairs(headers: &Headers) -> Vec<(String, String)> {
    headers
        .inner()
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| {
                    let value = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Stub implementation when browser feature is not enabled
#[cfg(not(feature = "browser"))]
#[async_trait]
impl TrafficRecorder for ChromiumRecorder {
    async fn record(
        &self,
        _url: &str,
        _settings: &CaptureSettings,
    ) -> Result<Vec<TrafficEntry>, CheckError> {
        Err(CheckError::navigation(
            "Traffic capture requires the 'browser' feature flag. \
             Compile with: cargo build --features browser",
        ))
    }
}
