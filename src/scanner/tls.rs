//! TLS grade lookup through a remote assessment API
//!
//! The assessment service works asynchronously: the first calls usually
//! answer with a pending status while the remote scan runs. The check polls
//! with a fixed interval and a fixed attempt budget; running out of budget
//! is not an error, the last payload is kept as-is.

use super::{CheckOutput, RunContext};
use crate::error::{CheckError, ErrorKind};
use crate::http::HttpClient;
use crate::models::{AuditRequest, CheckKind, CheckPayload, TlsAssessment};
use crate::poll::poll_until;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

/// Looks up the TLS grade of the target host
pub struct TlsScanner;

/// Statuses after which the remote assessment will not change anymore
pub const TERMINAL_STATUSES: [&str; 2] = ["READY", "ERROR"];

/// Returns the `status` field of an assessment payload
pub fn status_of(payload: &Value) -> Option<&str> {
    payload.get("status").and_then(Value::as_str)
}

pub fn is_terminal(payload: &Value) -> bool {
    status_of(payload).is_some_and(|status| TERMINAL_STATUSES.contains(&status))
}

/// Builds the analyze URL asking for a cached assessment when available
pub fn analyze_url(endpoint: &str, host: &str) -> Result<Url, CheckError> {
    Url::parse_with_params(
        endpoint,
        &[
            ("host", host),
            ("publish", "off"),
            ("fromCache", "on"),
            ("all", "done"),
        ],
    )
    .map_err(|e| CheckError::new(ErrorKind::InvalidRequest, format!("Invalid TLS endpoint: {e}")))
}

/// HTTP statuses the assessment service uses to shed load (529 is its
/// "overloaded" code). They count as a pending poll step.
pub const THROTTLE_STATUSES: [u16; 3] = [429, 503, 529];

/// Status recorded for a throttled poll step
pub const RATE_LIMITED: &str = "RATE_LIMITED";

/// One call to the assessment API. Only transport failures are errors; a
/// throttled answer yields a non-terminal payload so polling continues.
async fn fetch_assessment(client: &HttpClient, url: &Url) -> Result<Value, CheckError> {
    let response = client.get(url.as_str()).await?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CheckError::network(format!("Failed to read TLS assessment: {e}")))?;

    if THROTTLE_STATUSES.contains(&status.as_u16()) {
        warn!("TLS assessment API throttled the request (HTTP {status})");
        return Ok(json!({
            "status": RATE_LIMITED,
            "httpStatus": status.as_u16(),
        }));
    }

    serde_json::from_str(&body).map_err(|e| {
        CheckError::new(
            ErrorKind::InvalidResponse,
            format!("TLS assessment API returned invalid JSON (HTTP {status}): {e}"),
        )
    })
}

#[async_trait]
impl super::Scanner for TlsScanner {
    fn kind(&self) -> CheckKind {
        CheckKind::Tls
    }

    fn description(&self) -> &str {
        "Polls a remote TLS assessment service for the target host's grade"
    }

    async fn scan(
        &self,
        request: &AuditRequest,
        ctx: &RunContext,
    ) -> Result<CheckOutput, CheckError> {
        let host = request.host().to_string();
        let url = analyze_url(&ctx.config.tls_endpoint, &host)?;
        info!("Checking TLS grade for {host}");

        let polled = poll_until(
            ctx.poll_policy(),
            |attempt| {
                debug!("TLS assessment attempt {attempt} for {host}");
                fetch_assessment(&ctx.client, &url)
            },
            is_terminal,
        )
        .await?;

        let status = status_of(&polled.value).unwrap_or("UNKNOWN").to_string();
        if !polled.terminal {
            warn!(
                "TLS assessment still {status} after {} attempts, keeping last payload",
                polled.attempts
            );
        }

        let artifact = serde_json::to_vec_pretty(&polled.value)
            .map_err(|e| CheckError::internal(e.to_string()))?;

        Ok(CheckOutput {
            payload: CheckPayload::Tls(TlsAssessment {
                host,
                attempts: polled.attempts,
                status,
                payload: polled.value,
            }),
            artifact: Some(artifact),
        })
    }
}
