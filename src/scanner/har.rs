//! Network traffic capture check

use super::{CheckOutput, RunContext};
use crate::capture::har::to_har;
use crate::error::CheckError;
use crate::models::{AuditRequest, CheckKind, CheckPayload, HarCapture};
use async_trait::async_trait;
use tracing::info;

/// Captures the target's page-load traffic as a HAR file
pub struct HarScanner;

#[async_trait]
impl super::Scanner for HarScanner {
    fn kind(&self) -> CheckKind {
        CheckKind::Har
    }

    fn description(&self) -> &str {
        "Records page-load network traffic with a headless browser (HAR)"
    }

    async fn scan(
        &self,
        request: &AuditRequest,
        ctx: &RunContext,
    ) -> Result<CheckOutput, CheckError> {
        info!("Capturing HAR (network traffic) for {}", request.target_str());
        let entries = ctx
            .recorder
            .record(request.target_str(), &ctx.capture_settings())
            .await?;
        let artifact = to_har(&entries)?;

        Ok(CheckOutput {
            payload: CheckPayload::Har(HarCapture {
                entries: entries.len(),
            }),
            artifact: Some(artifact),
        })
    }
}
