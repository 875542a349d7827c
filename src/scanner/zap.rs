//! Containerized baseline scan (opt-in)

use super::{CheckOutput, RunContext};
use crate::error::CheckError;
use crate::models::{AuditRequest, BaselineScan, CheckKind, CheckPayload};
use async_trait::async_trait;
use tracing::{info, warn};

/// Runs the OWASP ZAP baseline scan through the container runtime
pub struct ZapScanner;

#[async_trait]
impl super::Scanner for ZapScanner {
    fn kind(&self) -> CheckKind {
        CheckKind::Zap
    }

    fn description(&self) -> &str {
        "Runs the OWASP ZAP baseline scan in a container (requires Docker)"
    }

    async fn scan(
        &self,
        request: &AuditRequest,
        ctx: &RunContext,
    ) -> Result<CheckOutput, CheckError> {
        info!("Running OWASP ZAP Baseline for {}", request.target_str());
        let report_name = self.kind().artifact_name();

        let run = ctx
            .container
            .run_baseline(request.target_str(), report_name)
            .await
            .inspect_err(|e| {
                if e.kind.is_soft() {
                    warn!("ZAP Baseline skipped: {e}. Ensure Docker is installed and running.");
                }
            })?;

        if run.exit_code != 0 {
            warn!(
                "ZAP Baseline exited with code {}, see the report for details",
                run.exit_code
            );
        }

        Ok(CheckOutput {
            payload: CheckPayload::Zap(BaselineScan {
                exit_code: run.exit_code,
                report: run.report.as_ref().map(|_| report_name.to_string()),
            }),
            artifact: run.report,
        })
    }
}
