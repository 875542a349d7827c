//! Terminal rendering of a finished audit

use crate::models::{AuditSummary, CheckPayload, CheckResult};
use tabled::builder::Builder;
use tabled::settings::Style;

fn detail(result: &CheckResult) -> String {
    match result {
        CheckResult::Ok { data, .. } => match data {
            CheckPayload::Headers(audit) => format!("{} finding(s)", audit.findings.len()),
            CheckPayload::Tls(tls) => format!("{} after {} attempt(s)", tls.status, tls.attempts),
            CheckPayload::Har(har) => format!("{} request(s) captured", har.entries),
            CheckPayload::Zap(scan) => format!("scanner exit code {}", scan.exit_code),
        },
        CheckResult::Warning { error } | CheckResult::Error { error } => error.to_string(),
    }
}

fn status(result: &CheckResult) -> &'static str {
    match result {
        CheckResult::Ok { .. } => "ok",
        CheckResult::Warning { .. } => "warning",
        CheckResult::Error { .. } => "error",
    }
}

/// One row per check, in check order
pub fn summary_table(summary: &AuditSummary) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Check", "Status", "Detail", "Artifact"]);

    for (kind, result) in &summary.results {
        builder.push_record([
            kind.name().to_string(),
            status(result).to_string(),
            detail(result),
            result.artifact().unwrap_or("-").to_string(),
        ]);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;
    use crate::models::{CheckKind, HarCapture};

    #[test]
    fn table_lists_each_recorded_check() {
        let mut summary = AuditSummary::new("https://example.com");
        summary.record(
            CheckKind::Har,
            CheckResult::ok(
                CheckPayload::Har(HarCapture { entries: 12 }),
                Some("traffic.har".to_string()),
            ),
        );
        summary.record(
            CheckKind::Zap,
            CheckResult::failed(CheckError::runtime_unavailable("docker not found")),
        );

        let table = summary_table(&summary);
        assert!(table.contains("12 request(s) captured"));
        assert!(table.contains("traffic.har"));
        assert!(table.contains("warning"));
        assert!(!table.contains("headers"));
    }
}
