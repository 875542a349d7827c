//! Security headers audit

use super::{CheckOutput, RunContext};
use crate::error::CheckError;
use crate::models::{
    AuditRequest, CheckKind, CheckPayload, FindingType, HeaderAudit, HeaderFinding, Severity,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::BTreeMap;
use tracing::debug;

/// Audits HTTP response headers against a fixed policy table
pub struct HeadersScanner;

/// When a header must be present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Always,
    /// Only meaningful when the target itself is served over TLS
    HttpsOnly,
}

struct HeaderRule {
    key: &'static str,
    requirement: Requirement,
    /// Expected value, compared case-insensitively
    expected: Option<&'static str>,
    desc: &'static str,
}

const MISSING_SEVERITY: Severity = Severity::Medium;
const WRONG_VALUE_SEVERITY: Severity = Severity::Low;

const POLICY: [HeaderRule; 6] = [
    HeaderRule {
        key: "content-security-policy",
        requirement: Requirement::Always,
        expected: None,
        desc: "CSP helps mitigate XSS",
    },
    HeaderRule {
        key: "strict-transport-security",
        requirement: Requirement::HttpsOnly,
        expected: None,
        desc: "HSTS enforces HTTPS",
    },
    HeaderRule {
        key: "x-content-type-options",
        requirement: Requirement::Always,
        expected: Some("nosniff"),
        desc: "Prevents MIME sniffing",
    },
    HeaderRule {
        key: "x-frame-options",
        requirement: Requirement::Always,
        expected: None,
        desc: "Clickjacking protection",
    },
    HeaderRule {
        key: "referrer-policy",
        requirement: Requirement::Always,
        expected: None,
        desc: "Controls referrer leakage",
    },
    HeaderRule {
        key: "permissions-policy",
        requirement: Requirement::Always,
        expected: None,
        desc: "Restrict powerful features",
    },
];

impl HeaderRule {
    fn required(&self, https: bool) -> bool {
        match self.requirement {
            Requirement::Always => true,
            Requirement::HttpsOnly => https,
        }
    }
}

/// Lower-cases header names; repeated headers are joined with `, `
pub fn normalize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut normalized: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        normalized
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    normalized
}

/// Evaluates lower-cased response headers against the policy table.
/// Findings come out in table order.
pub fn evaluate(headers: &BTreeMap<String, String>, https: bool) -> Vec<HeaderFinding> {
    let mut findings = Vec::new();

    for rule in &POLICY {
        let value = headers.get(rule.key);
        debug!("Checking header '{}': {:?}", rule.key, value);

        match (value, rule.expected) {
            (None, _) if rule.required(https) => findings.push(HeaderFinding {
                finding_type: FindingType::Missing,
                key: rule.key.to_string(),
                severity: MISSING_SEVERITY,
                desc: rule.desc.to_string(),
            }),
            (Some(actual), Some(expected)) if actual.to_lowercase() != expected => {
                findings.push(HeaderFinding {
                    finding_type: FindingType::Value,
                    key: rule.key.to_string(),
                    severity: WRONG_VALUE_SEVERITY,
                    desc: format!("Expected '{expected}', got '{actual}'"),
                })
            }
            _ => {}
        }
    }

    findings
}

#[async_trait]
impl super::Scanner for HeadersScanner {
    fn kind(&self) -> CheckKind {
        CheckKind::Headers
    }

    fn description(&self) -> &str {
        "Audits HTTP response headers for missing or misconfigured protections"
    }

    async fn scan(
        &self,
        request: &AuditRequest,
        ctx: &RunContext,
    ) -> Result<CheckOutput, CheckError> {
        let response = ctx.client.get(request.target_str()).await?;
        let headers = normalize_headers(response.headers());
        let findings = evaluate(&headers, request.is_https());
        debug!("Header audit found {} issues", findings.len());

        let audit = HeaderAudit {
            url: request.target_str().to_string(),
            headers,
            findings,
        };
        let artifact = serde_json::to_vec_pretty(&audit)
            .map_err(|e| CheckError::internal(e.to_string()))?;

        Ok(CheckOutput {
            payload: CheckPayload::Headers(audit),
            artifact: Some(artifact),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn hardened() -> BTreeMap<String, String> {
        headers(&[
            ("content-security-policy", "default-src 'self'"),
            ("strict-transport-security", "max-age=31536000"),
            ("x-content-type-options", "nosniff"),
            ("x-frame-options", "DENY"),
            ("referrer-policy", "no-referrer"),
            ("permissions-policy", "camera=()"),
        ])
    }

    #[test]
    fn hardened_response_has_no_findings() {
        assert!(evaluate(&hardened(), true).is_empty());
    }

    #[test]
    fn missing_csp_is_single_medium_finding() {
        let mut h = hardened();
        h.remove("content-security-policy");

        let findings = evaluate(&h, true);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].key, "content-security-policy");
        assert_eq!(findings[0].finding_type, FindingType::Missing);
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn hsts_only_required_for_https_targets() {
        let mut h = hardened();
        h.remove("strict-transport-security");

        assert!(evaluate(&h, false).is_empty());

        let findings = evaluate(&h, true);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].key, "strict-transport-security");
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn wrong_nosniff_value_is_low_value_finding() {
        let mut h = hardened();
        h.insert("x-content-type-options".to_string(), "SNIFF".to_string());

        let findings = evaluate(&h, true);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].finding_type, FindingType::Value);
        assert_eq!(findings[0].severity, Severity::Low);
        assert_eq!(findings[0].desc, "Expected 'nosniff', got 'SNIFF'");
    }

    #[test]
    fn expected_value_is_case_insensitive() {
        let mut h = hardened();
        h.insert("x-content-type-options".to_string(), "NoSniff".to_string());
        assert!(evaluate(&h, true).is_empty());
    }

    #[test]
    fn empty_response_lists_findings_in_table_order() {
        let keys: Vec<String> = evaluate(&BTreeMap::new(), true)
            .into_iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(
            keys,
            vec![
                "content-security-policy",
                "strict-transport-security",
                "x-content-type-options",
                "x-frame-options",
                "referrer-policy",
                "permissions-policy",
            ]
        );
    }

    #[test]
    fn repeated_headers_are_joined() {
        let mut map = HeaderMap::new();
        map.append("permissions-policy", "camera=()".parse().expect("value"));
        map.append("permissions-policy", "microphone=()".parse().expect("value"));

        let normalized = normalize_headers(&map);
        assert_eq!(normalized["permissions-policy"], "camera=(), microphone=()");
    }
}
