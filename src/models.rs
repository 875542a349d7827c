//! Core data models for utc

use crate::error::{AuditError, CheckError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Severity level for header findings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
        }
    }
}

/// The audits the security suite knows how to run, in execution order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Headers,
    Tls,
    Har,
    Zap,
}

impl CheckKind {
    pub const ALL: [CheckKind; 4] = [
        CheckKind::Headers,
        CheckKind::Tls,
        CheckKind::Har,
        CheckKind::Zap,
    ];

    /// Name used as the summary key
    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::Headers => "headers",
            CheckKind::Tls => "tls",
            CheckKind::Har => "har",
            CheckKind::Zap => "zap",
        }
    }

    /// File name of the artifact this check writes into the reports directory
    pub fn artifact_name(&self) -> &'static str {
        match self {
            CheckKind::Headers => "security-headers.json",
            CheckKind::Tls => "ssl-labs.json",
            CheckKind::Har => "traffic.har",
            CheckKind::Zap => "zap-baseline-report.html",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of checks enabled for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledChecks(BTreeSet<CheckKind>);

impl EnabledChecks {
    /// Builds the set from the per-check toggles exposed by the CLI and UI
    pub fn new(headers: bool, tls: bool, har: bool, zap: bool) -> Self {
        let flags = [headers, tls, har, zap];
        Self(
            CheckKind::ALL
                .iter()
                .zip(flags)
                .filter(|(_, on)| *on)
                .map(|(kind, _)| *kind)
                .collect(),
        )
    }

    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn all() -> Self {
        Self(CheckKind::ALL.into_iter().collect())
    }

    pub fn with(mut self, kind: CheckKind) -> Self {
        self.0.insert(kind);
        self
    }

    pub fn without(mut self, kind: CheckKind) -> Self {
        self.0.remove(&kind);
        self
    }

    pub fn contains(&self, kind: CheckKind) -> bool {
        self.0.contains(&kind)
    }

    /// Iterates in execution order
    pub fn iter(&self) -> impl Iterator<Item = CheckKind> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for EnabledChecks {
    /// Headers, TLS and HAR; the baseline scan is opt-in
    fn default() -> Self {
        Self::new(true, true, true, false)
    }
}

/// A validated request to audit one target
#[derive(Debug, Clone)]
pub struct AuditRequest {
    target: Url,
    raw: String,
    checks: EnabledChecks,
}

impl AuditRequest {
    /// Validates the target URL. Fails before any check runs.
    pub fn new(target: &str, checks: EnabledChecks) -> Result<Self> {
        let trimmed = target.trim();
        if trimmed.is_empty() {
            return Err(AuditError::InvalidRequest("Missing --url".to_string()));
        }
        let url = Url::parse(trimmed)
            .map_err(|e| AuditError::InvalidRequest(format!("Malformed URL '{trimmed}': {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AuditError::InvalidRequest(format!(
                "Unsupported scheme '{}' (expected http or https)",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(AuditError::InvalidRequest(format!(
                "URL '{trimmed}' has no host"
            )));
        }
        Ok(Self {
            target: url,
            raw: trimmed.to_string(),
            checks,
        })
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Target URL exactly as the caller supplied it (after trimming)
    pub fn target_str(&self) -> &str {
        &self.raw
    }

    pub fn host(&self) -> &str {
        self.target.host_str().unwrap_or_default()
    }

    pub fn is_https(&self) -> bool {
        self.target.scheme() == "https"
    }

    pub fn checks(&self) -> &EnabledChecks {
        &self.checks
    }
}

/// Kind of header finding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FindingType {
    /// A required header is absent
    Missing,
    /// A header is present with an unexpected value
    Value,
}

/// A single policy violation found by the header audit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeaderFinding {
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    pub key: String,
    pub severity: Severity,
    pub desc: String,
}

/// Header audit payload, also the content of `security-headers.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeaderAudit {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub findings: Vec<HeaderFinding>,
}

/// TLS assessment as returned by the remote grading service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TlsAssessment {
    pub host: String,
    /// Number of API calls made while polling
    pub attempts: u32,
    /// Last status reported (READY, ERROR, or a pending status)
    pub status: String,
    /// Raw response body of the last call
    pub payload: serde_json::Value,
}

/// Summary of a HAR capture
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarCapture {
    pub entries: usize,
}

/// Outcome of the containerized baseline scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BaselineScan {
    /// Scanner exit code; non-zero means the scan reported problems
    pub exit_code: i32,
    /// Artifact name of the native report, when the scanner produced one
    pub report: Option<String>,
}

/// Check-specific success payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CheckPayload {
    Headers(HeaderAudit),
    Tls(TlsAssessment),
    Har(HarCapture),
    Zap(BaselineScan),
}

/// Result of one check: success payload or failure record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CheckResult {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artifact: Option<String>,
        data: CheckPayload,
    },
    /// Soft failure: the tool was unavailable, the run is not failed
    Warning { error: CheckError },
    Error { error: CheckError },
}

impl CheckResult {
    pub fn ok(data: CheckPayload, artifact: Option<String>) -> Self {
        CheckResult::Ok { artifact, data }
    }

    /// Classifies a failure as warning or error by its kind
    pub fn failed(error: CheckError) -> Self {
        if error.kind.is_soft() {
            CheckResult::Warning { error }
        } else {
            CheckResult::Error { error }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CheckResult::Ok { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CheckResult::Error { .. })
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, CheckResult::Warning { .. })
    }

    pub fn error(&self) -> Option<&CheckError> {
        match self {
            CheckResult::Ok { .. } => None,
            CheckResult::Warning { error } | CheckResult::Error { error } => Some(error),
        }
    }

    pub fn data(&self) -> Option<&CheckPayload> {
        match self {
            CheckResult::Ok { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn artifact(&self) -> Option<&str> {
        match self {
            CheckResult::Ok { artifact, .. } => artifact.as_deref(),
            _ => None,
        }
    }
}

/// Aggregate record of one audit run, written as `security-summary.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    pub url: String,
    pub run_id: String,
    pub results: BTreeMap<CheckKind, CheckResult>,
    pub timestamp: DateTime<Utc>,
}

impl AuditSummary {
    pub const ARTIFACT_NAME: &'static str = "security-summary.json";

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            run_id: uuid::Uuid::new_v4().to_string(),
            results: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn record(&mut self, kind: CheckKind, result: CheckResult) {
        self.results.insert(kind, result);
    }

    pub fn get(&self, kind: CheckKind) -> Option<&CheckResult> {
        self.results.get(&kind)
    }

    /// Checks that ended with a hard error
    pub fn failed_checks(&self) -> Vec<(CheckKind, &CheckError)> {
        self.results
            .iter()
            .filter_map(|(kind, result)| match result {
                CheckResult::Error { error } => Some((*kind, error)),
                _ => None,
            })
            .collect()
    }

    /// Soft failures do not count
    pub fn has_failures(&self) -> bool {
        self.results.values().any(CheckResult::is_error)
    }

    /// Stamps the completion time
    pub fn finish(&mut self) {
        self.timestamp = Utc::now();
    }
}

/// Configuration for audit runs and the UI server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User-Agent header value
    pub user_agent: String,
    /// Whether to follow HTTP redirects
    pub follow_redirects: bool,
    /// HTTP/HTTPS proxy URL
    pub proxy: Option<String>,
    /// Directory receiving artifacts; each run overwrites the previous one
    pub output_dir: PathBuf,
    /// Run independent checks concurrently
    #[serde(default)]
    pub concurrent: bool,
    /// Abort the run after this many seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    /// TLS assessment endpoint
    #[serde(default = "default_tls_endpoint")]
    pub tls_endpoint: String,
    /// Seconds between TLS assessment polls
    #[serde(default = "default_tls_poll_interval")]
    pub tls_poll_interval_secs: u64,
    /// Maximum TLS assessment calls
    #[serde(default = "default_tls_max_attempts")]
    pub tls_max_attempts: u32,
    /// Browser navigation timeout in seconds
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,
    /// Wait after page load for late requests, in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Container runtime binary
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
    /// Baseline scanner image
    #[serde(default = "default_zap_image")]
    pub zap_image: String,
    /// UI server port
    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

fn default_tls_endpoint() -> String {
    "https://api.ssllabs.com/api/v3/analyze".to_string()
}

fn default_tls_poll_interval() -> u64 {
    8
}

fn default_tls_max_attempts() -> u32 {
    10
}

fn default_navigation_timeout() -> u64 {
    60
}

fn default_settle_ms() -> u64 {
    3000
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

fn default_zap_image() -> String {
    "owasp/zap2docker-stable".to_string()
}

fn default_server_port() -> u16 {
    3000
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("utc/{}", env!("CARGO_PKG_VERSION")),
            follow_redirects: true,
            proxy: None,
            output_dir: PathBuf::from("reports"),
            concurrent: false,
            deadline_secs: None,
            tls_endpoint: default_tls_endpoint(),
            tls_poll_interval_secs: default_tls_poll_interval(),
            tls_max_attempts: default_tls_max_attempts(),
            navigation_timeout_secs: default_navigation_timeout(),
            settle_ms: default_settle_ms(),
            docker_bin: default_docker_bin(),
            zap_image: default_zap_image(),
            server_port: default_server_port(),
        }
    }
}
