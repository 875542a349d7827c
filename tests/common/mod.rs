//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use utc::artifacts::{ArtifactSink, MemorySink};
use utc::capture::{CaptureSettings, TrafficEntry, TrafficRecorder};
use utc::container::{ContainerRun, ContainerRuntime};
use utc::error::CheckError;
use utc::models::{AuditConfig, AuditRequest, CheckKind};
use utc::scanner::{CheckOutput, RunContext, Scanner};

/// Config for tests: no polling delay, short timeouts
pub fn test_config() -> AuditConfig {
    AuditConfig {
        timeout_secs: 10,
        user_agent: "utc-test/0.1.0".to_string(),
        output_dir: std::env::temp_dir().join(format!("utc-test-{}", uuid::Uuid::new_v4())),
        tls_poll_interval_secs: 0,
        tls_max_attempts: 10,
        ..AuditConfig::default()
    }
}

/// Context backed by a memory sink and fake browser/container
pub fn test_context(config: AuditConfig, sink: Arc<dyn ArtifactSink>) -> RunContext {
    RunContext::from_config(config)
        .expect("Failed to create context")
        .with_sink(sink)
        .with_recorder(Arc::new(FakeRecorder::with_entries(3)))
        .with_container(Arc::new(FakeContainer::unavailable()))
}

pub fn memory_sink() -> Arc<MemorySink> {
    Arc::new(MemorySink::new())
}

/// Browser stand-in returning canned traffic
pub struct FakeRecorder {
    result: Result<Vec<TrafficEntry>, CheckError>,
}

impl FakeRecorder {
    pub fn with_entries(n: usize) -> Self {
        let entries = (0..n)
            .map(|i| {
                let mut entry = TrafficEntry::new("GET", format!("https://example.com/asset/{i}"));
                entry.id = i as u64;
                entry.status_code = Some(200);
                entry
            })
            .collect();
        Self {
            result: Ok(entries),
        }
    }

    pub fn failing(error: CheckError) -> Self {
        Self { result: Err(error) }
    }
}

#[async_trait]
impl TrafficRecorder for FakeRecorder {
    async fn record(
        &self,
        _url: &str,
        _settings: &CaptureSettings,
    ) -> Result<Vec<TrafficEntry>, CheckError> {
        self.result.clone()
    }
}

/// Container runtime stand-in
pub struct FakeContainer {
    result: Result<ContainerRun, CheckError>,
}

impl FakeContainer {
    pub fn unavailable() -> Self {
        Self {
            result: Err(CheckError::runtime_unavailable("docker: command not found")),
        }
    }

    pub fn finished(exit_code: i32, report: &str) -> Self {
        Self {
            result: Ok(ContainerRun {
                exit_code,
                report: Some(report.as_bytes().to_vec()),
            }),
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainer {
    async fn run_baseline(
        &self,
        _target: &str,
        _report_name: &str,
    ) -> Result<ContainerRun, CheckError> {
        self.result.clone()
    }
}

/// Check that panics instead of returning
pub struct PanickingScanner(pub CheckKind);

#[async_trait]
impl Scanner for PanickingScanner {
    fn kind(&self) -> CheckKind {
        self.0
    }

    fn description(&self) -> &str {
        "panics"
    }

    async fn scan(
        &self,
        _request: &AuditRequest,
        _ctx: &RunContext,
    ) -> Result<CheckOutput, CheckError> {
        panic!("boom");
    }
}

/// Check that sleeps and counts how often it started
pub struct SlowScanner {
    pub kind: CheckKind,
    pub delay: Duration,
    pub started: Arc<AtomicUsize>,
}

#[async_trait]
impl Scanner for SlowScanner {
    fn kind(&self) -> CheckKind {
        self.kind
    }

    fn description(&self) -> &str {
        "sleeps"
    }

    async fn scan(
        &self,
        _request: &AuditRequest,
        _ctx: &RunContext,
    ) -> Result<CheckOutput, CheckError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Err(CheckError::internal("slow check finished"))
    }
}

/// Sink that fails every write
pub struct BrokenSink;

#[async_trait]
impl ArtifactSink for BrokenSink {
    async fn write(&self, _name: &str, _contents: &[u8]) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only reports directory",
        ))
    }

    fn location(&self, name: &str) -> String {
        PathBuf::from("/read-only").join(name).display().to_string()
    }
}
