//! Security audit engine and check trait definitions

pub mod har;
pub mod headers;
pub mod tls;
pub mod zap;

use crate::artifacts::{ArtifactSink, DirectorySink};
use crate::capture::{CaptureSettings, ChromiumRecorder, TrafficRecorder};
use crate::container::{ContainerRuntime, DockerCli};
use crate::error::{AuditError, CheckError, Result};
use crate::http::HttpClient;
use crate::models::{
    AuditConfig, AuditRequest, AuditSummary, CheckKind, CheckPayload, CheckResult,
};
use crate::poll::PollPolicy;
use async_trait::async_trait;
use futures::FutureExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What a check hands back to the engine on success
#[derive(Debug, Clone)]
pub struct CheckOutput {
    pub payload: CheckPayload,
    /// Bytes of the check's artifact, persisted under `CheckKind::artifact_name`
    pub artifact: Option<Vec<u8>>,
}

/// Trait that all audit checks must implement
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Which check this is
    fn kind(&self) -> CheckKind;

    /// Returns a description of what this check does
    fn description(&self) -> &str;

    /// Executes the check against the request target
    async fn scan(
        &self,
        request: &AuditRequest,
        ctx: &RunContext,
    ) -> std::result::Result<CheckOutput, CheckError>;
}

/// Everything a run needs besides the request itself
#[derive(Clone)]
pub struct RunContext {
    pub config: AuditConfig,
    pub client: HttpClient,
    pub sink: Arc<dyn ArtifactSink>,
    pub recorder: Arc<dyn TrafficRecorder>,
    pub container: Arc<dyn ContainerRuntime>,
    pub cancel: CancellationToken,
    pub show_progress: bool,
}

impl RunContext {
    /// Production context: reports directory, headless Chromium, docker CLI
    pub fn from_config(config: AuditConfig) -> Result<Self> {
        let client = HttpClient::from_config(&config)?;
        let sink = Arc::new(DirectorySink::new(&config.output_dir));
        let container = Arc::new(DockerCli::new(
            config.docker_bin.clone(),
            config.zap_image.clone(),
            config.output_dir.clone(),
        ));
        Ok(Self {
            config,
            client,
            sink,
            recorder: Arc::new(ChromiumRecorder),
            container,
            cancel: CancellationToken::new(),
            show_progress: false,
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn TrafficRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_container(mut self, container: Arc<dyn ContainerRuntime>) -> Self {
        self.container = container;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.config.tls_poll_interval_secs),
            self.config.tls_max_attempts,
        )
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            navigation_timeout: Duration::from_secs(self.config.navigation_timeout_secs),
            settle: Duration::from_millis(self.config.settle_ms),
        }
    }
}

/// Cancels the run token when the deadline passes; disarmed on drop
struct DeadlineGuard(Option<JoinHandle<()>>);

impl DeadlineGuard {
    fn arm(cancel: &CancellationToken, deadline: Option<Duration>) -> Self {
        Self(deadline.map(|after| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                warn!("Run deadline of {after:?} reached, cancelling unfinished checks");
                cancel.cancel();
            })
        }))
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// Orchestrates the execution of all registered checks
pub struct AuditEngine {
    scanners: Vec<Arc<dyn Scanner>>,
}

impl AuditEngine {
    /// Creates a new AuditEngine with no registered checks
    pub fn new() -> Self {
        Self {
            scanners: Vec::new(),
        }
    }

    /// Creates an AuditEngine with all checks registered in execution order
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.register(Arc::new(headers::HeadersScanner));
        engine.register(Arc::new(tls::TlsScanner));
        engine.register(Arc::new(har::HarScanner));
        engine.register(Arc::new(zap::ZapScanner));
        engine
    }

    /// Registers a check; a later registration for the same kind replaces it
    pub fn register(&mut self, scanner: Arc<dyn Scanner>) {
        self.scanners.retain(|s| s.kind() != scanner.kind());
        self.scanners.push(scanner);
        self.scanners.sort_by_key(|s| s.kind());
    }

    /// Returns information about all registered checks
    pub fn list_checks(&self) -> Vec<(&'static str, &str)> {
        self.scanners
            .iter()
            .map(|s| (s.kind().name(), s.description()))
            .collect()
    }

    /// Runs every enabled check and writes the summary artifact.
    ///
    /// Individual check failures are recorded in the summary; only a failure
    /// to write the summary itself is returned as an error.
    pub async fn run(&self, request: &AuditRequest, ctx: &RunContext) -> Result<AuditSummary> {
        let mut summary = AuditSummary::new(request.target_str());
        info!(
            run_id = %summary.run_id,
            "Network security suite for {}",
            request.target_str()
        );

        let _deadline = DeadlineGuard::arm(
            &ctx.cancel,
            ctx.config.deadline_secs.map(Duration::from_secs),
        );

        let enabled: Vec<Arc<dyn Scanner>> = self
            .scanners
            .iter()
            .filter(|s| request.checks().contains(s.kind()))
            .cloned()
            .collect();

        if ctx.config.concurrent {
            self.run_concurrent(&enabled, request, ctx, &mut summary).await;
        } else {
            self.run_sequential(&enabled, request, ctx, &mut summary).await;
        }

        for kind in request.checks().iter() {
            if summary.get(kind).is_none() {
                error!("Check '{kind}' did not report a result");
                summary.record(
                    kind,
                    CheckResult::failed(CheckError::internal("check did not report a result")),
                );
            }
        }

        summary.finish();
        let json = serde_json::to_vec_pretty(&summary)?;
        ctx.sink
            .write(AuditSummary::ARTIFACT_NAME, &json)
            .await
            .map_err(|source| AuditError::ArtifactError {
                name: AuditSummary::ARTIFACT_NAME.to_string(),
                source,
            })?;
        info!(
            "Security summary written to {} ({} HTTP requests sent)",
            ctx.sink.location(AuditSummary::ARTIFACT_NAME),
            ctx.client.request_count()
        );

        Ok(summary)
    }

    fn progress_bar(ctx: &RunContext, len: usize) -> ProgressBar {
        if !ctx.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb
    }

    /// Sequential execution in fixed check order
    async fn run_sequential(
        &self,
        scanners: &[Arc<dyn Scanner>],
        request: &AuditRequest,
        ctx: &RunContext,
        summary: &mut AuditSummary,
    ) {
        let pb = Self::progress_bar(ctx, scanners.len());

        for scanner in scanners {
            let kind = scanner.kind();
            pb.set_message(format!("Running {kind}..."));
            info!("Executing check: {kind}");

            let result = execute_check(scanner.as_ref(), request, ctx).await;
            log_result(kind, &result);
            summary.record(kind, result);

            pb.inc(1);
        }

        pb.finish_with_message("Audit complete");
    }

    /// Concurrent execution using JoinSet
    async fn run_concurrent(
        &self,
        scanners: &[Arc<dyn Scanner>],
        request: &AuditRequest,
        ctx: &RunContext,
        summary: &mut AuditSummary,
    ) {
        let pb = Self::progress_bar(ctx, scanners.len());
        pb.set_message("Running checks concurrently...");

        let mut set = JoinSet::new();

        for scanner in scanners {
            let scanner = Arc::clone(scanner);
            let request = request.clone();
            let ctx = ctx.clone();

            set.spawn(async move {
                let kind = scanner.kind();
                info!("Executing check: {kind}");
                let result = execute_check(scanner.as_ref(), &request, &ctx).await;
                (kind, result)
            });
        }

        while let Some(join_result) = set.join_next().await {
            match join_result {
                Ok((kind, result)) => {
                    log_result(kind, &result);
                    summary.record(kind, result);
                }
                Err(e) => {
                    error!("Check task failed to complete: {e}");
                }
            }
            pb.inc(1);
        }

        pb.finish_with_message("Audit complete");
    }
}

impl Default for AuditEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Runs one check in isolation: errors, panics, cancellation and artifact
/// write failures all end up as the check's own result.
async fn execute_check(
    scanner: &dyn Scanner,
    request: &AuditRequest,
    ctx: &RunContext,
) -> CheckResult {
    let kind = scanner.kind();

    if ctx.cancel.is_cancelled() {
        return CheckResult::failed(CheckError::cancelled());
    }

    let guarded = AssertUnwindSafe(scanner.scan(request, ctx)).catch_unwind();
    let outcome = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return CheckResult::failed(CheckError::cancelled()),
        outcome = guarded => outcome,
    };

    let output = match outcome {
        Ok(Ok(output)) => output,
        Ok(Err(error)) => return CheckResult::failed(error),
        Err(panic) => {
            return CheckResult::failed(CheckError::internal(format!(
                "check panicked: {}",
                panic_message(panic.as_ref())
            )))
        }
    };

    let artifact = match output.artifact {
        Some(bytes) => {
            let name = kind.artifact_name();
            if let Err(e) = ctx.sink.write(name, &bytes).await {
                return CheckResult::failed(CheckError::internal(format!(
                    "failed to write {name}: {e}"
                )));
            }
            info!("{kind} artifact saved to {}", ctx.sink.location(name));
            Some(name.to_string())
        }
        None => None,
    };

    CheckResult::ok(output.payload, artifact)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn log_result(kind: CheckKind, result: &CheckResult) {
    match result {
        CheckResult::Ok { .. } => info!("Check '{kind}' completed"),
        CheckResult::Warning { error } => warn!("Check '{kind}' skipped: {error}"),
        CheckResult::Error { error } => error!("Check '{kind}' failed: {error}"),
    }
}
