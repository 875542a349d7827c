//! Thin runners that delegate to external testing tools
//!
//! Each runner builds one command line and hands it to [`ToolCommand`]. The
//! tools' own output is either streamed to the terminal (CLI) or captured so
//! it can be returned to a UI client.

pub mod api;
pub mod perf;
pub mod setup;
pub mod web;

use crate::error::{AuditError, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};
use url::Url;

/// Where a tool's stdout/stderr go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Stream to the current terminal
    Inherit,
    /// Collect and return to the caller
    Capture,
}

/// Captured result of a tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// A command line for an external tool
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Command line as shown in logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the tool to completion. A non-zero exit is a `ToolError`.
    pub async fn run(&self, mode: OutputMode) -> Result<ToolOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        debug!(command = %self.display(), "running external tool");

        let output = match mode {
            OutputMode::Inherit => {
                let status = cmd
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(|e| self.spawn_error(e))?;
                ToolOutput {
                    exit_code: status.code(),
                    ..ToolOutput::default()
                }
            }
            OutputMode::Capture => {
                let output = cmd.output().await.map_err(|e| self.spawn_error(e))?;
                ToolOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            }
        };

        match output.exit_code {
            Some(0) => Ok(output),
            code => {
                let detail = output.stderr.trim();
                Err(AuditError::ToolError {
                    tool: self.display(),
                    message: match code {
                        Some(code) if detail.is_empty() => format!("exited with code {code}"),
                        Some(code) => format!("exited with code {code}: {detail}"),
                        None => "terminated by signal".to_string(),
                    },
                })
            }
        }
    }

    fn spawn_error(&self, e: std::io::Error) -> AuditError {
        AuditError::ToolError {
            tool: self.program.clone(),
            message: format!("failed to start: {e}"),
        }
    }
}

/// Validates a target URL for the runners
pub fn parse_target(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(AuditError::InvalidRequest("Missing url".to_string()));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|e| AuditError::InvalidRequest(format!("Malformed URL '{trimmed}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(AuditError::InvalidRequest(format!(
            "Unsupported scheme '{other}' (expected http or https)"
        ))),
    }
}

/// Outcome of the quick flow. The web step failing does not fail the run;
/// only the performance step decides.
#[derive(Debug)]
pub struct QuickOutcome {
    pub web: Result<ToolOutput>,
    pub perf: Result<ToolOutput>,
}

impl QuickOutcome {
    pub fn failed(&self) -> bool {
        self.perf.is_err()
    }

    /// Combined captured stdout of both steps
    pub fn output(&self) -> String {
        [&self.web, &self.perf]
            .iter()
            .filter_map(|step| step.as_ref().ok())
            .map(|out| out.stdout.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Web tests in lenient mode, then a mobile Lighthouse audit
pub async fn run_quick(
    url: &str,
    a11y: bool,
    a11y_strict: bool,
    output_dir: &std::path::Path,
    mode: OutputMode,
) -> QuickOutcome {
    info!("Quick run: Web (lenient)");
    let web = web::run_web(
        &web::WebOptions {
            url: url.to_string(),
            a11y,
            a11y_strict,
            lenient: true,
            grep: None,
        },
        mode,
    )
    .await;
    if let Err(ref e) = web {
        error!("Quick run web step failed: {e}");
    }

    info!("Quick run: Performance (mobile preset)");
    let perf = perf::run_perf(
        &perf::PerfOptions {
            url: url.to_string(),
            desktop: false,
            output_dir: output_dir.to_path_buf(),
        },
        mode,
    )
    .await;
    if let Err(ref e) = perf {
        error!("Quick run performance step failed: {e}");
    }

    QuickOutcome { web, perf }
}
