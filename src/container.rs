//! Container runtime used by the baseline scan
//!
//! Commands are built programmatically with `tokio::process::Command`; the
//! target URL is passed as a single argument, never through a shell.

use crate::error::CheckError;
use async_trait::async_trait;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit code docker uses when the daemon itself failed to run the container
const DOCKER_RUN_FAILURE: i32 = 125;

/// Prefix of the names given to baseline scan containers
pub const CONTAINER_PREFIX: &str = "utc-zap-";

/// Outcome of a container run that actually executed the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRun {
    pub exit_code: i32,
    /// Native report produced by the scanner, if any
    pub report: Option<Vec<u8>>,
}

/// Runs the containerized baseline scanner
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Scans `target` and asks the scanner to write `report_name`.
    /// Fails with `RuntimeUnavailable` when the runtime cannot start a
    /// container; scanner findings are reported through the exit code.
    async fn run_baseline(&self, target: &str, report_name: &str)
        -> Result<ContainerRun, CheckError>;
}

/// Docker CLI runtime mounting the reports directory into the container
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    image: String,
    work_dir: PathBuf,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>, image: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            image: image.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Arguments of `docker run` for a baseline scan
    pub fn baseline_args(
        &self,
        name: &str,
        mount_dir: &Path,
        target: &str,
        report_name: &str,
    ) -> Vec<String> {
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            name.to_string(),
            "-v".to_string(),
            format!("{}:/zap/wrk:Z", mount_dir.display()),
            self.image.clone(),
            "zap-baseline.py".to_string(),
            "-t".to_string(),
            target.to_string(),
            "-r".to_string(),
            report_name.to_string(),
            "-I".to_string(),
        ]
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn run_baseline(
        &self,
        target: &str,
        report_name: &str,
    ) -> Result<ContainerRun, CheckError> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| CheckError::internal(format!("Cannot create {}: {e}", self.work_dir.display())))?;
        let mount_dir = tokio::fs::canonicalize(&self.work_dir)
            .await
            .unwrap_or_else(|_| self.work_dir.clone());

        let report_path = self.work_dir.join(report_name);
        match tokio::fs::remove_file(&report_path).await {
            Ok(()) => debug!("removed previous report {}", report_path.display()),
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => {
                return Err(CheckError::internal(format!(
                    "Cannot remove previous report {}: {e}",
                    report_path.display()
                )))
            }
        }

        let name = format!("{CONTAINER_PREFIX}{}", uuid::Uuid::new_v4().simple());
        let args = self.baseline_args(&name, &mount_dir, target, report_name);
        debug!(command = %format!("{} {}", self.binary, args.join(" ")), "starting baseline scan");

        let mut guard = ContainerGuard::new(&self.binary, &name);
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                IoErrorKind::NotFound => {
                    CheckError::runtime_unavailable(format!("{} not found: {e}", self.binary))
                }
                IoErrorKind::PermissionDenied => CheckError::runtime_unavailable(format!(
                    "{} is not executable: {e}",
                    self.binary
                )),
                _ => CheckError::runtime_unavailable(format!("failed to spawn {}: {e}", self.binary)),
            });
        guard.disarm();
        let output = output?;

        let Some(exit_code) = output.status.code() else {
            return Err(CheckError::internal("baseline scan terminated by signal"));
        };

        if exit_code == DOCKER_RUN_FAILURE {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(exit_code, "container runtime could not start the scanner");
            return Err(CheckError::runtime_unavailable(format!(
                "{} could not run {}: {}",
                self.binary,
                self.image,
                stderr.trim()
            )));
        }

        let report = tokio::fs::read(&report_path).await.ok();
        if report.is_none() {
            warn!(exit_code, "baseline scan finished without a report");
        }

        Ok(ContainerRun { exit_code, report })
    }
}

/// Force-removes the named container if the run is dropped before the
/// runtime client exits. Killing the client alone leaves the container running.
struct ContainerGuard {
    binary: String,
    name: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(binary: &str, name: &str) -> Self {
        Self {
            binary: binary.to_string(),
            name: name.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(container = %self.name, "baseline scan interrupted, removing container");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let mut command = Command::new(&self.binary);
                command
                    .args(["rm", "-f", self.name.as_str()])
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null());
                let name = self.name.clone();
                handle.spawn(async move {
                    match command.status().await {
                        Ok(status) => debug!(container = %name, %status, "container removed"),
                        Err(e) => debug!(container = %name, "container removal failed: {e}"),
                    }
                });
            }
            Err(_) => {
                if let Err(e) = std::process::Command::new(&self.binary)
                    .args(["rm", "-f", self.name.as_str()])
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                {
                    debug!(container = %self.name, "container removal failed: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;

    #[test]
    fn baseline_args_mount_reports_and_ignore_warnings() {
        let docker = DockerCli::new("docker", "owasp/zap2docker-stable", "reports");
        let args = docker.baseline_args(
            "utc-zap-1",
            Path::new("/tmp/reports"),
            "https://example.com",
            "zap.html",
        );
        assert_eq!(
            args,
            vec![
                "run",
                "--rm",
                "--name",
                "utc-zap-1",
                "-v",
                "/tmp/reports:/zap/wrk:Z",
                "owasp/zap2docker-stable",
                "zap-baseline.py",
                "-t",
                "https://example.com",
                "-r",
                "zap.html",
                "-I",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_runtime_unavailable() {
        let dir = std::env::temp_dir().join(format!("utc-docker-{}", uuid::Uuid::new_v4()));
        let docker = DockerCli::new("utc-no-such-container-runtime", "image", &dir);

        let err = docker
            .run_baseline("https://example.com", "report.html")
            .await
            .expect_err("binary does not exist");

        assert_eq!(err.kind, ErrorKind::RuntimeUnavailable);
        let _ = std::fs::remove_dir_all(&dir);
    }

    /// Writes an executable shell script standing in for the docker CLI
    #[cfg(unix)]
    fn fake_docker(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("docker");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    #[cfg(unix)]
    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("utc-docker-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stale_report_is_not_returned_for_a_failed_run() {
        let dir = scratch_dir();
        let reports = dir.join("reports");
        std::fs::create_dir_all(&reports).expect("reports dir");
        std::fs::write(reports.join("zap.html"), b"<html>previous run</html>").expect("seed");
        let script = fake_docker(&dir, "exit 3");

        let docker = DockerCli::new(script.display().to_string(), "image", &reports);
        let run = docker
            .run_baseline("https://example.com", "zap.html")
            .await
            .expect("scanner ran");

        assert_eq!(run.exit_code, 3);
        assert_eq!(run.report, None);
        assert!(!reports.join("zap.html").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fresh_report_is_returned() {
        let dir = scratch_dir();
        let reports = dir.join("reports");
        std::fs::create_dir_all(&reports).expect("reports dir");
        std::fs::write(reports.join("zap.html"), b"old").expect("seed");
        let script = fake_docker(
            &dir,
            &format!("echo new > '{}/zap.html'\nexit 2", reports.display()),
        );

        let docker = DockerCli::new(script.display().to_string(), "image", &reports);
        let run = docker
            .run_baseline("https://example.com", "zap.html")
            .await
            .expect("scanner ran");

        assert_eq!(run.exit_code, 2);
        assert_eq!(run.report.as_deref(), Some(&b"new\n"[..]));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropped_run_removes_the_container() {
        let dir = scratch_dir();
        let log = dir.join("calls.log");
        let script = fake_docker(
            &dir,
            &format!(
                "echo \"$@\" >> '{}'\nif [ \"$1\" = run ]; then exec sleep 30; fi",
                log.display()
            ),
        );

        let docker = DockerCli::new(script.display().to_string(), "image", dir.join("reports"));
        let interrupted = tokio::time::timeout(
            Duration::from_millis(300),
            docker.run_baseline("https://example.com", "zap.html"),
        )
        .await;
        assert!(interrupted.is_err(), "fake scanner sleeps past the timeout");

        let mut calls = String::new();
        for _ in 0..50 {
            calls = std::fs::read_to_string(&log).unwrap_or_default();
            if calls.contains("rm -f") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let run_line = calls.lines().find(|l| l.starts_with("run ")).expect("run logged");
        let name = run_line
            .split_whitespace()
            .skip_while(|arg| *arg != "--name")
            .nth(1)
            .expect("container named");
        assert!(name.starts_with(CONTAINER_PREFIX));
        assert!(calls.contains(&format!("rm -f {name}")));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
