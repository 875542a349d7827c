//! Local web UI
//!
//! Serves a single page, the reports directory, and JSON endpoints that
//! trigger runs. Security runs go through the audit engine in-process; the
//! other runners capture the tool's output and return it to the page.

pub mod handlers;

use crate::error::{AuditError, Result};
use crate::scanner::{AuditEngine, RunContext};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Where Playwright's html reporter writes, relative to the working directory
pub const PLAYWRIGHT_REPORT_DIR: &str = "playwright-report";

/// Shared by every connection
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AuditEngine>,
    /// Template context; each security run gets a clone with its own cancel token
    pub ctx: RunContext,
    pub reports_dir: PathBuf,
    /// HTML report written by the web test runner
    pub playwright_report_dir: PathBuf,
}

impl AppState {
    pub fn new(engine: AuditEngine, ctx: RunContext) -> Self {
        let reports_dir = ctx.config.output_dir.clone();
        Self {
            engine: Arc::new(engine),
            ctx,
            reports_dir,
            playwright_report_dir: PathBuf::from(PLAYWRIGHT_REPORT_DIR),
        }
    }
}

/// Port precedence: explicit flag, then `PORT`, then configuration
pub fn resolve_port(flag: Option<u16>, env: Option<&str>, configured: u16) -> u16 {
    flag.or_else(|| env.and_then(|v| v.trim().parse().ok()))
        .unwrap_or(configured)
}

/// UI server bound to localhost
pub struct UiServer {
    port: u16,
    state: AppState,
}

impl UiServer {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    /// Binds and serves until Ctrl+C
    pub async fn start(self) -> Result<()> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AuditError::ServerError(format!("Failed to bind to {addr}: {e}")))?;
        info!("UTC Web UI running at http://localhost:{}", self.port);

        let shutdown = CancellationToken::new();
        let on_signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down UI server...");
                on_signal.cancel();
            }
        });

        serve(listener, self.state, shutdown).await
    }
}

/// Accept loop; returns once `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        let (stream, remote_addr) = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted
                .map_err(|e| AuditError::ServerError(format!("Accept failed: {e}")))?,
        };

        let io = TokioIo::new(stream);
        let state = state.clone();
        debug!("New connection from {remote_addr}");

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move { handlers::route(req, state).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Connection error from {remote_addr}: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_env_beats_config() {
        assert_eq!(resolve_port(Some(4000), Some("5000"), 3000), 4000);
        assert_eq!(resolve_port(None, Some("5000"), 3000), 5000);
        assert_eq!(resolve_port(None, Some("not-a-port"), 3000), 3000);
        assert_eq!(resolve_port(None, None, 3000), 3000);
    }
}
