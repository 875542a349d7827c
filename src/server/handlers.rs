//! Request routing for the UI server

use super::AppState;
use crate::error::AuditError;
use crate::models::{AuditRequest, EnabledChecks};
use crate::runners::perf::{run_perf, PerfOptions};
use crate::runners::web::{run_web, WebOptions};
use crate::runners::{run_quick, OutputMode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::{Component, Path};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Largest JSON body accepted by the run endpoints
const MAX_BODY_BYTES: usize = 64 * 1024;

type HttpResponse = Response<Full<Bytes>>;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SecurityBody {
    #[serde(default)]
    url: String,
    #[serde(default = "default_true")]
    headers: bool,
    #[serde(default = "default_true")]
    tls: bool,
    #[serde(default = "default_true")]
    har: bool,
    #[serde(default)]
    zap: bool,
}

#[derive(Debug, Deserialize)]
struct WebBody {
    #[serde(default)]
    url: String,
    #[serde(default = "default_true")]
    lenient: bool,
    #[serde(default = "default_true")]
    a11y: bool,
    #[serde(default, rename = "a11yStrict", alias = "a11y_strict")]
    a11y_strict: bool,
    #[serde(default)]
    grep: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PerfBody {
    #[serde(default)]
    url: String,
    #[serde(default)]
    desktop: bool,
}

#[derive(Debug, Deserialize)]
struct QuickBody {
    #[serde(default)]
    url: String,
}

pub async fn route(
    req: Request<Incoming>,
    state: AppState,
) -> std::result::Result<HttpResponse, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("{method} {path}");

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/") | (&Method::GET, "/index.html") => {
            respond(StatusCode::OK, "text/html; charset=utf-8", INDEX_HTML)
        }
        (&Method::GET, p) if p.starts_with("/reports/") => {
            serve_report(&state, &p["/reports/".len()..]).await
        }
        (&Method::GET, "/playwright-report") => {
            serve_playwright_report(&state, "index.html").await
        }
        (&Method::GET, p) if p.starts_with("/playwright-report/") => {
            let rel = &p["/playwright-report/".len()..];
            let rel = if rel.is_empty() { "index.html" } else { rel };
            serve_playwright_report(&state, rel).await
        }
        (&Method::POST, "/api/run/security") => match read_json(req).await {
            Ok(body) => run_security(&state, body).await,
            Err(resp) => resp,
        },
        (&Method::POST, "/api/run/web") => match read_json(req).await {
            Ok(body) => run_web_tests(body).await,
            Err(resp) => resp,
        },
        (&Method::POST, "/api/run/perf") => match read_json(req).await {
            Ok(body) => run_performance(&state, body).await,
            Err(resp) => resp,
        },
        (&Method::POST, "/api/run/quick") => match read_json(req).await {
            Ok(body) => run_quick_flow(&state, body).await,
            Err(resp) => resp,
        },
        _ => respond(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
    };

    Ok(response)
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> HttpResponse {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

fn json_response(status: StatusCode, value: serde_json::Value) -> HttpResponse {
    respond(status, "application/json", value.to_string())
}

fn missing_url() -> HttpResponse {
    json_response(
        StatusCode::BAD_REQUEST,
        json!({ "ok": false, "error": "Missing url" }),
    )
}

fn failure(err: &AuditError, output: &str) -> HttpResponse {
    let status = match err {
        AuditError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_response(
        status,
        json!({ "ok": false, "error": err.to_string(), "output": output }),
    )
}

/// Reads a bounded JSON body; an empty body deserializes from `{}`
async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, HttpResponse> {
    let bytes = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            json_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({ "ok": false, "error": format!("Unreadable body: {e}") }),
            )
        })?
        .to_bytes();

    let raw: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &bytes
    };
    serde_json::from_slice(raw).map_err(|e| {
        json_response(
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "error": format!("Invalid JSON body: {e}") }),
        )
    })
}

async fn run_security(state: &AppState, body: SecurityBody) -> HttpResponse {
    if body.url.trim().is_empty() {
        return missing_url();
    }
    let checks = EnabledChecks::new(body.headers, body.tls, body.har, body.zap);
    let request = match AuditRequest::new(&body.url, checks) {
        Ok(request) => request,
        Err(e) => return failure(&e, ""),
    };

    info!("UI requested security run for {}", request.target_str());
    let ctx = state.ctx.clone().with_cancel(CancellationToken::new());
    match state.engine.run(&request, &ctx).await {
        Ok(summary) => json_response(StatusCode::OK, json!({ "ok": true, "output": summary })),
        Err(e) => {
            error!("Security run failed: {e}");
            failure(&e, "")
        }
    }
}

async fn run_web_tests(body: WebBody) -> HttpResponse {
    if body.url.trim().is_empty() {
        return missing_url();
    }
    let opts = WebOptions {
        url: body.url,
        a11y: body.a11y,
        a11y_strict: body.a11y_strict,
        lenient: body.lenient,
        grep: body.grep,
    };
    match run_web(&opts, OutputMode::Capture).await {
        Ok(out) => json_response(StatusCode::OK, json!({ "ok": true, "output": out.stdout })),
        Err(e) => failure(&e, ""),
    }
}

async fn run_performance(state: &AppState, body: PerfBody) -> HttpResponse {
    if body.url.trim().is_empty() {
        return missing_url();
    }
    let opts = PerfOptions {
        url: body.url,
        desktop: body.desktop,
        output_dir: state.reports_dir.clone(),
    };
    match run_perf(&opts, OutputMode::Capture).await {
        Ok(out) => json_response(StatusCode::OK, json!({ "ok": true, "output": out.stdout })),
        Err(e) => failure(&e, ""),
    }
}

async fn run_quick_flow(state: &AppState, body: QuickBody) -> HttpResponse {
    if body.url.trim().is_empty() {
        return missing_url();
    }
    let outcome = run_quick(&body.url, true, false, &state.reports_dir, OutputMode::Capture).await;
    let output = outcome.output();
    match outcome.perf {
        Ok(_) => json_response(StatusCode::OK, json!({ "ok": true, "output": output })),
        Err(ref e) => failure(e, &output),
    }
}

/// A report name must be one plain file name inside the reports directory
fn safe_report_name(name: &str) -> Option<&str> {
    if name.is_empty() || name.contains('\\') || name.starts_with('.') {
        return None;
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(name),
        _ => None,
    }
}

/// A relative path made only of plain, non-hidden components
fn safe_relative_path(rel: &str) -> Option<&str> {
    if rel.is_empty() || rel.contains('\\') {
        return None;
    }
    let plain = Path::new(rel).components().all(|c| match c {
        Component::Normal(part) => !part.to_string_lossy().starts_with('.'),
        _ => false,
    });
    plain.then_some(rel)
}

pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("json") | Some("har") => "application/json",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("txt") | Some("log") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webm") => "video/webm",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

async fn serve_file(dir: &Path, rel: &str) -> HttpResponse {
    match tokio::fs::read(dir.join(rel)).await {
        Ok(bytes) => respond(StatusCode::OK, content_type_for(rel), bytes),
        Err(_) => respond(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
    }
}

async fn serve_report(state: &AppState, name: &str) -> HttpResponse {
    match safe_report_name(name) {
        Some(name) => serve_file(&state.reports_dir, name).await,
        None => respond(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
    }
}

/// Playwright's report is a small static site with nested assets
async fn serve_playwright_report(state: &AppState, rel: &str) -> HttpResponse {
    match safe_relative_path(rel) {
        Some(rel) => serve_file(&state.playwright_report_dir, rel).await,
        None => respond(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_names_cannot_escape_directory() {
        assert_eq!(safe_report_name("traffic.har"), Some("traffic.har"));
        assert_eq!(safe_report_name("../secret"), None);
        assert_eq!(safe_report_name("a/b.json"), None);
        assert_eq!(safe_report_name("/etc/passwd"), None);
        assert_eq!(safe_report_name(".."), None);
        assert_eq!(safe_report_name("..\\x"), None);
        assert_eq!(safe_report_name(""), None);
    }

    #[test]
    fn playwright_paths_stay_inside_report() {
        assert_eq!(safe_relative_path("index.html"), Some("index.html"));
        assert_eq!(safe_relative_path("data/abc.zip"), Some("data/abc.zip"));
        assert_eq!(safe_relative_path("trace/index.html"), Some("trace/index.html"));
        assert_eq!(safe_relative_path("../reports/x.json"), None);
        assert_eq!(safe_relative_path("data/../../etc/passwd"), None);
        assert_eq!(safe_relative_path("/etc/passwd"), None);
        assert_eq!(safe_relative_path("data/.hidden"), None);
        assert_eq!(safe_relative_path("data\\x"), None);
        assert_eq!(safe_relative_path(""), None);
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("traffic.har"), "application/json");
        assert_eq!(content_type_for("zap-baseline-report.html"), "text/html; charset=utf-8");
        assert_eq!(content_type_for("blob.bin"), "application/octet-stream");
    }

    #[test]
    fn security_body_defaults() {
        let body: SecurityBody = serde_json::from_str(r#"{"url":"https://example.com"}"#)
            .expect("parse");
        assert!(body.headers && body.tls && body.har);
        assert!(!body.zap);
    }
}
