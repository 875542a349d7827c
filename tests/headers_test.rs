//! Integration tests for the headers check

mod common;

use common::{memory_sink, test_config, test_context};
use utc::error::ErrorKind;
use utc::models::{AuditRequest, CheckKind, CheckPayload, EnabledChecks, FindingType, Severity};
use utc::scanner::headers::HeadersScanner;
use utc::scanner::Scanner;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn headers_only(url: &str) -> AuditRequest {
    AuditRequest::new(url, EnabledChecks::none().with(CheckKind::Headers)).expect("valid url")
}

#[tokio::test]
async fn test_missing_csp_over_plain_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Content-Type-Options", "nosniff")
                .insert_header("X-Frame-Options", "DENY")
                .insert_header("Referrer-Policy", "no-referrer")
                .insert_header("Permissions-Policy", "camera=()"),
        )
        .mount(&mock_server)
        .await;

    let ctx = test_context(test_config(), memory_sink());
    let output = HeadersScanner
        .scan(&headers_only(&mock_server.uri()), &ctx)
        .await
        .expect("Scan failed");

    let CheckPayload::Headers(audit) = output.payload else {
        panic!("Expected headers payload");
    };
    // HSTS is not expected on a plain-http target
    assert_eq!(audit.findings.len(), 1);
    assert_eq!(audit.findings[0].key, "content-security-policy");
    assert_eq!(audit.findings[0].finding_type, FindingType::Missing);
    assert_eq!(audit.findings[0].severity, Severity::Medium);
    assert_eq!(audit.headers["x-frame-options"], "DENY");
    assert!(output.artifact.is_some());
}

#[tokio::test]
async fn test_wrong_nosniff_value() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Security-Policy", "default-src 'self'")
                .insert_header("X-Content-Type-Options", "SNIFF")
                .insert_header("X-Frame-Options", "DENY")
                .insert_header("Referrer-Policy", "no-referrer")
                .insert_header("Permissions-Policy", "camera=()"),
        )
        .mount(&mock_server)
        .await;

    let ctx = test_context(test_config(), memory_sink());
    let output = HeadersScanner
        .scan(&headers_only(&mock_server.uri()), &ctx)
        .await
        .expect("Scan failed");

    let CheckPayload::Headers(audit) = output.payload else {
        panic!("Expected headers payload");
    };
    assert_eq!(audit.findings.len(), 1);
    assert_eq!(audit.findings[0].finding_type, FindingType::Value);
    assert_eq!(audit.findings[0].severity, Severity::Low);
    assert_eq!(audit.findings[0].desc, "Expected 'nosniff', got 'SNIFF'");
}

#[tokio::test]
async fn test_repeated_audits_are_identical() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Frame-Options", "DENY"))
        .mount(&mock_server)
        .await;

    let ctx = test_context(test_config(), memory_sink());
    let request = headers_only(&mock_server.uri());

    let first = HeadersScanner.scan(&request, &ctx).await.expect("first");
    let second = HeadersScanner.scan(&request, &ctx).await.expect("second");

    let (CheckPayload::Headers(a), CheckPayload::Headers(b)) = (first.payload, second.payload)
    else {
        panic!("Expected headers payloads");
    };
    assert_eq!(a.findings, b.findings);
}

#[tokio::test]
async fn test_unreachable_target_is_network_error() {
    // Bind then drop a server so the port is closed
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let ctx = test_context(test_config(), memory_sink());
    let err = HeadersScanner
        .scan(&headers_only(&uri), &ctx)
        .await
        .expect_err("target is down");

    assert_eq!(err.kind, ErrorKind::NetworkError);
}

#[tokio::test]
async fn test_rate_limited_target_gets_a_single_get() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("X-Frame-Options", "DENY"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let ctx = test_context(test_config(), memory_sink());
    let output = HeadersScanner
        .scan(&headers_only(&mock_server.uri()), &ctx)
        .await
        .expect("headers of a 429 are still audited");

    let CheckPayload::Headers(audit) = output.payload else {
        panic!("Expected headers payload");
    };
    assert_eq!(audit.headers["x-frame-options"], "DENY");
    assert_eq!(ctx.client.request_count(), 1);
}
