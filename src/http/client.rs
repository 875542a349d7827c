//! Shared HTTP client for checks that talk to the target or a remote API

use crate::error::{AuditError, Result};
use crate::models::AuditConfig;
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// reqwest client configured from [`AuditConfig`], counting every request sent
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    sent: Arc<AtomicU64>,
}

impl HttpClient {
    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        let redirects = if config.follow_redirects {
            Policy::limited(10)
        } else {
            Policy::none()
        };
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .redirect(redirects);

        if let Some(proxy_url) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| AuditError::ConfigError(format!("Invalid proxy URL: {e}")))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            sent: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Sends exactly one GET; the caller decides what a failure means
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let response = self.client.get(url).send().await?;
        debug!("{} for {}", response.status(), response.url());
        Ok(response)
    }

    /// Requests sent so far
    pub fn request_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn rate_limited_answer_is_returned_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::from_config(&AuditConfig::default()).expect("client");
        let response = client.get(&server.uri()).await.expect("response");

        assert_eq!(response.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn transport_error_is_not_retried() {
        let uri = {
            let server = MockServer::start().await;
            server.uri()
        };
        let client = HttpClient::from_config(&AuditConfig::default()).expect("client");

        let err = client.get(&uri).await.expect_err("nothing listens");
        assert!(matches!(err, AuditError::HttpError(_)));
        assert_eq!(client.request_count(), 1);
    }
}
