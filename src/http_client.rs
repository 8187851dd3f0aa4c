//! HTTP Client Module
//!
//! Thin client for the upstream JSON API:
//! - Semaphore-based concurrency limiting
//! - Request-rate quota (governor) shared by every call
//! - No retries: a failed call is reported once and the caller decides
//!   whether the pass continues

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

use crate::error::{IngestionError, Result};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum concurrent requests in flight
    pub max_concurrent_requests: usize,
    /// Request timeout
    pub request_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Requests per minute allowed towards the upstream
    pub rate_limit_rpm: u32,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            rate_limit_rpm: 150,
            user_agent: format!("Weibo-Ingestion/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// JSON-over-HTTP client rooted at the API base URL
pub struct ApiHttpClient {
    client: Client,
    base_url: Url,
    semaphore: Arc<Semaphore>,
    rate_limiter: DefaultDirectRateLimiter,
}

impl ApiHttpClient {
    pub fn new(base_url: &str, config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;

        // Url::join drops the last segment unless the base ends with '/'
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };

        let quota = Quota::per_minute(NonZeroU32::new(config.rate_limit_rpm).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    /// Resolves an endpoint path such as `comments/show.json`.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Issues one GET and decodes the JSON body.
    ///
    /// Non-2xx responses become [`IngestionError::ApiError`] carrying the
    /// status code and body.
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| IngestionError::ConnectionLost("Semaphore closed".to_string()))?;

        self.rate_limiter.until_ready().await;

        let url = self.endpoint(path)?;
        debug!(url = %url, "Executing HTTP request");

        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestionError::ApiError {
                code: status.as_str().to_string(),
                message: body,
            });
        }

        Ok(response.json().await?)
    }

    /// Gets the number of available permits
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
