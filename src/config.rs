//! Configuration for the Ingestion Service

use anyhow::{bail, Result};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::http_client::HttpClientConfig;
use crate::throttle::ThrottlePolicy;

/// Largest page the Weibo comment and timeline endpoints serve.
pub const MAX_PAGE_COUNT: u32 = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Upstream API
    #[serde(default = "default_api_base_url")]
    pub weibo_api_base_url: String,
    pub weibo_comments_token: Option<String>,
    pub weibo_statuses_token: Option<String>,
    #[serde(default = "default_page_count")]
    pub page_count: u32,

    // Database
    pub database_url: Option<String>,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    // Traversal
    #[serde(default = "default_step_size")]
    pub step_size: usize,

    // Throttling ("slow" passes)
    #[serde(default = "default_throttle_base")]
    pub throttle_base_ms: u64,
    #[serde(default = "default_throttle_jitter")]
    pub throttle_jitter_ms: u64,

    // Rate limiting (requests per minute)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rpm: u32,

    // Concurrency
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.weibo.com/2".to_string()
}

fn default_page_count() -> u32 {
    MAX_PAGE_COUNT
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_step_size() -> usize {
    100
}

fn default_throttle_base() -> u64 {
    5000 // 5 seconds
}

fn default_throttle_jitter() -> u64 {
    10000 // up to 10 more seconds
}

fn default_rate_limit() -> u32 {
    150
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weibo_api_base_url: default_api_base_url(),
            weibo_comments_token: None,
            weibo_statuses_token: None,
            page_count: default_page_count(),
            database_url: None,
            db_max_connections: default_db_max_connections(),
            step_size: default_step_size(),
            throttle_base_ms: default_throttle_base(),
            throttle_jitter_ms: default_throttle_jitter(),
            rate_limit_rpm: default_rate_limit(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        // Build config from environment
        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__").try_parsing(true))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.step_size == 0 {
            bail!("STEP_SIZE must be greater than zero");
        }
        if self.page_count == 0 || self.page_count > MAX_PAGE_COUNT {
            bail!("PAGE_COUNT must be between 1 and {MAX_PAGE_COUNT}");
        }
        if self.max_concurrent_requests == 0 {
            bail!("MAX_CONCURRENT_REQUESTS must be greater than zero");
        }
        if self.rate_limit_rpm == 0 {
            bail!("RATE_LIMIT_RPM must be greater than zero");
        }
        Ok(())
    }

    pub fn step(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.step_size).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn throttle(&self) -> ThrottlePolicy {
        ThrottlePolicy::new(
            Duration::from_millis(self.throttle_base_ms),
            Duration::from_millis(self.throttle_jitter_ms),
        )
    }

    pub fn http_client(&self) -> HttpClientConfig {
        HttpClientConfig {
            max_concurrent_requests: self.max_concurrent_requests,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            rate_limit_rpm: self.rate_limit_rpm,
            ..Default::default()
        }
    }

    /// Token used for comment endpoints.
    pub fn comments_token(&self) -> Option<&str> {
        self.weibo_comments_token
            .as_deref()
            .or(self.weibo_statuses_token.as_deref())
    }

    /// Token used for status endpoints, falling back to the comments token.
    pub fn statuses_token(&self) -> Option<&str> {
        self.weibo_statuses_token
            .as_deref()
            .or(self.weibo_comments_token.as_deref())
    }

    pub fn has_database(&self) -> bool {
        self.database_url.is_some()
    }
}
