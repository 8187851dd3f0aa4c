//! Weibo open API v2 source
//!
//! http://open.weibo.com/wiki/API文档_V2
//!
//! The gateway does not try to tell rate limiting apart from other failures:
//! whatever goes wrong, the only sensible reaction of a pass is to stop, so
//! every failure is reported as [`FetchOutcome::HardLimit`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{FetchOutcome, Page, Timeline, WeiboSource};
use crate::error::{IngestionError, Result};
use crate::http_client::ApiHttpClient;
use crate::metrics::{self, FetchTimer, ENDPOINT_COMMENTS, ENDPOINT_STATUS, ENDPOINT_TIMELINE};
use crate::schemas::{Comment, Status};

const COMMENTS_SHOW_PATH: &str = "comments/show.json";
const STATUSES_SHOW_PATH: &str = "statuses/show.json";

#[derive(Debug, Deserialize)]
struct CommentsResponse {
    comments: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    statuses: Vec<Value>,
}

/// Weibo API data source
pub struct WeiboApiSource {
    client: Arc<ApiHttpClient>,
    comments_token: String,
    statuses_token: String,
    page_count: u32,
}

impl WeiboApiSource {
    pub fn new(
        client: Arc<ApiHttpClient>,
        comments_token: impl Into<String>,
        statuses_token: impl Into<String>,
        page_count: u32,
    ) -> Self {
        Self {
            client,
            comments_token: comments_token.into(),
            statuses_token: statuses_token.into(),
            page_count,
        }
    }

    /// GETs an endpoint, turning a Weibo error payload into an error.
    async fn request(&self, path: &str, mut query: Vec<(&str, String)>, token: &str) -> Result<Value> {
        query.push(("access_token", token.to_string()));
        let value = self.client.get_json(path, &query).await?;

        if let Some(code) = value.get("error_code") {
            return Err(IngestionError::ApiError {
                code: code.to_string(),
                message: value
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        Ok(value)
    }

    fn first_page(&self) -> Vec<(&'static str, String)> {
        vec![("page", "1".to_string()), ("count", self.page_count.to_string())]
    }

    async fn load_comments(&self, status_id: i64) -> Result<Page<Comment>> {
        let mut query = self.first_page();
        query.push(("id", status_id.to_string()));

        let value = self.request(COMMENTS_SHOW_PATH, query, &self.comments_token).await?;
        let response: CommentsResponse = serde_json::from_value(value)?;
        Ok(decode_page(response.comments))
    }

    async fn load_timeline(&self, timeline: Timeline) -> Result<Page<Status>> {
        let value = self
            .request(timeline.path(), self.first_page(), &self.statuses_token)
            .await?;
        let response: TimelineResponse = serde_json::from_value(value)?;
        Ok(decode_page(response.statuses))
    }

    async fn load_status(&self, id: i64) -> Result<Page<Status>> {
        let query = vec![("id", id.to_string())];
        let value = self.request(STATUSES_SHOW_PATH, query, &self.statuses_token).await?;
        Ok(decode_page(vec![value]))
    }
}

/// Decodes each item on its own; an undecodable item is kept as a decode error.
fn decode_page<T: DeserializeOwned>(items: Vec<Value>) -> Page<T> {
    let mut page = Page::default();
    for item in items {
        match serde_json::from_value(item) {
            Ok(record) => page.records.push(record),
            Err(e) => {
                warn!(error = %e, "Undecodable upstream record");
                page.malformed.push(e.to_string());
            }
        }
    }
    page
}

/// Maps a request result onto the three-way outcome and records it.
fn settle<T>(endpoint: &'static str, selector: &str, result: Result<Page<T>>) -> FetchOutcome<T> {
    let outcome = match result {
        Ok(page) => {
            debug!(
                endpoint,
                selector,
                count = page.records.len(),
                malformed = page.malformed.len(),
                "Fetched records"
            );
            FetchOutcome::from_page(page)
        }
        Err(e) => {
            warn!(endpoint, selector, error = %e, "Fetch failed, maybe rate limited");
            FetchOutcome::HardLimit
        }
    };
    metrics::record_fetch_outcome(endpoint, outcome.label());
    outcome
}

#[async_trait]
impl WeiboSource for WeiboApiSource {
    async fn fetch_comments(&self, status_id: i64) -> FetchOutcome<Comment> {
        let _timer = FetchTimer::new(ENDPOINT_COMMENTS);
        let result = self.load_comments(status_id).await;
        settle(ENDPOINT_COMMENTS, &status_id.to_string(), result)
    }

    async fn fetch_timeline(&self, timeline: Timeline) -> FetchOutcome<Status> {
        let _timer = FetchTimer::new(ENDPOINT_TIMELINE);
        let result = self.load_timeline(timeline).await;
        settle(ENDPOINT_TIMELINE, timeline.name(), result)
    }

    async fn fetch_status(&self, id: i64) -> FetchOutcome<Status> {
        let _timer = FetchTimer::new(ENDPOINT_STATUS);
        let result = self.load_status(id).await;
        settle(ENDPOINT_STATUS, &id.to_string(), result)
    }
}
