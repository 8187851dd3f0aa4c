//! Scripted source for testing
//!
//! Outcomes are registered per selector up front; anything unscripted answers
//! `Empty`. Every call is recorded so tests can check what was (not) fetched.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{FetchOutcome, Timeline, WeiboSource};
use crate::schemas::{Comment, Status};

#[derive(Default)]
pub struct MockWeiboSource {
    comments: HashMap<i64, FetchOutcome<Comment>>,
    timelines: HashMap<Timeline, FetchOutcome<Status>>,
    statuses: HashMap<i64, FetchOutcome<Status>>,
    comment_calls: Mutex<Vec<i64>>,
    timeline_calls: Mutex<Vec<Timeline>>,
    status_calls: Mutex<Vec<i64>>,
}

impl MockWeiboSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comments(mut self, status_id: i64, outcome: FetchOutcome<Comment>) -> Self {
        self.comments.insert(status_id, outcome);
        self
    }

    pub fn with_timeline(mut self, timeline: Timeline, outcome: FetchOutcome<Status>) -> Self {
        self.timelines.insert(timeline, outcome);
        self
    }

    pub fn with_status(mut self, id: i64, outcome: FetchOutcome<Status>) -> Self {
        self.statuses.insert(id, outcome);
        self
    }

    /// Status ids whose comments were requested, in call order.
    pub fn comment_calls(&self) -> Vec<i64> {
        self.comment_calls.lock().clone()
    }

    pub fn timeline_calls(&self) -> Vec<Timeline> {
        self.timeline_calls.lock().clone()
    }

    pub fn status_calls(&self) -> Vec<i64> {
        self.status_calls.lock().clone()
    }
}

#[async_trait]
impl WeiboSource for MockWeiboSource {
    async fn fetch_comments(&self, status_id: i64) -> FetchOutcome<Comment> {
        self.comment_calls.lock().push(status_id);
        self.comments.get(&status_id).cloned().unwrap_or(FetchOutcome::Empty)
    }

    async fn fetch_timeline(&self, timeline: Timeline) -> FetchOutcome<Status> {
        self.timeline_calls.lock().push(timeline);
        self.timelines.get(&timeline).cloned().unwrap_or(FetchOutcome::Empty)
    }

    async fn fetch_status(&self, id: i64) -> FetchOutcome<Status> {
        self.status_calls.lock().push(id);
        self.statuses.get(&id).cloned().unwrap_or(FetchOutcome::Empty)
    }
}
