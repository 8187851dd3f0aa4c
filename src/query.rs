//! Stored comment listing
//!
//! Serves the stored comments of one status in the shape of the Weibo
//! `comments/show` payload.

use serde::Serialize;

use crate::error::{IngestionError, Result};
use crate::schemas::COMMENT_STATUS_ID_PATH;
use crate::store::{Collection, CursorQuery, Document, Filter, Store, Window};

pub const DEFAULT_COUNT: u64 = 20;
pub const DEFAULT_PAGE: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowCommentsParams {
    pub id: i64,
    pub count: u64,
    pub page: u64,
}

impl ShowCommentsParams {
    /// Validates raw request parameters; zero counts as missing.
    pub fn parse(id: Option<i64>, count: Option<u64>, page: Option<u64>) -> Result<Self> {
        let id = id
            .filter(|&id| id != 0)
            .ok_or_else(|| IngestionError::InvalidRequest("param id is required".to_string()))?;

        Ok(Self {
            id,
            count: count.filter(|&c| c != 0).unwrap_or(DEFAULT_COUNT),
            page: page.filter(|&p| p != 0).unwrap_or(DEFAULT_PAGE),
        })
    }

    pub fn window(&self) -> Window {
        Window::new((self.page - 1).saturating_mul(self.count), self.count)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentsPage {
    pub comments: Vec<Document>,
    /// The stored status, `null` when it was never ingested.
    pub status: Option<Document>,
    pub total_number: usize,
    pub marks: Vec<Document>,
    pub hasvisible: bool,
    pub previous_cursor: i64,
    pub next_cursor: i64,
}

/// One page of stored comments for `params.id`, in natural order.
pub async fn show_comments(store: &dyn Store, params: ShowCommentsParams) -> Result<CommentsPage> {
    let status = store
        .find_one(Collection::Statuses, &Filter::eq("id", params.id))
        .await?;

    let query = CursorQuery::new(Collection::Comments)
        .filter(Filter::eq(COMMENT_STATUS_ID_PATH, params.id))
        .window(params.window());
    let mut cursor = store.open_cursor(&query).await?;

    let mut comments = Vec::new();
    while let Some(comment) = cursor.next().await? {
        comments.push(comment);
    }

    Ok(CommentsPage {
        total_number: comments.len(),
        comments,
        status,
        marks: Vec::new(),
        hasvisible: false,
        previous_cursor: 0,
        next_cursor: 0,
    })
}
