//! Weibo status (a post)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Record, User};
use crate::store::Collection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: i64,
    /// Number of comments upstream claims the status has. Missing means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Status {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            comments_count: None,
            user: None,
            extra: Map::new(),
        }
    }

    pub fn with_comments_count(mut self, count: i64) -> Self {
        self.comments_count = Some(count);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// True only when upstream explicitly reported zero comments.
    pub fn has_no_comments(&self) -> bool {
        self.comments_count == Some(0)
    }
}

impl Record for Status {
    const COLLECTION: Collection = Collection::Statuses;

    fn id(&self) -> i64 {
        self.id
    }
}
