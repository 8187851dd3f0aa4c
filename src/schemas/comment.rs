//! Weibo comment

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Record, Status, User};
use crate::store::Collection;

/// Dotted path of the owning status identifier inside a stored comment.
pub const COMMENT_STATUS_ID_PATH: &str = "status.id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// The status the comment belongs to, embedded by upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Box<Status>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Comment {
    pub fn new(id: i64, status_id: i64) -> Self {
        Self {
            id,
            text: None,
            user: None,
            status: Some(Box::new(Status::new(status_id))),
            extra: Map::new(),
        }
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn status_id(&self) -> Option<i64> {
        self.status.as_ref().map(|s| s.id)
    }
}

impl Record for Comment {
    const COLLECTION: Collection = Collection::Comments;

    fn id(&self) -> i64 {
        self.id
    }
}
