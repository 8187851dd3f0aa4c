//! Weibo user

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Record;
use crate::store::Collection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            screen_name: None,
            extra: Map::new(),
        }
    }
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> i64 {
        self.id
    }
}
