//! Weibo record schemas
//!
//! Only the fields the ingestion engine reasons about are typed. Everything
//! else in the upstream payload is captured in a flattened map and written
//! back to the store untouched.

pub mod comment;
pub mod status;
pub mod user;

pub use comment::*;
pub use status::*;
pub use user::*;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::store::{Collection, Document};

/// A payload that can be persisted into one of the store collections.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the record is written to.
    const COLLECTION: Collection;

    /// Upstream identifier, unique within the collection.
    fn id(&self) -> i64;

    /// Serialises the record into a store document.
    fn to_document(&self) -> Result<Document, StoreError> {
        serde_json::to_value(self).map_err(|e| StoreError::Malformed {
            collection: Self::COLLECTION.name(),
            reason: e.to_string(),
        })
    }

    /// Decodes a record from a (possibly projected) store document.
    fn from_document(document: Document) -> Result<Self, StoreError> {
        serde_json::from_value(document).map_err(|e| StoreError::Malformed {
            collection: Self::COLLECTION.name(),
            reason: e.to_string(),
        })
    }
}
