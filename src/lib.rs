//! Weibo Ingestion
//!
//! Rate-limit aware ingestion of Weibo statuses, comments and users into a
//! document store:
//! - Bounded-step cursor traversal with fresh cursors per step
//! - Three-way fetch outcome (data, empty, hard limit) per upstream call
//! - One-by-one inserts with partial-success accounting
//! - Optional randomized throttling between fetches
//! - Prometheus metrics per endpoint and collection

pub mod config;
pub mod cursor;
pub mod error;
pub mod http_client;
pub mod ingestor;
pub mod insert;
pub mod metrics;
pub mod query;
pub mod result;
pub mod schemas;
pub mod sources;
pub mod store;
pub mod throttle;

pub use error::{IngestionError, Result, StoreError};
pub use ingestor::{CommentPassPolicy, IngestSettings, Ingestor};
pub use result::BatchResult;
pub use sources::{FetchOutcome, Page, WeiboSource};
