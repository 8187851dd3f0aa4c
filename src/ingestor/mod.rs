//! Ingestion orchestrators
//!
//! Each pass combines the traversal driver, the fetch gateway and the
//! one-by-one inserter into one caller-facing operation returning a
//! [`BatchResult`](crate::result::BatchResult). Collaborators are injected so
//! the whole engine runs against an in-memory store and a scripted source in
//! tests.

pub mod comments;
pub mod statuses;
pub mod users;

pub use comments::CommentPassPolicy;

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{IngestionError, Result};
use crate::sources::WeiboSource;
use crate::store::Store;
use crate::throttle::{Pause, ThrottlePolicy, TokioPause};

/// Tunables shared by every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    /// Records read per cursor before it is re-opened.
    pub step: NonZeroUsize,
    /// Delay applied after each productive fetch of a slow pass.
    pub throttle: ThrottlePolicy,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            step: NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
            throttle: ThrottlePolicy::default(),
        }
    }
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            step: config.step(),
            throttle: config.throttle(),
        }
    }
}

/// Runs ingestion passes against one store and one upstream source.
pub struct Ingestor {
    store: Arc<dyn Store>,
    source: Arc<dyn WeiboSource>,
    pause: Arc<dyn Pause>,
    settings: IngestSettings,
}

impl Ingestor {
    /// Creates an ingestor that sleeps on the tokio timer when throttling.
    pub fn new(store: Arc<dyn Store>, source: Arc<dyn WeiboSource>, settings: IngestSettings) -> Self {
        Self {
            store,
            source,
            pause: Arc::new(TokioPause),
            settings,
        }
    }

    /// Replaces the suspension used between items of a slow pass.
    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn source(&self) -> &dyn WeiboSource {
        self.source.as_ref()
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }
}

/// Rejects an empty identifier list before any I/O happens.
fn require_ids(ids: &[i64]) -> Result<()> {
    if ids.is_empty() {
        return Err(IngestionError::InvalidRequest("param ids is required".to_string()));
    }
    Ok(())
}
