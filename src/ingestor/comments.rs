//! Comment passes

use async_trait::async_trait;
use serde_json::json;
use std::ops::ControlFlow;
use tracing::{debug, info, instrument, warn};

use super::{require_ids, Ingestor};
use crate::cursor::{traverse_with_step, CollectionScan, StepVisitor};
use crate::error::Result;
use crate::insert::insert_page;
use crate::result::BatchResult;
use crate::schemas::{Record, Status, COMMENT_STATUS_ID_PATH};
use crate::sources::FetchOutcome;
use crate::store::{Collection, Document, Filter, SortDirection};

/// How a full comment pass walks the status collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommentPassPolicy {
    /// Pause after every status whose comments were fetched.
    pub slow: bool,
    /// Fetch even when comments for the status are already stored.
    pub overwrite: bool,
    /// Newest statuses first.
    pub reverse: bool,
}

impl Ingestor {
    /// Fetches and stores the first comment page of each given status.
    ///
    /// A failed fetch only skips that status.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn ingest_comments_for_ids(&self, ids: &[i64]) -> Result<BatchResult> {
        require_ids(ids)?;

        let mut total = BatchResult::EMPTY;
        for &status_id in ids {
            match self.source.fetch_comments(status_id).await {
                FetchOutcome::Data(comments) => {
                    let result = insert_page(self.store(), comments).await?;
                    info!(status_id, %result, "Comments ingested");
                    total = total + result;
                }
                FetchOutcome::Empty => debug!(status_id, "No comments upstream"),
                FetchOutcome::HardLimit => warn!(status_id, "Comment fetch failed, skipping status"),
            }
        }

        info!(%total, "Comment ingestion for ids finished");
        Ok(total)
    }

    /// Walks every stored status and ingests its comments.
    ///
    /// Stops at the first hard limit and returns what was ingested so far.
    #[instrument(skip(self))]
    pub async fn ingest_comments_for_all_statuses(&self, policy: CommentPassPolicy) -> Result<BatchResult> {
        let scan = CollectionScan::new(self.store(), Collection::Statuses)
            .project(&["id", "comments_count"])
            .direction(SortDirection::from_reverse(policy.reverse));

        let mut pass = CommentPass {
            ingestor: self,
            policy,
            result: BatchResult::EMPTY,
            skipped: 0,
        };
        let summary = traverse_with_step(&scan, self.settings.step, &mut pass).await?;

        info!(
            result = %pass.result,
            visited = summary.visited,
            skipped = pass.skipped,
            halted = summary.stopped_early,
            "Comment pass finished"
        );
        Ok(pass.result)
    }
}

struct CommentPass<'a> {
    ingestor: &'a Ingestor,
    policy: CommentPassPolicy,
    result: BatchResult,
    skipped: u64,
}

impl CommentPass<'_> {
    async fn has_stored_comments(&self, status_id: i64) -> Result<bool> {
        let filter = Filter::eq(COMMENT_STATUS_ID_PATH, status_id);
        Ok(self
            .ingestor
            .store()
            .find_one(Collection::Comments, &filter)
            .await?
            .is_some())
    }
}

#[async_trait]
impl<'a> StepVisitor for CommentPass<'a> {
    async fn visit(&mut self, record: Document) -> Result<ControlFlow<()>> {
        let status = match Status::from_document(record) {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable status");
                self.skipped += 1;
                return Ok(ControlFlow::Continue(()));
            }
        };
        let status_id = status.id();

        if status.has_no_comments() {
            self.skipped += 1;
            return Ok(ControlFlow::Continue(()));
        }
        if !self.policy.overwrite && self.has_stored_comments(status_id).await? {
            debug!(status_id, "Comments already stored");
            self.skipped += 1;
            return Ok(ControlFlow::Continue(()));
        }

        match self.ingestor.source.fetch_comments(status_id).await {
            FetchOutcome::HardLimit => {
                warn!(status_id, "Upstream refused comment fetch, halting pass");
                Ok(ControlFlow::Break(()))
            }
            FetchOutcome::Empty => {
                // counted comments are gone upstream
                self.ingestor
                    .store()
                    .update(Collection::Statuses, &Filter::eq("id", status_id), json!({ "comments_count": 0 }))
                    .await?;
                debug!(status_id, "No comments upstream, count reset");
                Ok(ControlFlow::Continue(()))
            }
            FetchOutcome::Data(comments) => {
                let result = insert_page(self.ingestor.store(), comments).await?;
                info!(status_id, %result, "Comments ingested");
                self.result = self.result + result;

                if self.policy.slow {
                    let delay = self.ingestor.settings.throttle.next_delay();
                    debug!(status_id, delay = %humantime::format_duration(delay), "Throttling");
                    self.ingestor.pause.pause(delay).await;
                }
                Ok(ControlFlow::Continue(()))
            }
        }
    }
}
