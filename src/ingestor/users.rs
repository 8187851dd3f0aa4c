//! User passes
//!
//! Users are never fetched: they are taken from the `user` embedded in
//! stored comments and statuses, one step's worth at a time.

use async_trait::async_trait;
use std::ops::ControlFlow;
use tracing::{debug, info, instrument};

use super::Ingestor;
use crate::cursor::{traverse_with_step, CollectionScan, StepVisitor};
use crate::error::Result;
use crate::insert::insert_page;
use crate::result::BatchResult;
use crate::schemas::{Record, User};
use crate::sources::Page;
use crate::store::{Collection, Document, SortDirection, Store};

impl Ingestor {
    #[instrument(skip(self))]
    pub async fn ingest_users_from_comments(&self) -> Result<BatchResult> {
        self.ingest_users_from(Collection::Comments).await
    }

    #[instrument(skip(self))]
    pub async fn ingest_users_from_statuses(&self) -> Result<BatchResult> {
        self.ingest_users_from(Collection::Statuses).await
    }

    /// Users from comments, then users from statuses.
    pub async fn ingest_all_users(&self) -> Result<BatchResult> {
        let from_comments = self.ingest_users_from_comments().await?;
        let from_statuses = self.ingest_users_from_statuses().await?;
        Ok(from_comments + from_statuses)
    }

    async fn ingest_users_from(&self, collection: Collection) -> Result<BatchResult> {
        let scan = CollectionScan::new(self.store(), collection)
            .project(&["user"])
            .direction(SortDirection::Reverse);

        let mut harvest = UserHarvest {
            store: self.store(),
            pending: Page::default(),
            result: BatchResult::EMPTY,
        };
        let summary = traverse_with_step(&scan, self.settings.step, &mut harvest).await?;

        info!(
            source = collection.name(),
            result = %harvest.result,
            visited = summary.visited,
            "User pass finished"
        );
        Ok(harvest.result)
    }
}

struct UserHarvest<'a> {
    store: &'a dyn Store,
    pending: Page<User>,
    result: BatchResult,
}

#[async_trait]
impl<'a> StepVisitor for UserHarvest<'a> {
    async fn visit(&mut self, mut record: Document) -> Result<ControlFlow<()>> {
        // a record without a usable user still counts, as a failed insert
        match record.get_mut("user").map(Document::take) {
            Some(user) if !user.is_null() => match User::from_document(user) {
                Ok(user) => self.pending.records.push(user),
                Err(e) => {
                    debug!(error = %e, "Undecodable embedded user");
                    self.pending.malformed.push(e.to_string());
                }
            },
            _ => self.pending.malformed.push("missing user".to_string()),
        }
        Ok(ControlFlow::Continue(()))
    }

    async fn end_step(&mut self) -> Result<()> {
        let users = std::mem::take(&mut self.pending);
        let result = insert_page(self.store, users).await?;
        debug!(%result, "User step flushed");
        self.result = self.result + result;
        Ok(())
    }
}
