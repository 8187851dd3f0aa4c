//! Status passes

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use super::{require_ids, Ingestor};
use crate::error::Result;
use crate::insert::insert_page;
use crate::result::BatchResult;
use crate::schemas::Status;
use crate::sources::{FetchOutcome, Page, Timeline};

impl Ingestor {
    /// Stores the first page of the home and public timelines.
    #[instrument(skip(self))]
    pub async fn ingest_new_statuses(&self) -> Result<BatchResult> {
        let (home, public) = futures::join!(
            self.source.fetch_timeline(Timeline::Home),
            self.source.fetch_timeline(Timeline::Public),
        );

        let mut total = BatchResult::EMPTY;
        for (timeline, outcome) in [(Timeline::Home, home), (Timeline::Public, public)] {
            let result = match outcome {
                FetchOutcome::Data(statuses) => insert_page(self.store(), statuses).await?,
                FetchOutcome::Empty => BatchResult::EMPTY,
                FetchOutcome::HardLimit => {
                    warn!(timeline = timeline.name(), "Timeline fetch failed");
                    BatchResult::EMPTY
                }
            };
            info!(timeline = timeline.name(), %result, "Timeline ingested");
            total = total + result;
        }
        Ok(total)
    }

    /// Fetches the given statuses concurrently and stores the ones that came back.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn ingest_statuses_by_ids(&self, ids: &[i64]) -> Result<BatchResult> {
        require_ids(ids)?;

        let outcomes = join_all(ids.iter().map(|&id| self.source.fetch_status(id))).await;

        let mut statuses: Page<Status> = Page::default();
        for (&id, outcome) in ids.iter().zip(outcomes) {
            match outcome {
                FetchOutcome::Data(fetched) => statuses.append(fetched),
                FetchOutcome::Empty => debug!(status_id = id, "Status not found upstream"),
                FetchOutcome::HardLimit => warn!(status_id = id, "Status fetch failed, dropping id"),
            }
        }

        let result = insert_page(self.store(), statuses).await?;
        info!(%result, "Statuses by id ingested");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestor::IngestSettings;
    use crate::sources::MockWeiboSource;
    use crate::store::{Collection, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    fn ingestor(store: &Arc<MemoryStore>, source: &Arc<MockWeiboSource>) -> Ingestor {
        Ingestor::new(store.clone(), source.clone(), IngestSettings::default())
    }

    fn data(ids: &[i64]) -> FetchOutcome<Status> {
        FetchOutcome::Data(
            ids.iter()
                .map(|&id| Status::new(id).with_comments_count(1))
                .collect::<Vec<_>>()
                .into(),
        )
    }

    #[tokio::test]
    async fn test_failed_ids_are_excluded() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(
            MockWeiboSource::new()
                .with_status(1, data(&[1]))
                .with_status(2, FetchOutcome::HardLimit)
                .with_status(3, data(&[3])),
        );

        let result = ingestor(&store, &source).ingest_statuses_by_ids(&[1, 2, 3]).await.unwrap();

        assert_eq!(result.total(), 2);
        assert_eq!(result.success(), 2);
        assert!(store.get(Collection::Statuses, 2).is_none());
        let mut calls = source.status_calls();
        calls.sort_unstable();
        assert_eq!(calls, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_known_status_counts_as_miss() {
        let store = Arc::new(MemoryStore::new());
        store.seed(Collection::Statuses, vec![json!({ "id": 1 })]);
        let source = Arc::new(MockWeiboSource::new().with_status(1, data(&[1])).with_status(4, data(&[4])));

        let result = ingestor(&store, &source).ingest_statuses_by_ids(&[1, 4]).await.unwrap();

        assert_eq!(result, BatchResult::new(2, 1));
    }

    #[tokio::test]
    async fn test_ids_required() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MockWeiboSource::new());
        assert!(ingestor(&store, &source).ingest_statuses_by_ids(&[]).await.is_err());
        assert!(source.status_calls().is_empty());
    }

    #[tokio::test]
    async fn test_timelines_are_composed() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(
            MockWeiboSource::new()
                .with_timeline(Timeline::Home, data(&[1, 2]))
                .with_timeline(Timeline::Public, data(&[2, 3, 4])),
        );

        let result = ingestor(&store, &source).ingest_new_statuses().await.unwrap();

        // status 2 appears on both timelines
        assert_eq!(result, BatchResult::new(5, 4));
        assert_eq!(store.len(Collection::Statuses), 4);
    }

    #[tokio::test]
    async fn test_timeline_hard_limit_contributes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(
            MockWeiboSource::new()
                .with_timeline(Timeline::Home, FetchOutcome::HardLimit)
                .with_timeline(Timeline::Public, data(&[7])),
        );

        let result = ingestor(&store, &source).ingest_new_statuses().await.unwrap();

        assert_eq!(result, BatchResult::new(1, 1));
        assert_eq!(source.timeline_calls().len(), 2);
    }
}
