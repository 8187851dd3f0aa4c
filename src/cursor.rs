//! Cursor traversal with bounded steps
//!
//! Walks a collection of any size without loading it into memory: a fresh
//! cursor is opened for every step, at most `step` records are read from it,
//! and it is closed before the next one is opened. Re-opening keeps cursors
//! from expiring while a slow per-record callback (network fetches, throttle
//! pauses) runs, and lets the query be re-declared on every step.

use async_trait::async_trait;
use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::metrics;
use crate::store::{Collection, CursorQuery, Document, Filter, Projection, RecordCursor, SortDirection, Store, Window};

/// Opens a cursor over one window of a collection.
#[async_trait]
pub trait CursorFactory: Send + Sync {
    async fn open(&self, window: Window) -> std::result::Result<Box<dyn RecordCursor>, StoreError>;
}

/// Per-record logic supplied by the caller of [`traverse_with_step`].
#[async_trait]
pub trait StepVisitor: Send {
    /// Handles one record. `Break` stops the whole traversal, not just the step.
    async fn visit(&mut self, record: Document) -> Result<ControlFlow<()>>;

    /// Called after every step that produced at least one record, including
    /// the step in which the traversal was stopped.
    async fn end_step(&mut self) -> Result<()> {
        Ok(())
    }
}

/// What a traversal did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalSummary {
    /// Non-empty steps consumed.
    pub steps: u64,
    /// Records handed to the visitor.
    pub visited: u64,
    /// Whether the visitor requested an early stop.
    pub stopped_early: bool,
}

/// Traverses everything `factory` yields, `step` records per cursor.
///
/// Terminates when a freshly opened cursor yields nothing, or as soon as the
/// visitor returns `Break`. Store failures propagate.
pub async fn traverse_with_step<F, V>(factory: &F, step: NonZeroUsize, visitor: &mut V) -> Result<TraversalSummary>
where
    F: CursorFactory + ?Sized,
    V: StepVisitor + ?Sized,
{
    let limit = step.get() as u64;
    let mut summary = TraversalSummary::default();
    let mut offset = 0u64;

    loop {
        let mut cursor = factory.open(Window::new(offset, limit)).await?;
        metrics::record_traversal_step();

        let mut consumed = 0u64;
        let mut stop = false;
        while consumed < limit {
            let Some(record) = cursor.next().await? else {
                break;
            };
            consumed += 1;
            if visitor.visit(record).await?.is_break() {
                stop = true;
                break;
            }
        }
        drop(cursor);

        if consumed == 0 {
            break;
        }

        summary.steps += 1;
        summary.visited += consumed;
        visitor.end_step().await?;

        if stop {
            debug!(offset, consumed, "Traversal stopped by visitor");
            summary.stopped_early = true;
            break;
        }
        offset += consumed;
    }

    debug!(
        steps = summary.steps,
        visited = summary.visited,
        stopped_early = summary.stopped_early,
        "Traversal finished"
    );
    Ok(summary)
}

/// Store-backed cursor factory: one collection, re-declared on every open.
pub struct CollectionScan<'a> {
    store: &'a dyn Store,
    query: CursorQuery,
}

impl<'a> CollectionScan<'a> {
    pub fn new(store: &'a dyn Store, collection: Collection) -> Self {
        Self {
            store,
            query: CursorQuery::new(collection),
        }
    }

    pub fn project(mut self, fields: &[&'static str]) -> Self {
        self.query = self.query.project(Projection::fields(fields));
        self
    }

    pub fn direction(mut self, direction: SortDirection) -> Self {
        self.query = self.query.direction(direction);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.query = self.query.filter(filter);
        self
    }
}

#[async_trait]
impl<'a> CursorFactory for CollectionScan<'a> {
    async fn open(&self, window: Window) -> std::result::Result<Box<dyn RecordCursor>, StoreError> {
        let query = self.query.clone().window(window);
        self.store.open_cursor(&query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BufferedCursor, MemoryStore};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Factory over a fixed list that ignores the window limit, to check the
    /// driver enforces the step bound itself.
    struct ListFactory {
        records: Vec<Document>,
        opens: AtomicU64,
    }

    impl ListFactory {
        fn new(n: i64) -> Self {
            Self {
                records: (0..n).map(|id| json!({ "id": id })).collect(),
                opens: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl CursorFactory for ListFactory {
        async fn open(&self, window: Window) -> std::result::Result<Box<dyn RecordCursor>, StoreError> {
            self.opens.fetch_add(1, Ordering::Relaxed);
            let rows = self.records.iter().skip(window.offset as usize).cloned().collect();
            Ok(Box::new(BufferedCursor::new(rows)))
        }
    }

    #[derive(Default)]
    struct Collect {
        ids: Vec<i64>,
        step_sizes: Vec<usize>,
        current: usize,
        stop_at: Option<i64>,
    }

    #[async_trait]
    impl StepVisitor for Collect {
        async fn visit(&mut self, record: Document) -> Result<ControlFlow<()>> {
            let id = record["id"].as_i64().unwrap_or_default();
            self.ids.push(id);
            self.current += 1;
            if self.stop_at == Some(id) {
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        }

        async fn end_step(&mut self) -> Result<()> {
            self.step_sizes.push(self.current);
            self.current = 0;
            Ok(())
        }
    }

    fn step(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_visits_every_record_once_for_any_step() {
        for s in [1, 3, 7, 10, 11, 50] {
            let factory = ListFactory::new(10);
            let mut visitor = Collect::default();
            let summary = traverse_with_step(&factory, step(s), &mut visitor).await.unwrap();

            assert_eq!(visitor.ids, (0..10).collect::<Vec<_>>(), "step {s}");
            assert_eq!(summary.visited, 10);
            assert!(!summary.stopped_early);
            assert!(visitor.step_sizes.iter().all(|&n| n <= s));
            // one window per step plus the final empty read
            assert_eq!(factory.opens.load(Ordering::Relaxed), summary.steps + 1);
        }
    }

    #[tokio::test]
    async fn test_early_stop_halts_before_next_step() {
        let factory = ListFactory::new(20);
        let mut visitor = Collect {
            stop_at: Some(5),
            ..Default::default()
        };
        let summary = traverse_with_step(&factory, step(4), &mut visitor).await.unwrap();

        assert_eq!(visitor.ids, vec![0, 1, 2, 3, 4, 5]);
        assert!(summary.stopped_early);
        assert_eq!(factory.opens.load(Ordering::Relaxed), 2);
        // the partial step is still flushed
        assert_eq!(visitor.step_sizes, vec![4, 2]);
    }

    #[tokio::test]
    async fn test_empty_collection_opens_once() {
        let factory = ListFactory::new(0);
        let mut visitor = Collect::default();
        let summary = traverse_with_step(&factory, step(5), &mut visitor).await.unwrap();

        assert_eq!(summary, TraversalSummary::default());
        assert!(visitor.step_sizes.is_empty());
        assert_eq!(factory.opens.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_collection_scan_reverse_order() {
        let store = MemoryStore::new();
        store.seed(Collection::Statuses, (1..=5).map(|id| json!({"id": id, "text": "x"})));

        let scan = CollectionScan::new(&store, Collection::Statuses)
            .project(&["id"])
            .direction(SortDirection::Reverse);
        let mut visitor = Collect::default();
        traverse_with_step(&scan, step(2), &mut visitor).await.unwrap();

        assert_eq!(visitor.ids, vec![5, 4, 3, 2, 1]);
        assert_eq!(visitor.step_sizes, vec![2, 2, 1]);
        assert_eq!(store.cursors_opened(), 4);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let scan = CollectionScan::new(&store, Collection::Statuses);
        let mut visitor = Collect::default();
        assert!(traverse_with_step(&scan, step(2), &mut visitor).await.is_err());
    }
}
