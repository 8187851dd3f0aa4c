//! In-memory store
//!
//! Insertion order is the natural order, ids are unique per collection. Used
//! for tests, benchmarks and for dry runs without a database.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{
    document_id, merge_document, BufferedCursor, Collection, CursorQuery, Document, Filter, RecordCursor,
    SortDirection, Store,
};
use crate::error::StoreError;

#[derive(Default)]
struct CollectionData {
    rows: Vec<Document>,
    ids: HashSet<i64>,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, CollectionData>>,
    cursors_opened: AtomicU64,
    updates: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a collection, skipping documents whose id already exists.
    pub fn seed<I>(&self, collection: Collection, documents: I)
    where
        I: IntoIterator<Item = Document>,
    {
        let mut collections = self.collections.write();
        let data = collections.entry(collection).or_default();
        for document in documents {
            if let Ok(id) = document_id(collection, &document) {
                if data.ids.insert(id) {
                    data.rows.push(document);
                }
            }
        }
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .get(&collection)
            .map_or(0, |data| data.rows.len())
    }

    pub fn get(&self, collection: Collection, id: i64) -> Option<Document> {
        let filter = Filter::eq("id", id);
        self.collections
            .read()
            .get(&collection)
            .and_then(|data| data.rows.iter().find(|doc| filter.matches(doc)).cloned())
    }

    /// Number of cursors opened so far.
    pub fn cursors_opened(&self) -> u64 {
        self.cursors_opened.load(Ordering::Relaxed)
    }

    /// Number of update calls issued so far.
    pub fn updates_issued(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Makes every subsequent operation fail as if the backend went away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn open_cursor(&self, query: &CursorQuery) -> Result<Box<dyn RecordCursor>, StoreError> {
        self.check_available()?;
        self.cursors_opened.fetch_add(1, Ordering::Relaxed);

        let collections = self.collections.read();
        let Some(data) = collections.get(&query.collection) else {
            return Ok(Box::new(BufferedCursor::new(Vec::new())));
        };

        let ordered: Box<dyn Iterator<Item = &Document>> = match query.direction {
            SortDirection::Forward => Box::new(data.rows.iter()),
            SortDirection::Reverse => Box::new(data.rows.iter().rev()),
        };
        let offset = usize::try_from(query.window.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.window.limit).unwrap_or(usize::MAX);

        let rows = ordered
            .filter(|doc| query.filter.as_ref().map_or(true, |f| f.matches(doc)))
            .skip(offset)
            .take(limit)
            .map(|doc| query.projection.apply(doc.clone()))
            .collect();

        Ok(Box::new(BufferedCursor::new(rows)))
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError> {
        self.check_available()?;
        Ok(self
            .collections
            .read()
            .get(&collection)
            .and_then(|data| data.rows.iter().find(|doc| filter.matches(doc)).cloned()))
    }

    async fn insert_one(&self, collection: Collection, document: Document) -> Result<(), StoreError> {
        self.check_available()?;
        let id = document_id(collection, &document)?;

        let mut collections = self.collections.write();
        let data = collections.entry(collection).or_default();
        if !data.ids.insert(id) {
            return Err(StoreError::Duplicate {
                collection: collection.name(),
                key: id.to_string(),
            });
        }
        data.rows.push(document);
        Ok(())
    }

    async fn update(&self, collection: Collection, filter: &Filter, changes: Document) -> Result<u64, StoreError> {
        self.check_available()?;
        self.updates.fetch_add(1, Ordering::Relaxed);

        let mut collections = self.collections.write();
        let Some(data) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let mut matched = 0;
        for doc in data.rows.iter_mut().filter(|doc| filter.matches(doc)) {
            merge_document(collection, doc, &changes)?;
            matched += 1;
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Projection, Window};
    use serde_json::json;

    async fn drain(mut cursor: Box<dyn RecordCursor>) -> Vec<Document> {
        let mut out = Vec::new();
        while let Some(doc) = cursor.next().await.unwrap() {
            out.push(doc);
        }
        out
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_ids() {
        let store = MemoryStore::new();
        store.insert_one(Collection::Users, json!({"id": 1})).await.unwrap();
        let err = store.insert_one(Collection::Users, json!({"id": 1, "x": 2})).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));

        let err = store.insert_one(Collection::Users, json!({"name": "no id"})).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
        assert_eq!(store.len(Collection::Users), 1);
    }

    #[tokio::test]
    async fn test_cursor_window_direction_and_projection() {
        let store = MemoryStore::new();
        store.seed(
            Collection::Statuses,
            (1..=5).map(|id| json!({"id": id, "comments_count": id, "text": "t"})),
        );

        let query = CursorQuery::new(Collection::Statuses)
            .project(Projection::fields(&["id"]))
            .direction(SortDirection::Reverse)
            .window(Window::new(1, 2));
        let rows = drain(store.open_cursor(&query).await.unwrap()).await;
        assert_eq!(rows, vec![json!({"id": 4}), json!({"id": 3})]);
        assert_eq!(store.cursors_opened(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_matching_rows() {
        let store = MemoryStore::new();
        store.seed(Collection::Statuses, vec![json!({"id": 1, "comments_count": 3})]);
        let matched = store
            .update(Collection::Statuses, &Filter::eq("id", 1), json!({"comments_count": 0}))
            .await
            .unwrap();
        assert_eq!(matched, 1);
        assert_eq!(store.get(Collection::Statuses, 1).unwrap()["comments_count"], 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_everything() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.find_one(Collection::Comments, &Filter::eq("id", 1)).await.is_err());
        assert!(store.open_cursor(&CursorQuery::new(Collection::Comments)).await.is_err());
    }
}
