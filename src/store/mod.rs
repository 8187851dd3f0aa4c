//! Storage layer for ingested data
//!
//! The ingestion engine only needs four capabilities from a store: a
//! forward-only cursor over a collection (with projection, sort direction and
//! a window), a point lookup by filter, an insert that fails on constraint
//! violation, and an update-by-filter. Both the Postgres store and the
//! in-memory store used by tests implement [`Store`].

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// A stored record. Records are JSON documents keyed by their `id` field.
pub type Document = Value;

/// Collections the engine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Statuses,
    Comments,
    Users,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Statuses, Collection::Comments, Collection::Users];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Statuses => "statuses",
            Collection::Comments => "comments",
            Collection::Users => "users",
        }
    }
}

/// Natural (insertion) order, or its reverse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Forward,
    Reverse,
}

impl SortDirection {
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse {
            SortDirection::Reverse
        } else {
            SortDirection::Forward
        }
    }
}

/// Equality predicate on a dotted path, e.g. `status.id == 42`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    path: String,
    value: Value,
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn matches(&self, document: &Document) -> bool {
        let pointer = format!("/{}", self.path.replace('.', "/"));
        document.pointer(&pointer) == Some(&self.value)
    }
}

/// Which top-level fields a cursor returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Projection {
    #[default]
    All,
    Fields(Vec<&'static str>),
}

impl Projection {
    pub fn fields(fields: &[&'static str]) -> Self {
        Projection::Fields(fields.to_vec())
    }

    pub fn apply(&self, document: Document) -> Document {
        match (self, document) {
            (Projection::All, document) => document,
            (Projection::Fields(fields), Value::Object(mut source)) => {
                let mut projected = Map::with_capacity(fields.len());
                for field in fields {
                    if let Some(value) = source.remove(*field) {
                        projected.insert((*field).to_string(), value);
                    }
                }
                Value::Object(projected)
            }
            (Projection::Fields(_), other) => other,
        }
    }
}

/// Slice of a collection a single cursor covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

impl Window {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    pub fn unbounded() -> Self {
        Self {
            offset: 0,
            limit: u64::MAX,
        }
    }
}

/// A cursor declaration. Re-declared in full every time a cursor is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorQuery {
    pub collection: Collection,
    pub projection: Projection,
    pub direction: SortDirection,
    pub filter: Option<Filter>,
    pub window: Window,
}

impl CursorQuery {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            projection: Projection::All,
            direction: SortDirection::Forward,
            filter: None,
            window: Window::unbounded(),
        }
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }
}

/// Forward-only cursor. Dropping it closes it.
#[async_trait]
pub trait RecordCursor: Send {
    /// Next record, or `None` once the cursor is exhausted.
    async fn next(&mut self) -> Result<Option<Document>, StoreError>;
}

/// Persistence capabilities consumed by the ingestion engine.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a cursor over `query.collection` restricted to `query.window`.
    async fn open_cursor(&self, query: &CursorQuery) -> Result<Box<dyn RecordCursor>, StoreError>;

    /// First record (in natural order) matching `filter`.
    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError>;

    /// Inserts one record; fails with [`StoreError::Duplicate`] if its `id` already exists.
    async fn insert_one(&self, collection: Collection, document: Document) -> Result<(), StoreError>;

    /// Shallow-merges `changes` into every record matching `filter`. Returns the match count.
    async fn update(&self, collection: Collection, filter: &Filter, changes: Document) -> Result<u64, StoreError>;
}

/// Cursor over rows already fetched for one window.
pub struct BufferedCursor {
    rows: std::vec::IntoIter<Document>,
}

impl BufferedCursor {
    pub fn new(rows: Vec<Document>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

#[async_trait]
impl RecordCursor for BufferedCursor {
    async fn next(&mut self) -> Result<Option<Document>, StoreError> {
        Ok(self.rows.next())
    }
}

/// Extracts the integer `id` every stored record must carry.
pub fn document_id(collection: Collection, document: &Document) -> Result<i64, StoreError> {
    document
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| StoreError::Malformed {
            collection: collection.name(),
            reason: "missing integer id".to_string(),
        })
}

/// Shallow merge of `changes` into `target`. Non-object changes are rejected.
pub fn merge_document(collection: Collection, target: &mut Document, changes: &Document) -> Result<(), StoreError> {
    let (Value::Object(target), Value::Object(changes)) = (target, changes) else {
        return Err(StoreError::Malformed {
            collection: collection.name(),
            reason: "update requires object documents".to_string(),
        });
    };
    for (key, value) in changes {
        target.insert(key.clone(), value.clone());
    }
    Ok(())
}
