//! Postgres-backed store
//!
//! Each collection is a table of JSONB documents. `seq` gives the natural
//! (insertion) order cursors walk in, and a unique `id` column enforces the
//! one-record-per-upstream-id constraint.
//!
//! Filter paths are inlined into the SQL as text-array literals so the
//! planner can use the expression index on `comments`.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use super::{
    document_id, BufferedCursor, Collection, CursorQuery, Document, Filter, RecordCursor, SortDirection, Store,
};
use crate::error::StoreError;
use crate::schemas::COMMENT_STATUS_ID_PATH;

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    /// Connects to Postgres.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        info!("Connecting to database...");

        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Storage initialized");
        Ok(Self { db })
    }

    /// Creates the collection tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for collection in Collection::ALL {
            let table = collection.name();
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    seq BIGSERIAL PRIMARY KEY,
                    id BIGINT NOT NULL UNIQUE,
                    doc JSONB NOT NULL,
                    inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#
            ))
            .execute(&self.db)
            .await?;
            debug!(table, "Ensured table");
        }

        // backs the "comments already stored" lookup of the comment pass
        let status_id = path_literal(Collection::Comments, COMMENT_STATUS_ID_PATH)?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS comments_status_id_idx ON comments ((doc #> {status_id}))"
        ))
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

/// How an insert rejected by the database is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Duplicate,
    /// The row itself is bad: data exceptions (class 22) and constraint
    /// violations (class 23) other than uniqueness.
    BadRecord,
    Backend,
}

fn classify_sqlstate(code: &str) -> Rejection {
    match code {
        "23505" => Rejection::Duplicate,
        _ if code.starts_with("22") || code.starts_with("23") => Rejection::BadRecord,
        _ => Rejection::Backend,
    }
}

/// Renders a dotted path as a `#>` operand, e.g. `'{status,id}'`.
fn path_literal(collection: Collection, path: &str) -> Result<String, StoreError> {
    let valid = path
        .split('.')
        .all(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if !valid {
        return Err(StoreError::Malformed {
            collection: collection.name(),
            reason: format!("unsupported filter path {path:?}"),
        });
    }
    Ok(format!("'{{{}}}'", path.replace('.', ",")))
}

fn order_keyword(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Forward => "ASC",
        SortDirection::Reverse => "DESC",
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl Store for PgStore {
    async fn open_cursor(&self, query: &CursorQuery) -> Result<Box<dyn RecordCursor>, StoreError> {
        let table = query.collection.name();
        let order = order_keyword(query.direction);

        // One window per cursor: the rows held never exceed the window limit.
        let rows: Vec<Document> = match &query.filter {
            Some(filter) => {
                let path = path_literal(query.collection, filter.path())?;
                let sql = format!(
                    "SELECT doc FROM {table} WHERE doc #> {path} = $3 ORDER BY seq {order} OFFSET $1 LIMIT $2"
                );
                sqlx::query_scalar::<_, Document>(&sql)
                    .bind(clamp_i64(query.window.offset))
                    .bind(clamp_i64(query.window.limit))
                    .bind(filter.value())
                    .fetch_all(&self.db)
                    .await?
            }
            None => {
                let sql = format!("SELECT doc FROM {table} ORDER BY seq {order} OFFSET $1 LIMIT $2");
                sqlx::query_scalar::<_, Document>(&sql)
                    .bind(clamp_i64(query.window.offset))
                    .bind(clamp_i64(query.window.limit))
                    .fetch_all(&self.db)
                    .await?
            }
        };

        debug!(
            table,
            offset = query.window.offset,
            rows = rows.len(),
            "Opened cursor window"
        );

        let rows = rows.into_iter().map(|doc| query.projection.apply(doc)).collect();
        Ok(Box::new(BufferedCursor::new(rows)))
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let path = path_literal(collection, filter.path())?;
        let sql = format!(
            "SELECT doc FROM {} WHERE doc #> {path} = $1 ORDER BY seq ASC LIMIT 1",
            collection.name()
        );
        let doc = sqlx::query_scalar::<_, Document>(&sql)
            .bind(filter.value())
            .fetch_optional(&self.db)
            .await?;
        Ok(doc)
    }

    async fn insert_one(&self, collection: Collection, document: Document) -> Result<(), StoreError> {
        let id = document_id(collection, &document)?;
        let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", collection.name());

        match sqlx::query(&sql).bind(id).bind(&document).execute(&self.db).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) => {
                let rejection = db_err
                    .code()
                    .map_or(Rejection::Backend, |code| classify_sqlstate(&code));
                match rejection {
                    Rejection::Duplicate => Err(StoreError::Duplicate {
                        collection: collection.name(),
                        key: id.to_string(),
                    }),
                    Rejection::BadRecord => Err(StoreError::Malformed {
                        collection: collection.name(),
                        reason: db_err.message().to_string(),
                    }),
                    Rejection::Backend => Err(StoreError::Unavailable(sqlx::Error::Database(db_err))),
                }
            }
            Err(e) => Err(StoreError::Unavailable(e)),
        }
    }

    async fn update(&self, collection: Collection, filter: &Filter, changes: Document) -> Result<u64, StoreError> {
        if !changes.is_object() {
            return Err(StoreError::Malformed {
                collection: collection.name(),
                reason: "update requires object documents".to_string(),
            });
        }
        let path = path_literal(collection, filter.path())?;
        let sql = format!(
            "UPDATE {} SET doc = doc || $2 WHERE doc #> {path} = $1",
            collection.name()
        );
        let result = sqlx::query(&sql)
            .bind(filter.value())
            .bind(&changes)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}
