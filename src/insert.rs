//! One-by-one insertion
//!
//! Upstream payloads routinely contain records the store already holds or
//! cannot accept. Each record therefore gets its own insert attempt, and a
//! failure only turns into a miss in the returned [`BatchResult`].

use std::fmt::Display;
use std::future::Future;
use tracing::debug;

use crate::error::StoreError;
use crate::metrics;
use crate::result::BatchResult;
use crate::schemas::Record;
use crate::sources::Page;
use crate::store::Store;

/// Per-batch outcome including the errors behind every miss.
#[derive(Debug)]
pub struct InsertReport<E> {
    pub result: BatchResult,
    pub failures: Vec<E>,
}

/// Attempts `insert_one` once per record, in input order, collecting failures.
pub async fn insert_each<I, F, Fut, E>(records: I, mut insert_one: F) -> InsertReport<E>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut total = 0u64;
    let mut success = 0u64;
    let mut failures = Vec::new();

    for record in records {
        total += 1;
        match insert_one(record).await {
            Ok(()) => success += 1,
            Err(e) => {
                debug!(error = %e, "Insert failed, skipping record");
                failures.push(e);
            }
        }
    }

    InsertReport {
        result: BatchResult::new(total, success),
        failures,
    }
}

/// Attempts `insert_one` once per record; failures never abort the batch.
///
/// `total` is the number of records, `success` the number of attempts that
/// returned `Ok`.
pub async fn insert_one_by_one<I, F, Fut, E>(records: I, insert_one: F) -> BatchResult
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    insert_each(records, insert_one).await.result
}

/// Inserts typed records into their collection one by one.
pub async fn insert_records<R: Record>(store: &dyn Store, records: Vec<R>) -> Result<BatchResult, StoreError> {
    insert_page(store, Page::from(records)).await
}

/// Inserts an upstream page one item at a time.
///
/// Record-level failures (duplicates, items that never decoded) are counted
/// as misses. If the store itself failed during the batch, the batch still
/// runs to completion but the first store-level error is returned.
pub async fn insert_page<R: Record>(store: &dyn Store, page: Page<R>) -> Result<BatchResult, StoreError> {
    let collection = R::COLLECTION;

    let items = page
        .records
        .into_iter()
        .map(|record| record.to_document())
        .chain(page.malformed.into_iter().map(|reason| {
            Err(StoreError::Malformed {
                collection: collection.name(),
                reason,
            })
        }));

    let report = insert_each(items, |item| async move { store.insert_one(collection, item?).await }).await;

    metrics::record_inserted(collection.name(), report.result.success());

    let mut fatal = None;
    for failure in report.failures {
        metrics::record_insert_failure(collection.name(), failure.reason());
        if !failure.is_record_level() && fatal.is_none() {
            fatal = Some(failure);
        }
    }

    match fatal {
        Some(e) => Err(e),
        None => Ok(report.result),
    }
}
