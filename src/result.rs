//! Batch Result Algebra
//!
//! Every ingestion step reports how many records it attempted and how many
//! actually landed in the store. Results from nested fetch/insert operations
//! are combined field by field, so a whole pass can be summarised as a single
//! `success / total` pair without collapsing it to a boolean.

use serde::Serialize;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Outcome of one unit of ingestion work.
///
/// Immutable once produced: composition always returns a new value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct BatchResult {
    total: u64,
    success: u64,
}

impl BatchResult {
    /// The identity element, `{0, 0}`.
    pub const EMPTY: BatchResult = BatchResult { total: 0, success: 0 };

    /// Builds a result, clamping `success` so that `success <= total` holds.
    pub fn new(total: u64, success: u64) -> Self {
        Self {
            total,
            success: success.min(total),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn success(&self) -> u64 {
        self.success
    }

    /// Attempts that did not land (duplicates, malformed records, store rejections).
    pub fn failed(&self) -> u64 {
        self.total - self.success
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Field-wise sum of two results.
    pub fn combine(self, other: BatchResult) -> BatchResult {
        BatchResult {
            total: self.total + other.total,
            success: self.success + other.success,
        }
    }

    /// Combines any number of results; an empty sequence yields `{0, 0}`.
    pub fn concat<I>(results: I) -> BatchResult
    where
        I: IntoIterator<Item = BatchResult>,
    {
        results.into_iter().fold(Self::EMPTY, BatchResult::combine)
    }
}

impl Add for BatchResult {
    type Output = BatchResult;

    fn add(self, rhs: BatchResult) -> BatchResult {
        self.combine(rhs)
    }
}

impl Sum for BatchResult {
    fn sum<I: Iterator<Item = BatchResult>>(iter: I) -> BatchResult {
        BatchResult::concat(iter)
    }
}

impl<'a> Sum<&'a BatchResult> for BatchResult {
    fn sum<I: Iterator<Item = &'a BatchResult>>(iter: I) -> BatchResult {
        BatchResult::concat(iter.copied())
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.success, self.total)
    }
}
