//! Upstream fetch gateway
//!
//! Every call to the Weibo API ends in exactly one of three outcomes. Callers
//! must handle all three: `Empty` means "nothing to fetch here, carry on",
//! `HardLimit` means "upstream refuses to serve us, stop this pass".

pub mod mock;
pub mod weibo;

pub use mock::MockWeiboSource;
pub use weibo::WeiboApiSource;

use async_trait::async_trait;

use crate::schemas::{Comment, Status};

/// Items of one upstream response.
///
/// Items that did not decode are kept with the decode error so the inserter
/// can count them as misses.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub malformed: Vec<String>,
}

impl<T> Page<T> {
    pub fn new(records: Vec<T>, malformed: Vec<String>) -> Self {
        Self { records, malformed }
    }

    /// Number of upstream items, decoded or not.
    pub fn len(&self) -> usize {
        self.records.len() + self.malformed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&mut self, other: Page<T>) {
        self.records.extend(other.records);
        self.malformed.extend(other.malformed);
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl<T> From<Vec<T>> for Page<T> {
    fn from(records: Vec<T>) -> Self {
        Self::new(records, Vec::new())
    }
}

/// Outcome of one upstream fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// A non-empty page. It may hold only undecodable items.
    Data(Page<T>),
    /// A valid response with nothing in it.
    Empty,
    /// Transport failure, non-success status or API-reported throttling.
    HardLimit,
}

impl<T> FetchOutcome<T> {
    /// `Empty` only when upstream returned no items at all.
    pub fn from_page(page: Page<T>) -> Self {
        if page.is_empty() {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Data(page)
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Data(_) => "data",
            FetchOutcome::Empty => "empty",
            FetchOutcome::HardLimit => "hard_limit",
        }
    }
}

/// Public timelines the status pass reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeline {
    Home,
    Public,
}

impl Timeline {
    pub const ALL: [Timeline; 2] = [Timeline::Home, Timeline::Public];

    pub fn name(&self) -> &'static str {
        match self {
            Timeline::Home => "home",
            Timeline::Public => "public",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Timeline::Home => "statuses/home_timeline.json",
            Timeline::Public => "statuses/public_timeline.json",
        }
    }
}

/// The three upstream reads the ingestion passes need.
#[async_trait]
pub trait WeiboSource: Send + Sync {
    /// First page of comments of one status.
    async fn fetch_comments(&self, status_id: i64) -> FetchOutcome<Comment>;

    /// First page of a timeline.
    async fn fetch_timeline(&self, timeline: Timeline) -> FetchOutcome<Status>;

    /// A single status; `Data` always holds exactly one record.
    async fn fetch_status(&self, id: i64) -> FetchOutcome<Status>;
}
