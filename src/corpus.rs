use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{JobPosting, TrendAnalysisSnapshot};

// --- Consumed interfaces ---

/// Read access to the stored job corpus.
pub trait CorpusAccessor {
    /// Postings with `from <= date_posted < to`; `to = None` means no upper bound.
    fn fetch_postings(&self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Result<Vec<JobPosting>>;

    fn count_distinct_companies(&self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Result<usize>;
}

/// Persistence for analysis snapshots. Snapshots are insert-only.
pub trait SnapshotStore {
    fn save_snapshot(&self, snapshot: &TrendAnalysisSnapshot) -> Result<()>;

    fn latest_snapshot(&self) -> Result<Option<TrendAnalysisSnapshot>>;

    /// Snapshots created within the last `days_ago` days, newest first.
    fn snapshots_since(&self, days_ago: i64, limit: usize) -> Result<Vec<TrendAnalysisSnapshot>>;
}
