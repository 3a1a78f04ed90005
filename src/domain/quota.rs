//! Per-project, per-day quota records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Cumulative successful-send count for one project on one calendar day.
///
/// Counts are monotonically non-decreasing within a day; a new day starts a
/// fresh record and older records remain as queryable history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub project_id: String,

    /// ISO calendar date the count belongs to
    pub date: NaiveDate,

    pub sent_count: u64,
}

impl QuotaRecord {
    /// Create a fresh record with a zero count.
    pub fn new(project_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            project_id: project_id.into(),
            date,
            sent_count: 0,
        }
    }

    /// Storage key, `{project_id}_{iso_date}`.
    pub fn key(&self) -> String {
        quota_key(&self.project_id, self.date)
    }
}

/// Build the `{project_id}_{iso_date}` storage key.
pub fn quota_key(project_id: &str, date: NaiveDate) -> String {
    format!("{}_{}", project_id, date.format("%Y-%m-%d"))
}
