//! Per-project daily send quota ledger.
//!
//! The ledger tracks one counter per (project, calendar day). State lives
//! in memory and is flushed through a pluggable store after every
//! increment; the whole ledger is loaded once at startup and rewritten in
//! full on each save. A failed flush is logged and swallowed; the
//! in-memory count stays authoritative for the process lifetime.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::warn;

use crate::domain::{quota_key, QuotaRecord};

/// Errors from the quota persistence collaborator.
#[derive(Debug, Error)]
pub enum QuotaStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value persistence for quota records, keyed `{project}_{iso_date}`.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Load every stored record. A store with no prior state returns an
    /// empty map.
    async fn load(&self) -> Result<HashMap<String, QuotaRecord>, QuotaStoreError>;

    /// Persist the full ledger, replacing whatever was stored before.
    async fn save(&self, records: &HashMap<String, QuotaRecord>) -> Result<(), QuotaStoreError>;
}

/// JSON-file store.
pub struct JsonQuotaStore {
    path: PathBuf,
}

impl JsonQuotaStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl QuotaStore for JsonQuotaStore {
    async fn load(&self) -> Result<HashMap<String, QuotaRecord>, QuotaStoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save(&self, records: &HashMap<String, QuotaRecord>) -> Result<(), QuotaStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, content).await?;

        Ok(())
    }
}

/// Ledger of successful sends per (project, day).
pub struct QuotaLedger {
    store: Box<dyn QuotaStore>,

    /// Record key → record; one write lock serializes all increments
    records: RwLock<HashMap<String, QuotaRecord>>,
}

impl QuotaLedger {
    /// Open a ledger, loading prior state from the store.
    pub async fn open(store: Box<dyn QuotaStore>) -> Result<Self, QuotaStoreError> {
        let records = store.load().await?;
        Ok(Self {
            store,
            records: RwLock::new(records),
        })
    }

    /// Count one successful send for `project_id` today.
    pub async fn record_sent(&self, project_id: &str) {
        self.record_sent_on(project_id, Utc::now().date_naive())
            .await;
    }

    /// Count one successful send for `project_id` on an explicit day.
    pub async fn record_sent_on(&self, project_id: &str, date: NaiveDate) {
        let mut records = self.records.write().await;

        let record = records
            .entry(quota_key(project_id, date))
            .or_insert_with(|| QuotaRecord::new(project_id, date));
        record.sent_count += 1;

        // Flush inside the lock so the file always holds a consistent
        // snapshot. Failures do not roll back the in-memory count.
        if let Err(e) = self.store.save(&records).await {
            warn!(project = %project_id, error = %e, "Failed to persist quota ledger");
        }
    }

    /// Today's count for `project_id`, zero if nothing was sent yet.
    pub async fn sent_today(&self, project_id: &str) -> u64 {
        self.sent_on(project_id, Utc::now().date_naive()).await
    }

    /// Count for `project_id` on an explicit day.
    pub async fn sent_on(&self, project_id: &str, date: NaiveDate) -> u64 {
        let records = self.records.read().await;
        records
            .get(&quota_key(project_id, date))
            .map(|r| r.sent_count)
            .unwrap_or(0)
    }

    /// Every stored record, keyed `{project}_{iso_date}`.
    pub async fn all_records(&self) -> HashMap<String, QuotaRecord> {
        self.records.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn open_ledger(temp: &TempDir) -> QuotaLedger {
        let store = JsonQuotaStore::new(temp.path().join("quota.json"));
        QuotaLedger::open(Box::new(store)).await.unwrap()
    }

    #[tokio::test]
    async fn test_increment_accumulates() {
        let temp = TempDir::new().unwrap();
        let ledger = open_ledger(&temp).await;
        let today = day(2026, 8, 7);

        for _ in 0..5 {
            ledger.record_sent_on("acme", today).await;
        }

        assert_eq!(ledger.sent_on("acme", today).await, 5);
        assert_eq!(ledger.sent_on("globex", today).await, 0);
    }

    #[tokio::test]
    async fn test_day_rollover_keeps_history() {
        let temp = TempDir::new().unwrap();
        let ledger = open_ledger(&temp).await;
        let yesterday = day(2026, 8, 6);
        let today = day(2026, 8, 7);

        ledger.record_sent_on("acme", yesterday).await;
        ledger.record_sent_on("acme", yesterday).await;

        // A new day starts from zero while history stays queryable
        assert_eq!(ledger.sent_on("acme", today).await, 0);
        assert_eq!(ledger.sent_on("acme", yesterday).await, 2);

        ledger.record_sent_on("acme", today).await;

        let all = ledger.all_records().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all["acme_2026-08-06"].sent_count, 2);
        assert_eq!(all["acme_2026-08-07"].sent_count, 1);
    }

    #[tokio::test]
    async fn test_counts_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let today = day(2026, 8, 7);

        {
            let ledger = open_ledger(&temp).await;
            ledger.record_sent_on("acme", today).await;
            ledger.record_sent_on("acme", today).await;
        }

        let reopened = open_ledger(&temp).await;
        assert_eq!(reopened.sent_on("acme", today).await, 2);
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        struct FailingStore;

        #[async_trait]
        impl QuotaStore for FailingStore {
            async fn load(&self) -> Result<HashMap<String, QuotaRecord>, QuotaStoreError> {
                Ok(HashMap::new())
            }

            async fn save(
                &self,
                _records: &HashMap<String, QuotaRecord>,
            ) -> Result<(), QuotaStoreError> {
                Err(QuotaStoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "disk full",
                )))
            }
        }

        let ledger = QuotaLedger::open(Box::new(FailingStore)).await.unwrap();
        let today = day(2026, 8, 7);

        ledger.record_sent_on("acme", today).await;
        ledger.record_sent_on("acme", today).await;

        // In-memory count remains authoritative despite failed flushes
        assert_eq!(ledger.sent_on("acme", today).await, 2);
    }
}
