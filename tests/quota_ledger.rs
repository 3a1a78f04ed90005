//! Quota Ledger Integration Tests
//!
//! Tests for the on-disk ledger format, reload behavior, and day keying.

use chrono::NaiveDate;
use tempfile::TempDir;

use herald::core::{JsonQuotaStore, QuotaLedger};
use herald::domain::QuotaRecord;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_ledger_file_shape() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("quota.json");

    let ledger = QuotaLedger::open(Box::new(JsonQuotaStore::new(path.clone())))
        .await
        .unwrap();

    ledger.record_sent_on("acme", day(2026, 8, 7)).await;
    ledger.record_sent_on("acme", day(2026, 8, 7)).await;
    ledger.record_sent_on("globex", day(2026, 8, 7)).await;

    // The store holds the full ledger as one JSON object keyed by
    // {project}_{iso-date}
    let content = tokio::fs::read_to_string(&path).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();

    assert_eq!(parsed["acme_2026-08-07"]["sent_count"], 2);
    assert_eq!(parsed["acme_2026-08-07"]["project_id"], "acme");
    assert_eq!(parsed["acme_2026-08-07"]["date"], "2026-08-07");
    assert_eq!(parsed["globex_2026-08-07"]["sent_count"], 1);
}

#[tokio::test]
async fn test_reload_restores_counts() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("quota.json");

    {
        let ledger = QuotaLedger::open(Box::new(JsonQuotaStore::new(path.clone())))
            .await
            .unwrap();
        for _ in 0..4 {
            ledger.record_sent_on("acme", day(2026, 8, 6)).await;
        }
    }

    // A fresh process loads the flushed state and keeps counting from it
    let ledger = QuotaLedger::open(Box::new(JsonQuotaStore::new(path)))
        .await
        .unwrap();
    assert_eq!(ledger.sent_on("acme", day(2026, 8, 6)).await, 4);

    ledger.record_sent_on("acme", day(2026, 8, 6)).await;
    assert_eq!(ledger.sent_on("acme", day(2026, 8, 6)).await, 5);
}

#[tokio::test]
async fn test_concurrent_increments_all_land() {
    let temp = TempDir::new().unwrap();
    let ledger = std::sync::Arc::new(
        QuotaLedger::open(Box::new(JsonQuotaStore::new(temp.path().join("quota.json"))))
            .await
            .unwrap(),
    );
    let today = day(2026, 8, 7);

    // Concurrent increments from different projects all land
    let mut handles = Vec::new();
    for project in ["acme", "globex", "initech"] {
        for _ in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.record_sent_on(project, today).await;
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for project in ["acme", "globex", "initech"] {
        assert_eq!(ledger.sent_on(project, today).await, 10);
    }

    let all = ledger.all_records().await;
    assert_eq!(all.len(), 3);
    assert!(all.values().all(|r: &QuotaRecord| r.sent_count == 10));
}
