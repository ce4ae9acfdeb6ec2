//! Persistence tests for the transition history ledger

use tempfile::TempDir;

use railwatch::models::service::HistoryEntry;
use railwatch::models::status::DeploymentStatus;
use railwatch::monitor::history::{HistoryLedger, DEFAULT_CAPACITY};
use railwatch::storage::layout::StorageLayout;

fn entry(n: usize) -> HistoryEntry {
    HistoryEntry::new(
        format!("svc-{}", n),
        format!("service {}", n),
        "proj-1".to_string(),
        Some(format!("dep-{}", n)),
        DeploymentStatus::Building,
        DeploymentStatus::Success,
        None,
    )
}

#[tokio::test]
async fn test_persist_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(dir.path());
    let file = layout.history_file();

    let mut ledger = HistoryLedger::new(DEFAULT_CAPACITY);
    ledger.append(entry(1));
    ledger.append(entry(2));
    ledger.persist(&file).await.unwrap();

    let loaded = HistoryLedger::load(&file, DEFAULT_CAPACITY).await;
    assert_eq!(loaded.len(), 2);
    // Order preserved, most recent first
    assert_eq!(loaded.entries()[0].service_id, "svc-2");
    assert_eq!(loaded.entries()[1].service_id, "svc-1");
    assert_eq!(loaded.entries()[0].deployment_id.as_deref(), Some("dep-2"));
}

#[tokio::test]
async fn test_missing_file_loads_empty() {
    let dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(dir.path());

    let loaded = HistoryLedger::load(&layout.history_file(), DEFAULT_CAPACITY).await;
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn test_corrupt_file_degrades_to_empty() {
    let dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(dir.path());
    let file = layout.history_file();

    std::fs::write(file.path(), "{not json").unwrap();

    let loaded = HistoryLedger::load(&file, DEFAULT_CAPACITY).await;
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn test_legacy_entries_load_with_defaults() {
    let dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(dir.path());
    let file = layout.history_file();

    // Entries written before project_id and deployment fields existed
    let raw = r#"[
        {
            "id": "4f2c2b4e-8a0f-4d3a-9a34-1d1b1e2f3a4b",
            "service_id": "svc-1",
            "service_name": "api",
            "old_status": "DEPLOYING",
            "new_status": "SUCCESS",
            "timestamp": "2025-01-01T00:00:00Z"
        }
    ]"#;
    std::fs::write(file.path(), raw).unwrap();

    let loaded = HistoryLedger::load(&file, DEFAULT_CAPACITY).await;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.entries()[0].project_id, "");
    assert_eq!(loaded.entries()[0].deployment_id, None);
    assert_eq!(loaded.entries()[0].new_status, DeploymentStatus::Success);
}

#[tokio::test]
async fn test_load_truncates_oversized_files() {
    let dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(dir.path());
    let file = layout.history_file();

    let mut ledger = HistoryLedger::new(100);
    for n in 1..=30 {
        ledger.append(entry(n));
    }
    ledger.persist(&file).await.unwrap();

    let loaded = HistoryLedger::load(&file, DEFAULT_CAPACITY).await;
    assert_eq!(loaded.len(), DEFAULT_CAPACITY);
    // The newest entries survive the cut
    assert_eq!(loaded.entries()[0].service_id, "svc-30");
}
