//! Unit tests for the watermark crate.

use chrono::{NaiveDate, NaiveDateTime};

use crate::{advances, MemoryStore, SurrealStore, WatermarkStore, TRACKED_TABLES};

fn ts(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2006, 2, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

async fn surreal_store() -> SurrealStore {
    let db = surrealdb::engine::any::connect("mem://").await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    SurrealStore::new(db)
}

#[test]
fn test_advances() {
    assert!(advances(None, ts(15, 5)));
    assert!(advances(Some(ts(15, 5)), ts(15, 6)));
    assert!(!advances(Some(ts(15, 5)), ts(15, 5)));
    assert!(!advances(Some(ts(15, 5)), ts(14, 5)));
}

#[test]
fn test_tracked_tables_are_unique() {
    let mut tables = TRACKED_TABLES.to_vec();
    tables.sort();
    tables.dedup();
    assert_eq!(tables.len(), TRACKED_TABLES.len());
}

// ============================================================================
// Shared behaviour, run against every backend
// ============================================================================

async fn check_missing_row_reads_as_none(store: &dyn WatermarkStore) {
    assert_eq!(store.get("film").await.unwrap(), None);
}

async fn check_set_then_get(store: &dyn WatermarkStore) {
    assert!(store.set("film", ts(15, 5)).await.unwrap());
    assert_eq!(store.get("film").await.unwrap(), Some(ts(15, 5)));
}

async fn check_never_regresses(store: &dyn WatermarkStore) {
    store.set("rental", ts(20, 0)).await.unwrap();
    assert!(!store.set("rental", ts(10, 0)).await.unwrap());
    assert!(!store.set("rental", ts(20, 0)).await.unwrap());
    assert_eq!(store.get("rental").await.unwrap(), Some(ts(20, 0)));

    assert!(store.set("rental", ts(21, 0)).await.unwrap());
    assert_eq!(store.get("rental").await.unwrap(), Some(ts(21, 0)));
}

async fn check_seed_keeps_existing(store: &dyn WatermarkStore) {
    store.seed("actor").await.unwrap();
    assert_eq!(store.get("actor").await.unwrap(), None);

    store.set("category", ts(15, 4)).await.unwrap();
    store.seed("category").await.unwrap();
    assert_eq!(store.get("category").await.unwrap(), Some(ts(15, 4)));

    let rows = store.list().await.unwrap();
    let names: Vec<&str> = rows.iter().map(|w| w.table_name.as_str()).collect();
    assert_eq!(names, vec!["actor", "category"]);
    assert_eq!(rows[0].last_update, None);
}

#[tokio::test]
async fn test_memory_store() {
    check_missing_row_reads_as_none(&MemoryStore::new()).await;
    check_set_then_get(&MemoryStore::new()).await;
    check_never_regresses(&MemoryStore::new()).await;
    check_seed_keeps_existing(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_surreal_store() {
    check_missing_row_reads_as_none(&surreal_store().await).await;
    check_set_then_get(&surreal_store().await).await;
    check_never_regresses(&surreal_store().await).await;
    check_seed_keeps_existing(&surreal_store().await).await;
}

#[tokio::test]
async fn test_surreal_seed_all_tracked_tables() {
    let store = surreal_store().await;
    for table in TRACKED_TABLES {
        store.seed(table).await.unwrap();
    }
    // Seeding twice must not duplicate rows.
    for table in TRACKED_TABLES {
        store.seed(table).await.unwrap();
    }
    let rows = store.list().await.unwrap();
    assert_eq!(rows.len(), TRACKED_TABLES.len());
    assert!(rows.iter().all(|w| w.last_update.is_none()));
}
