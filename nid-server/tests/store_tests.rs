//! Store-level tests against the SQLite backend, covering the parts the
//! HTTP tests can't reach directly: the orphan-row reconciliation pass,
//! raw-payload round trips, snapshot preference, and backend degradation.

use chrono::{DateTime, Utc};
use serde_json::{json, Map};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use nid_common::{Category, Error, ImportStatus, Technology};
use nid_server::models::NewRow;
use nid_server::store::{sql, RowQuery, StoreProvider, SNAPSHOT_SIMPLE};

async fn setup_store() -> (StoreProvider, SqlitePool, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .expect("Should open test database");
    sql::init_schema(&pool).await.expect("Should init schema");
    (StoreProvider::durable(pool.clone()), pool, dir)
}

fn new_row(
    file_name: &str,
    import_date: DateTime<Utc>,
    category: Category,
    technology: Technology,
    site: &str,
) -> NewRow {
    let mut raw = Map::new();
    raw.insert("site".to_string(), json!(site));
    raw.insert("status".to_string(), json!("active"));
    NewRow {
        file_name: file_name.to_string(),
        import_date,
        category,
        technology,
        sheet: None,
        raw,
    }
}

#[tokio::test]
async fn test_bulk_insert_preserves_raw_payload() {
    let (store, _pool, _dir) = setup_store().await;
    let date = Utc::now();
    let import = store.create_import("cells.csv", date, "csv").await.unwrap();

    let rows = vec![
        new_row("cells.csv", date, Category::Wireless, Technology::G5, "SiteAlpha"),
        new_row("cells.csv", date, Category::Transport, Technology::Other, "RingOne"),
    ];
    assert_eq!(store.bulk_insert_rows(import.id, &rows).await.unwrap(), 2);
    store
        .finish_import(import.id, ImportStatus::Completed)
        .await
        .unwrap();

    let page = store
        .query_rows(&RowQuery {
            page: 1,
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total_rows, 2);
    let stored = page
        .rows
        .iter()
        .find(|r| r.category == Category::Wireless)
        .unwrap();
    assert_eq!(stored.import_id, Some(import.id));
    assert_eq!(stored.data, rows[0].raw);
    // Column order survives the round trip
    let keys: Vec<&String> = stored.data.keys().collect();
    assert_eq!(keys, vec!["site", "status"]);
}

#[tokio::test]
async fn test_query_rows_search_matches_raw_payload() {
    let (store, _pool, _dir) = setup_store().await;
    let date = Utc::now();
    let import = store.create_import("cells.csv", date, "csv").await.unwrap();
    let rows = vec![
        new_row("cells.csv", date, Category::Wireless, Technology::G5, "SiteAlpha"),
        new_row("cells.csv", date, Category::Wireless, Technology::Lte, "SiteBeta"),
    ];
    store.bulk_insert_rows(import.id, &rows).await.unwrap();

    let page = store
        .query_rows(&RowQuery {
            page: 1,
            page_size: 10,
            search: Some("sitealpha".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total_rows, 1);
    assert_eq!(page.rows[0].technology, Technology::G5);
}

#[tokio::test]
async fn test_delete_reconciles_orphan_rows_by_file_and_timestamp() {
    let (store, pool, _dir) = setup_store().await;
    let date = Utc::now();
    let import = store.create_import("cells.csv", date, "csv").await.unwrap();
    let rows = vec![new_row(
        "cells.csv",
        date,
        Category::Wireless,
        Technology::G5,
        "SiteAlpha",
    )];
    store.bulk_insert_rows(import.id, &rows).await.unwrap();

    // An orphan: same file name and timestamp, but no owning-import link
    // (as left behind by a fallback-mode write).
    sqlx::query(
        "INSERT INTO processed_rows \
         (import_id, file_name, import_date, category, technology, sheet, raw_data) \
         VALUES (NULL, ?, ?, 'wireless', 'lte', NULL, '{}')",
    )
    .bind("cells.csv")
    .bind(date.to_rfc3339())
    .execute(&pool)
    .await
    .unwrap();

    assert_eq!(store.delete_imports(&[import.id]).await.unwrap(), 1);

    let archived = store.list_archived(100).await.unwrap();
    assert_eq!(archived.len(), 2);
    let parent = archived[0].archived_import_id;
    assert!(archived.iter().all(|r| r.archived_import_id == parent));
    assert!(archived.iter().any(|r| r.original_import_id.is_none()));
    assert!(archived
        .iter()
        .any(|r| r.original_import_id == Some(import.id)));

    // Nothing active remains
    let page = store
        .query_rows(&RowQuery {
            page: 1,
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total_rows, 0);
}

#[tokio::test]
async fn test_restore_preserves_tags_and_payload() {
    let (store, _pool, _dir) = setup_store().await;
    let date = Utc::now();
    let import = store.create_import("cells.csv", date, "csv").await.unwrap();
    let rows = vec![
        new_row("cells.csv", date, Category::Wireline, Technology::Other, "CabinetA"),
        new_row("cells.csv", date, Category::Wireless, Technology::G3, "SiteGamma"),
    ];
    store.bulk_insert_rows(import.id, &rows).await.unwrap();
    store.delete_imports(&[import.id]).await.unwrap();

    let archived = store.list_archived(100).await.unwrap();
    let ids: Vec<i64> = archived.iter().map(|r| r.id).collect();
    assert_eq!(store.restore(&ids).await.unwrap(), 2);

    assert!(store.list_archived(100).await.unwrap().is_empty());

    let page = store
        .query_rows(&RowQuery {
            page: 1,
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total_rows, 2);
    let restored = page
        .rows
        .iter()
        .find(|r| r.category == Category::Wireline)
        .unwrap();
    assert_eq!(restored.technology, Technology::Other);
    assert_eq!(restored.data, rows[0].raw);
    // Restored rows keep the original owning id even though that import is
    // gone from the active list.
    assert_eq!(restored.import_id, Some(import.id));
    assert!(store.list_imports(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_and_purge_unknown_ids_are_noops() {
    let (store, _pool, _dir) = setup_store().await;
    assert_eq!(store.restore(&[99, 100]).await.unwrap(), 0);
    assert_eq!(store.permanently_delete(&[99]).await.unwrap(), 0);
    assert_eq!(store.delete_imports(&[42]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_latest_breakdown_prefers_detailed_snapshot() {
    let (store, pool, _dir) = setup_store().await;

    // Only a legacy simple-counts snapshot present
    sqlx::query("INSERT INTO chart_data (chart_type, data_values, created_at) VALUES (?, ?, ?)")
        .bind(SNAPSHOT_SIMPLE)
        .bind(r#"{"transport":1,"wireless":2,"wireline":0}"#)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

    let snapshot = store.latest_breakdown().await.unwrap().unwrap();
    assert_eq!(snapshot["wireless"], 2);
    assert!(snapshot.get("categories").is_none());

    // A refresh writes the detailed shape, which then wins
    store.refresh_breakdown().await.unwrap();
    let snapshot = store.latest_breakdown().await.unwrap().unwrap();
    assert!(snapshot.get("categories").is_some());
}

#[tokio::test]
async fn test_degraded_provider_falls_back_to_memory() {
    let (store, pool, _dir) = setup_store().await;
    pool.close().await;

    // The operation that hits the dead backend fails with a storage error
    // and flips the provider.
    let err = store
        .create_import("cells.csv", Utc::now(), "csv")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(store.mode().as_str(), "in-memory");

    // Subsequent operations are served from memory.
    let import = store
        .create_import("cells.csv", Utc::now(), "csv")
        .await
        .unwrap();
    let rows = vec![new_row(
        "cells.csv",
        import.import_date,
        Category::Wireless,
        Technology::G5,
        "SiteAlpha",
    )];
    assert_eq!(store.bulk_insert_rows(import.id, &rows).await.unwrap(), 1);
    let page = store
        .query_rows(&RowQuery {
            page: 1,
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total_rows, 1);

    // The dead backend stays dead; re-probe does not flip back.
    assert!(!store.reprobe().await);
    assert_eq!(store.mode().as_str(), "in-memory");
}
