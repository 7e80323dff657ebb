//! Import/Archive store with a durable SQLite backend and an in-memory
//! fallback behind one contract.
//!
//! `StoreProvider` owns the backend selection: each public operation decides
//! its backend exactly once at entry, so a health-flag flip can never split
//! a single transaction across backends. A SQLite failure degrades the
//! provider (subsequent operations run in memory) and surfaces as
//! `Error::Storage`; a periodic re-probe restores durable mode when the
//! database answers again. Data written while degraded does not migrate
//! back, which is why the delete and restore transactions also reconcile
//! rows by (file name, import timestamp).

pub mod memory;
pub mod sql;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{info, warn};

use nid_common::{Category, Error, ImportStatus, Result, StorageMode, Technology};

use crate::breakdown::Breakdown;
use crate::models::{ArchivedRow, ImportRecord, NewRow, ProcessedRow};

use memory::MemState;

/// Rows per INSERT batch inside a bulk insert. Invisible at the contract
/// boundary: all chunks share one transaction.
pub const BULK_CHUNK: usize = 200;

/// Page size bounds for row queries.
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Snapshot type keys in the chart cache.
pub const SNAPSHOT_SIMPLE: &str = "category_counts";
pub const SNAPSHOT_DETAILED: &str = "category_tech_counts";

/// Filter/pagination parameters for `query_rows`.
#[derive(Debug, Clone, Default)]
pub struct RowQuery {
    /// None queries all categories.
    pub category: Option<Category>,
    /// 1-indexed. Pages beyond the last return an empty row list.
    pub page: i64,
    pub page_size: i64,
    /// Case-insensitive match over file name, category, technology, and the
    /// serialized raw payload.
    pub search: Option<String>,
    /// OR-set over the technology tag; empty means no technology filter.
    pub technologies: Vec<Technology>,
}

impl RowQuery {
    /// Clamp pagination to valid bounds: page >= 1, page size in
    /// [1, MAX_PAGE_SIZE]. The page itself is not clamped downward against
    /// the total; an out-of-range page yields an empty list.
    pub fn clamped(mut self) -> Self {
        self.page = self.page.max(1);
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// One page of query results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPage {
    pub rows: Vec<ProcessedRow>,
    pub total_rows: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl RowPage {
    pub fn total_pages_for(total_rows: i64, page_size: i64) -> i64 {
        (total_rows + page_size - 1) / page_size
    }
}

/// A cached breakdown snapshot (either shape, newest wins on read).
#[derive(Debug, Clone)]
pub struct ChartSnapshot {
    pub chart_type: String,
    pub data_values: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Dual-backend store handle shared across request handlers.
#[derive(Clone)]
pub struct StoreProvider {
    pool: Option<SqlitePool>,
    durable_ok: Arc<AtomicBool>,
    mem: Arc<RwLock<MemState>>,
}

impl StoreProvider {
    /// Provider backed by SQLite, with the in-memory store standing by.
    pub fn durable(pool: SqlitePool) -> Self {
        Self {
            pool: Some(pool),
            durable_ok: Arc::new(AtomicBool::new(true)),
            mem: Arc::new(RwLock::new(MemState::default())),
        }
    }

    /// Provider with no durable backend at all (startup probe failed).
    pub fn memory_only() -> Self {
        Self {
            pool: None,
            durable_ok: Arc::new(AtomicBool::new(false)),
            mem: Arc::new(RwLock::new(MemState::default())),
        }
    }

    /// Which backend the next operation would use.
    pub fn mode(&self) -> StorageMode {
        match self.backend() {
            Some(_) => StorageMode::Durable,
            None => StorageMode::Memory,
        }
    }

    /// Backend decision, made once per operation.
    fn backend(&self) -> Option<&SqlitePool> {
        match &self.pool {
            Some(pool) if self.durable_ok.load(Ordering::SeqCst) => Some(pool),
            _ => None,
        }
    }

    /// Record a durable-backend failure: flip the health flag so subsequent
    /// operations use the fallback, and reshape the error for the caller.
    fn degrade(&self, op: &str, err: Error) -> Error {
        match err {
            Error::Database(db_err) => {
                if self.durable_ok.swap(false, Ordering::SeqCst) {
                    warn!("sqlite unavailable during {op}, degrading to in-memory storage: {db_err}");
                }
                Error::Storage(format!("{op}: {db_err}"))
            }
            other => other,
        }
    }

    /// Re-probe the durable backend; restores durable mode on success.
    ///
    /// Data accumulated in the fallback store stays where it is.
    pub async fn reprobe(&self) -> bool {
        let Some(pool) = &self.pool else {
            return false;
        };
        if self.durable_ok.load(Ordering::SeqCst) {
            return true;
        }
        match sql::probe(pool).await {
            Ok(()) => {
                if !self.durable_ok.swap(true, Ordering::SeqCst) {
                    info!("sqlite reachable again, durable mode restored (fallback data not migrated)");
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Close the durable pool. Part of the provider lifecycle; the fallback
    /// state needs no teardown.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }

    // ------------------------------------------------------------------
    // Import store contract
    // ------------------------------------------------------------------

    /// Create an import record in `pending` status.
    pub async fn create_import(
        &self,
        file_name: &str,
        import_date: DateTime<Utc>,
        data_type: &str,
    ) -> Result<ImportRecord> {
        match self.backend() {
            Some(pool) => sql::create_import(pool, file_name, import_date, data_type)
                .await
                .map_err(|e| self.degrade("create_import", e)),
            None => Ok(self
                .mem
                .write()
                .await
                .create_import(file_name, import_date, data_type)),
        }
    }

    /// Mark an import `completed` or `failed`.
    pub async fn finish_import(&self, import_id: i64, status: ImportStatus) -> Result<()> {
        match self.backend() {
            Some(pool) => sql::set_import_status(pool, import_id, status)
                .await
                .map_err(|e| self.degrade("finish_import", e)),
            None => {
                self.mem.write().await.set_import_status(import_id, status);
                Ok(())
            }
        }
    }

    /// All-or-nothing batch insert; chunking is internal (`BULK_CHUNK`).
    pub async fn bulk_insert_rows(&self, import_id: i64, rows: &[NewRow]) -> Result<u64> {
        match self.backend() {
            Some(pool) => sql::bulk_insert_rows(pool, import_id, rows)
                .await
                .map_err(|e| self.degrade("bulk_insert_rows", e)),
            None => Ok(self.mem.write().await.bulk_insert_rows(import_id, rows)),
        }
    }

    /// Recent imports, most-recent-first.
    pub async fn list_imports(&self, limit: i64) -> Result<Vec<ImportRecord>> {
        match self.backend() {
            Some(pool) => sql::list_imports(pool, limit)
                .await
                .map_err(|e| self.degrade("list_imports", e)),
            None => Ok(self.mem.read().await.list_imports(limit)),
        }
    }

    pub async fn count_imports(&self) -> Result<i64> {
        match self.backend() {
            Some(pool) => sql::count_imports(pool)
                .await
                .map_err(|e| self.degrade("count_imports", e)),
            None => Ok(self.mem.read().await.count_imports()),
        }
    }

    /// Paginated, filtered, sorted view over the active rows.
    pub async fn query_rows(&self, query: &RowQuery) -> Result<RowPage> {
        match self.backend() {
            Some(pool) => sql::query_rows(pool, query)
                .await
                .map_err(|e| self.degrade("query_rows", e)),
            None => Ok(self.mem.read().await.query_rows(query)),
        }
    }

    /// Move imports and their rows to the archive in one transaction,
    /// reconciling rows whose owning-id link was never established by
    /// (file name, import timestamp). Returns the number of imports
    /// archived; unknown ids are no-ops.
    pub async fn delete_imports(&self, ids: &[i64]) -> Result<i64> {
        match self.backend() {
            Some(pool) => sql::delete_imports(pool, ids)
                .await
                .map_err(|e| self.degrade("delete_imports", e)),
            None => Ok(self.mem.write().await.delete_imports(ids)),
        }
    }

    // ------------------------------------------------------------------
    // Archive store contract
    // ------------------------------------------------------------------

    /// Most-recently-archived rows first.
    pub async fn list_archived(&self, limit: i64) -> Result<Vec<ArchivedRow>> {
        match self.backend() {
            Some(pool) => sql::list_archived(pool, limit)
                .await
                .map_err(|e| self.degrade("list_archived", e)),
            None => Ok(self.mem.read().await.list_archived(limit)),
        }
    }

    /// Convert archived rows back into active rows under their original
    /// owning-import id (which may no longer exist). Consumed archived
    /// imports are dropped with their last row.
    pub async fn restore(&self, archive_row_ids: &[i64]) -> Result<i64> {
        match self.backend() {
            Some(pool) => sql::restore_rows(pool, archive_row_ids)
                .await
                .map_err(|e| self.degrade("restore", e)),
            None => Ok(self.mem.write().await.restore_rows(archive_row_ids)),
        }
    }

    /// Discard archived rows. No active data or breakdown is touched;
    /// repeating the call deletes nothing and is not an error.
    pub async fn permanently_delete(&self, archive_row_ids: &[i64]) -> Result<i64> {
        match self.backend() {
            Some(pool) => sql::purge_archived(pool, archive_row_ids)
                .await
                .map_err(|e| self.degrade("permanently_delete", e)),
            None => Ok(self.mem.write().await.purge_archived(archive_row_ids)),
        }
    }

    // ------------------------------------------------------------------
    // Breakdown cache
    // ------------------------------------------------------------------

    /// Recompute the breakdown from the active rows and cache both snapshot
    /// shapes.
    pub async fn refresh_breakdown(&self) -> Result<Breakdown> {
        match self.backend() {
            Some(pool) => sql::refresh_breakdown(pool)
                .await
                .map_err(|e| self.degrade("refresh_breakdown", e)),
            None => Ok(self.mem.write().await.refresh_breakdown()),
        }
    }

    /// Latest cached breakdown: detailed snapshot preferred, legacy simple
    /// counts as fallback.
    pub async fn latest_breakdown(&self) -> Result<Option<serde_json::Value>> {
        match self.backend() {
            Some(pool) => sql::latest_breakdown(pool)
                .await
                .map_err(|e| self.degrade("latest_breakdown", e)),
            None => Ok(self.mem.read().await.latest_breakdown()),
        }
    }

    /// Administrative wipe of the chart cache, imports, and active rows.
    /// The archive is left alone.
    pub async fn clear_all(&self) -> Result<()> {
        match self.backend() {
            Some(pool) => sql::clear_all(pool)
                .await
                .map_err(|e| self.degrade("clear_all", e)),
            None => {
                self.mem.write().await.clear_all();
                Ok(())
            }
        }
    }
}
