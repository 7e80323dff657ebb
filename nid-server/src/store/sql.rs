//! SQLite backend for the import/archive store.
//!
//! Plain runtime queries over a shared pool; every multi-step write runs
//! inside one transaction and the breakdown snapshot is refreshed in that
//! same transaction, so no partially-applied state is ever observable.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};

use nid_common::{Error, ImportStatus, Result};

use crate::breakdown::Breakdown;
use crate::models::{ArchivedRow, ImportRecord, NewRow, ProcessedRow};

use super::{RowPage, RowQuery, BULK_CHUNK, SNAPSHOT_DETAILED, SNAPSHOT_SIMPLE};

/// Create the dashboard tables if they don't exist.
///
/// `processed_rows.import_id` is deliberately not a foreign key: the
/// owning-import link is a weak reference that restore and fallback-mode
/// writes may leave dangling. Archived rows always get their archived
/// import in the same transaction, so that side keeps a real constraint.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS data_imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_name TEXT NOT NULL,
            import_date TEXT NOT NULL,
            data_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processed_rows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            import_id INTEGER,
            file_name TEXT NOT NULL,
            import_date TEXT NOT NULL,
            category TEXT NOT NULL,
            technology TEXT NOT NULL,
            sheet TEXT,
            raw_data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS archived_imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            original_import_id INTEGER,
            file_name TEXT NOT NULL,
            import_date TEXT NOT NULL,
            data_type TEXT NOT NULL,
            status TEXT NOT NULL,
            archived_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS archived_rows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            archived_import_id INTEGER NOT NULL
                REFERENCES archived_imports(id) ON DELETE CASCADE,
            original_row_id INTEGER NOT NULL,
            original_import_id INTEGER,
            file_name TEXT NOT NULL,
            import_date TEXT NOT NULL,
            category TEXT NOT NULL,
            technology TEXT NOT NULL,
            sheet TEXT,
            raw_data TEXT NOT NULL,
            archived_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chart_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chart_type TEXT NOT NULL,
            data_values TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_processed_rows_import ON processed_rows(import_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_processed_rows_category ON processed_rows(category)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_archived_rows_import ON archived_rows(archived_import_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("database schema initialized");
    Ok(())
}

/// Health probe used at startup and by the periodic re-probe task.
pub async fn probe(pool: &SqlitePool) -> Result<()> {
    sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

pub async fn create_import(
    pool: &SqlitePool,
    file_name: &str,
    import_date: DateTime<Utc>,
    data_type: &str,
) -> Result<ImportRecord> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO data_imports (file_name, import_date, data_type, status)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(file_name)
    .bind(import_date.to_rfc3339())
    .bind(data_type)
    .bind(ImportStatus::Pending.as_str())
    .fetch_one(pool)
    .await?;

    Ok(ImportRecord {
        id,
        file_name: file_name.to_string(),
        import_date,
        data_type: data_type.to_string(),
        status: ImportStatus::Pending,
    })
}

pub async fn set_import_status(
    pool: &SqlitePool,
    import_id: i64,
    status: ImportStatus,
) -> Result<()> {
    sqlx::query("UPDATE data_imports SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(import_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Insert a batch of classified rows. Chunked into multi-row INSERTs to
/// stay under the bind-parameter limit, but all chunks commit together.
pub async fn bulk_insert_rows(pool: &SqlitePool, import_id: i64, rows: &[NewRow]) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for chunk in rows.chunks(BULK_CHUNK) {
        let mut prepared = Vec::with_capacity(chunk.len());
        for row in chunk {
            let raw = serialize_raw(&row.raw)?;
            prepared.push((row, raw, row.import_date.to_rfc3339()));
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO processed_rows \
             (import_id, file_name, import_date, category, technology, sheet, raw_data) ",
        );
        builder.push_values(prepared.iter(), |mut b, (row, raw, date)| {
            b.push_bind(import_id)
                .push_bind(&row.file_name)
                .push_bind(date)
                .push_bind(row.category.as_str())
                .push_bind(row.technology.as_str())
                .push_bind(&row.sheet)
                .push_bind(raw);
        });
        builder.build().execute(&mut *tx).await?;
    }
    tx.commit().await?;

    Ok(rows.len() as u64)
}

pub async fn list_imports(pool: &SqlitePool, limit: i64) -> Result<Vec<ImportRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, file_name, import_date, data_type, status
        FROM data_imports
        ORDER BY import_date DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_import).collect()
}

pub async fn count_imports(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM data_imports")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Paginated, filtered row query. Ordering is most-recent-import-first,
/// tie-broken by row id descending.
pub async fn query_rows(pool: &SqlitePool, query: &RowQuery) -> Result<RowPage> {
    let mut conditions: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if let Some(category) = query.category {
        conditions.push("category = ?".to_string());
        binds.push(category.as_str().to_string());
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push(
            "(LOWER(file_name) LIKE ? OR category LIKE ? OR technology LIKE ? \
             OR LOWER(raw_data) LIKE ?)"
                .to_string(),
        );
        let pattern = format!("%{}%", search.to_lowercase());
        binds.extend(std::iter::repeat(pattern).take(4));
    }
    if !query.technologies.is_empty() {
        conditions.push(format!(
            "technology IN ({})",
            placeholders(query.technologies.len())
        ));
        binds.extend(query.technologies.iter().map(|t| t.as_str().to_string()));
    }

    let where_sql = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM processed_rows{where_sql}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let total_rows = count_query.fetch_one(pool).await?;

    let page_sql = format!(
        "SELECT id, import_id, file_name, import_date, category, technology, sheet, raw_data \
         FROM processed_rows{where_sql} \
         ORDER BY import_date DESC, id DESC LIMIT ? OFFSET ?"
    );
    let mut page_query = sqlx::query(&page_sql);
    for bind in &binds {
        page_query = page_query.bind(bind);
    }
    let db_rows = page_query
        .bind(query.page_size)
        .bind(query.offset())
        .fetch_all(pool)
        .await?;

    let rows = db_rows
        .iter()
        .map(row_to_processed)
        .collect::<Result<Vec<_>>>()?;

    Ok(RowPage {
        rows,
        total_rows,
        page: query.page,
        page_size: query.page_size,
        total_pages: RowPage::total_pages_for(total_rows, query.page_size),
    })
}

/// The delete-to-archive transaction (all six steps commit together):
/// look up imports, collect their rows by owning id plus the
/// (file name, import timestamp) reconciliation pass, create archived
/// imports, re-parent the rows into the archive, delete the originals, and
/// refresh the breakdown snapshot.
pub async fn delete_imports(pool: &SqlitePool, ids: &[i64]) -> Result<i64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;

    // Step 1: target imports. Unknown ids are no-ops.
    let sql = format!(
        "SELECT id, file_name, import_date, data_type, status \
         FROM data_imports WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut q = sqlx::query(&sql);
    for id in ids {
        q = q.bind(id);
    }
    let imports = q
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(row_to_import)
        .collect::<Result<Vec<_>>>()?;

    if imports.is_empty() {
        tx.commit().await?;
        return Ok(0);
    }

    // Step 2: owned rows by id, plus the fallback pass by
    // (file_name, import_date) for rows whose owning link was never set.
    // A single SELECT deduplicates rows matched by both paths.
    let mut condition = format!("import_id IN ({})", placeholders(imports.len()));
    for _ in &imports {
        condition.push_str(" OR (file_name = ? AND import_date = ?)");
    }
    let sql = format!(
        "SELECT id, import_id, file_name, import_date, category, technology, sheet, raw_data \
         FROM processed_rows WHERE {condition}"
    );
    let mut q = sqlx::query(&sql);
    for import in &imports {
        q = q.bind(import.id);
    }
    for import in &imports {
        q = q.bind(&import.file_name).bind(import.import_date.to_rfc3339());
    }
    let rows = q
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(row_to_processed)
        .collect::<Result<Vec<_>>>()?;

    // Step 3: one archived import per source import.
    let archived_at = Utc::now().to_rfc3339();
    let mut archive_by_id: HashMap<i64, i64> = HashMap::new();
    let mut archive_by_key: HashMap<(String, String), i64> = HashMap::new();
    for import in &imports {
        let archived_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO archived_imports
                (original_import_id, file_name, import_date, data_type, status, archived_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(import.id)
        .bind(&import.file_name)
        .bind(import.import_date.to_rfc3339())
        .bind(&import.data_type)
        .bind(import.status.as_str())
        .bind(&archived_at)
        .fetch_one(&mut *tx)
        .await?;

        archive_by_id.insert(import.id, archived_id);
        archive_by_key.insert(
            (import.file_name.clone(), import.import_date.to_rfc3339()),
            archived_id,
        );
    }

    // Step 4: re-parent every matched row, resolving through the same
    // id-or-key used in step 2.
    for row in &rows {
        let archived_import_id = row
            .import_id
            .and_then(|import_id| archive_by_id.get(&import_id).copied())
            .or_else(|| {
                archive_by_key
                    .get(&(row.file_name.clone(), row.import_date.to_rfc3339()))
                    .copied()
            })
            .ok_or_else(|| {
                Error::Internal(format!("no archived import resolved for row {}", row.id))
            })?;

        sqlx::query(
            r#"
            INSERT INTO archived_rows
                (archived_import_id, original_row_id, original_import_id, file_name,
                 import_date, category, technology, sheet, raw_data, archived_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(archived_import_id)
        .bind(row.id)
        .bind(row.import_id)
        .bind(&row.file_name)
        .bind(row.import_date.to_rfc3339())
        .bind(row.category.as_str())
        .bind(row.technology.as_str())
        .bind(&row.sheet)
        .bind(serialize_raw(&row.data)?)
        .bind(&archived_at)
        .execute(&mut *tx)
        .await?;
    }

    // Step 5: remove the originals.
    if !rows.is_empty() {
        let sql = format!(
            "DELETE FROM processed_rows WHERE id IN ({})",
            placeholders(rows.len())
        );
        let mut q = sqlx::query(&sql);
        for row in &rows {
            q = q.bind(row.id);
        }
        q.execute(&mut *tx).await?;
    }
    let sql = format!(
        "DELETE FROM data_imports WHERE id IN ({})",
        placeholders(imports.len())
    );
    let mut q = sqlx::query(&sql);
    for import in &imports {
        q = q.bind(import.id);
    }
    q.execute(&mut *tx).await?;

    // Step 6: breakdown recomputed from the now-smaller active set.
    save_breakdown_tx(&mut tx).await?;

    tx.commit().await?;
    Ok(imports.len() as i64)
}

pub async fn list_archived(pool: &SqlitePool, limit: i64) -> Result<Vec<ArchivedRow>> {
    let rows = sqlx::query(
        r#"
        SELECT id, archived_import_id, original_row_id, original_import_id, file_name,
               import_date, category, technology, sheet, raw_data, archived_at
        FROM archived_rows
        ORDER BY archived_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_archived).collect()
}

/// Restore archived rows to active storage under their original owning
/// import id, dropping consumed archived rows and any archived import left
/// without rows. One transaction, breakdown refreshed inside it.
pub async fn restore_rows(pool: &SqlitePool, archive_row_ids: &[i64]) -> Result<i64> {
    if archive_row_ids.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;

    let sql = format!(
        "SELECT id, archived_import_id, original_row_id, original_import_id, file_name, \
                import_date, category, technology, sheet, raw_data, archived_at \
         FROM archived_rows WHERE id IN ({})",
        placeholders(archive_row_ids.len())
    );
    let mut q = sqlx::query(&sql);
    for id in archive_row_ids {
        q = q.bind(id);
    }
    let archived = q
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(row_to_archived)
        .collect::<Result<Vec<_>>>()?;

    if archived.is_empty() {
        tx.commit().await?;
        return Ok(0);
    }

    for row in &archived {
        sqlx::query(
            r#"
            INSERT INTO processed_rows
                (import_id, file_name, import_date, category, technology, sheet, raw_data)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.original_import_id)
        .bind(&row.file_name)
        .bind(row.import_date.to_rfc3339())
        .bind(row.category.as_str())
        .bind(row.technology.as_str())
        .bind(&row.sheet)
        .bind(serialize_raw(&row.data)?)
        .execute(&mut *tx)
        .await?;
    }

    let sql = format!(
        "DELETE FROM archived_rows WHERE id IN ({})",
        placeholders(archived.len())
    );
    let mut q = sqlx::query(&sql);
    for row in &archived {
        q = q.bind(row.id);
    }
    q.execute(&mut *tx).await?;

    delete_childless_archived_imports(
        &mut tx,
        &archived.iter().map(|r| r.archived_import_id).collect::<HashSet<_>>(),
    )
    .await?;

    save_breakdown_tx(&mut tx).await?;

    tx.commit().await?;
    Ok(archived.len() as i64)
}

/// Permanently discard archived rows. Touches no active data and not the
/// breakdown; ids already gone count as zero.
pub async fn purge_archived(pool: &SqlitePool, archive_row_ids: &[i64]) -> Result<i64> {
    if archive_row_ids.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;

    let sql = format!(
        "SELECT id, archived_import_id FROM archived_rows WHERE id IN ({})",
        placeholders(archive_row_ids.len())
    );
    let mut q = sqlx::query(&sql);
    for id in archive_row_ids {
        q = q.bind(id);
    }
    let matched: Vec<(i64, i64)> = q
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| (row.get::<i64, _>("id"), row.get::<i64, _>("archived_import_id")))
        .collect();

    if matched.is_empty() {
        tx.commit().await?;
        return Ok(0);
    }

    let sql = format!(
        "DELETE FROM archived_rows WHERE id IN ({})",
        placeholders(matched.len())
    );
    let mut q = sqlx::query(&sql);
    for (id, _) in &matched {
        q = q.bind(id);
    }
    q.execute(&mut *tx).await?;

    delete_childless_archived_imports(
        &mut tx,
        &matched.iter().map(|(_, parent)| *parent).collect::<HashSet<_>>(),
    )
    .await?;

    tx.commit().await?;
    Ok(matched.len() as i64)
}

/// Drop archived imports from `parents` that no longer own any row.
async fn delete_childless_archived_imports(
    tx: &mut Transaction<'_, Sqlite>,
    parents: &HashSet<i64>,
) -> Result<()> {
    if parents.is_empty() {
        return Ok(());
    }
    let sql = format!(
        "DELETE FROM archived_imports \
         WHERE id IN ({}) \
           AND NOT EXISTS (SELECT 1 FROM archived_rows WHERE archived_import_id = archived_imports.id)",
        placeholders(parents.len())
    );
    let mut q = sqlx::query(&sql);
    for parent in parents {
        q = q.bind(parent);
    }
    q.execute(&mut **tx).await?;
    Ok(())
}

/// Recompute the breakdown from the active rows and cache both snapshot
/// shapes (standalone variant; delete/restore use the in-transaction one).
pub async fn refresh_breakdown(pool: &SqlitePool) -> Result<Breakdown> {
    let mut tx = pool.begin().await?;
    let breakdown = save_breakdown_tx(&mut tx).await?;
    tx.commit().await?;
    Ok(breakdown)
}

async fn save_breakdown_tx(tx: &mut Transaction<'_, Sqlite>) -> Result<Breakdown> {
    let pairs: Vec<(String, String)> =
        sqlx::query_as("SELECT category, technology FROM processed_rows")
            .fetch_all(&mut **tx)
            .await?;

    let tags = pairs
        .iter()
        .map(|(category, technology)| Ok((category.parse()?, technology.parse()?)))
        .collect::<Result<Vec<_>>>()?;
    let breakdown = Breakdown::compute(tags);

    let created_at = Utc::now().to_rfc3339();
    let detailed = serde_json::to_string(&breakdown)
        .map_err(|e| Error::Internal(format!("breakdown serialization failed: {e}")))?;
    let simple = breakdown.simple_counts().to_string();

    sqlx::query("INSERT INTO chart_data (chart_type, data_values, created_at) VALUES (?, ?, ?)")
        .bind(SNAPSHOT_SIMPLE)
        .bind(simple)
        .bind(&created_at)
        .execute(&mut **tx)
        .await?;
    sqlx::query("INSERT INTO chart_data (chart_type, data_values, created_at) VALUES (?, ?, ?)")
        .bind(SNAPSHOT_DETAILED)
        .bind(detailed)
        .bind(&created_at)
        .execute(&mut **tx)
        .await?;

    Ok(breakdown)
}

/// Latest cached breakdown: detailed snapshot preferred, legacy simple
/// counts kept readable for old cached data.
pub async fn latest_breakdown(pool: &SqlitePool) -> Result<Option<Value>> {
    for chart_type in [SNAPSHOT_DETAILED, SNAPSHOT_SIMPLE] {
        let snapshot: Option<String> = sqlx::query_scalar(
            "SELECT data_values FROM chart_data WHERE chart_type = ? \
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(chart_type)
        .fetch_optional(pool)
        .await?;

        if let Some(text) = snapshot {
            let value = serde_json::from_str(&text)
                .map_err(|e| Error::Internal(format!("corrupt breakdown snapshot: {e}")))?;
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Wipe the chart cache and active data. Archive tables stay.
pub async fn clear_all(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM chart_data").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM processed_rows").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM data_imports").execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(())
}

// ----------------------------------------------------------------------
// Row mapping helpers
// ----------------------------------------------------------------------

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn serialize_raw(raw: &Map<String, Value>) -> Result<String> {
    serde_json::to_string(raw)
        .map_err(|e| Error::Internal(format!("raw payload serialization failed: {e}")))
}

fn parse_raw(text: &str) -> Result<Map<String, Value>> {
    serde_json::from_str(text)
        .map_err(|e| Error::Internal(format!("corrupt raw payload: {e}")))
}

fn parse_datetime(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("corrupt timestamp '{text}': {e}")))
}

fn row_to_import(row: &SqliteRow) -> Result<ImportRecord> {
    Ok(ImportRecord {
        id: row.get("id"),
        file_name: row.get("file_name"),
        import_date: parse_datetime(&row.get::<String, _>("import_date"))?,
        data_type: row.get("data_type"),
        status: row.get::<String, _>("status").parse()?,
    })
}

fn row_to_processed(row: &SqliteRow) -> Result<ProcessedRow> {
    Ok(ProcessedRow {
        id: row.get("id"),
        import_id: row.get("import_id"),
        file_name: row.get("file_name"),
        import_date: parse_datetime(&row.get::<String, _>("import_date"))?,
        category: row.get::<String, _>("category").parse()?,
        technology: row.get::<String, _>("technology").parse()?,
        sheet: row.get("sheet"),
        data: parse_raw(&row.get::<String, _>("raw_data"))?,
    })
}

fn row_to_archived(row: &SqliteRow) -> Result<ArchivedRow> {
    Ok(ArchivedRow {
        id: row.get("id"),
        archived_import_id: row.get("archived_import_id"),
        original_row_id: row.get("original_row_id"),
        original_import_id: row.get("original_import_id"),
        file_name: row.get("file_name"),
        import_date: parse_datetime(&row.get::<String, _>("import_date"))?,
        category: row.get::<String, _>("category").parse()?,
        technology: row.get::<String, _>("technology").parse()?,
        sheet: row.get("sheet"),
        data: parse_raw(&row.get::<String, _>("raw_data"))?,
        archived_at: parse_datetime(&row.get::<String, _>("archived_at"))?,
    })
}
