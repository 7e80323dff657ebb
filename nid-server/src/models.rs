//! Entity records owned by the import and archive stores.
//!
//! The raw row payload is a `serde_json::Map` so the original column order
//! survives serialization (the workspace enables `preserve_order`). Nothing
//! outside the classifier and the API projection inspects it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use nid_common::{Category, ImportStatus, Technology};

/// The uniform row record produced by the decoder: column name to scalar
/// value, plus the source sheet for spreadsheet uploads.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    pub sheet: Option<String>,
    pub values: Map<String, Value>,
}

/// One file-upload event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub id: i64,
    pub file_name: String,
    pub import_date: DateTime<Utc>,
    pub data_type: String,
    pub status: ImportStatus,
}

/// A classified row awaiting insertion (no id assigned yet).
#[derive(Debug, Clone)]
pub struct NewRow {
    pub file_name: String,
    pub import_date: DateTime<Utc>,
    pub category: Category,
    pub technology: Technology,
    pub sheet: Option<String>,
    pub raw: Map<String, Value>,
}

/// One classified record belonging to an import.
///
/// `import_id` is a weak reference: rows persisted while the store was in
/// degraded mode (or restored from the archive) may carry an owning id that
/// no active import holds, or none at all.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRow {
    pub id: i64,
    pub import_id: Option<i64>,
    pub file_name: String,
    pub import_date: DateTime<Utc>,
    pub category: Category,
    pub technology: Technology,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub data: Map<String, Value>,
}

/// An import moved to the archive by a delete transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedImport {
    pub id: i64,
    pub original_import_id: Option<i64>,
    pub file_name: String,
    pub import_date: DateTime<Utc>,
    pub data_type: String,
    pub status: ImportStatus,
    pub archived_at: DateTime<Utc>,
}

/// A processed row re-parented to an archived import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedRow {
    pub id: i64,
    pub archived_import_id: i64,
    pub original_row_id: i64,
    pub original_import_id: Option<i64>,
    pub file_name: String,
    pub import_date: DateTime<Utc>,
    pub category: Category,
    pub technology: Technology,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub data: Map<String, Value>,
    pub archived_at: DateTime<Utc>,
}
