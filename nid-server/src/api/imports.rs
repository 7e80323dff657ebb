//! Import listing and the delete-to-archive endpoint.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{parse_ids, IdListRequest};
use crate::error::ApiError;
use crate::models::ImportRecord;
use crate::AppState;

const DEFAULT_IMPORT_LIMIT: i64 = 20;
const MAX_IMPORT_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListImportsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListImportsResponse {
    pub imports: Vec<ImportRecord>,
}

/// GET /imports?limit=
///
/// Recent imports, most-recent-first. `limit` clamps to [1, 200],
/// default 20.
pub async fn list_imports(
    State(state): State<AppState>,
    Query(query): Query<ListImportsQuery>,
) -> Result<Json<ListImportsResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_IMPORT_LIMIT)
        .clamp(1, MAX_IMPORT_LIMIT);
    let imports = state.store.list_imports(limit).await?;
    Ok(Json(ListImportsResponse { imports }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImportsResponse {
    pub message: String,
    pub deleted_count: i64,
    /// Post-delete summary. Best-effort: a refresh failure leaves it null
    /// rather than failing the delete that already committed.
    pub stats: serde_json::Value,
}

/// DELETE /imports
///
/// Body `{ids: [...]}`. Moves the named imports and their rows to the
/// archive in one transaction; ids that match nothing are no-ops.
pub async fn delete_imports(
    State(state): State<AppState>,
    Json(request): Json<IdListRequest>,
) -> Result<Json<DeleteImportsResponse>, ApiError> {
    let ids = parse_ids(&request)?;
    let deleted_count = state.store.delete_imports(&ids).await?;
    info!(requested = ids.len(), deleted_count, "imports archived");

    let stats = match crate::api::stats::collect_stats(&state.store).await {
        Ok(stats) => serde_json::to_value(stats).unwrap_or(serde_json::Value::Null),
        Err(_) => serde_json::Value::Null,
    };

    Ok(Json(DeleteImportsResponse {
        message: format!("{deleted_count} import(s) moved to archive"),
        deleted_count,
        stats,
    }))
}
