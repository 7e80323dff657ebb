//! Archive browsing, restore, and permanent delete.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::info;

use nid_common::StorageMode;

use crate::api::{parse_ids, IdListRequest};
use crate::error::ApiError;
use crate::models::ArchivedRow;
use crate::AppState;

const ARCHIVE_LIST_LIMIT: i64 = 1000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListArchivesResponse {
    pub archives: Vec<ArchivedRow>,
    pub storage_mode: StorageMode,
}

/// GET /api/archives
///
/// Up to 1000 most-recently-archived rows.
pub async fn list_archives(
    State(state): State<AppState>,
) -> Result<Json<ListArchivesResponse>, ApiError> {
    let archives = state.store.list_archived(ARCHIVE_LIST_LIMIT).await?;
    Ok(Json(ListArchivesResponse {
        archives,
        storage_mode: state.store.mode(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub message: String,
    pub restored_count: i64,
}

/// POST /api/archives/restore
///
/// Body `{ids: [...]}` of archived-row ids. Restored rows rejoin the
/// active set under their original import id.
pub async fn restore_archives(
    State(state): State<AppState>,
    Json(request): Json<IdListRequest>,
) -> Result<Json<RestoreResponse>, ApiError> {
    let ids = parse_ids(&request)?;
    let restored_count = state.store.restore(&ids).await?;
    info!(requested = ids.len(), restored_count, "archived rows restored");
    Ok(Json(RestoreResponse {
        message: format!("{restored_count} row(s) restored"),
        restored_count,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub message: String,
    pub deleted_count: i64,
}

/// DELETE /api/archives/delete
///
/// Body `{ids: [...]}`. Permanently discards archived rows; already-gone
/// ids count as zero, repeating the call is not an error.
pub async fn delete_archives(
    State(state): State<AppState>,
    Json(request): Json<IdListRequest>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let ids = parse_ids(&request)?;
    let deleted_count = state.store.permanently_delete(&ids).await?;
    info!(requested = ids.len(), deleted_count, "archived rows permanently deleted");
    Ok(Json(PurgeResponse {
        message: format!("{deleted_count} archived row(s) permanently deleted"),
        deleted_count,
    }))
}
