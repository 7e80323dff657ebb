//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use nid_common::StorageMode;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub storage_mode: StorageMode,
}

/// GET /health
///
/// Reports liveness plus which storage backend the next operation would
/// use, so monitoring can see a degraded-to-memory server that is
/// otherwise answering normally.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "nid-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage_mode: state.store.mode(),
    })
}
