//! Dashboard summary statistics.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use nid_common::StorageMode;

use crate::error::ApiError;
use crate::store::StoreProvider;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub files_uploaded: i64,
    pub entries_per_technology: Value,
    pub latest_breakdown: Value,
    pub storage_mode: StorageMode,
}

/// GET /stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    Ok(Json(collect_stats(&state.store).await?))
}

/// Assemble the summary. Technology counts come from the cached detailed
/// snapshot's overall totals; with no snapshot yet they are all zero.
pub async fn collect_stats(store: &StoreProvider) -> nid_common::Result<StatsResponse> {
    let files_uploaded = store.count_imports().await?;
    let latest_breakdown = store.latest_breakdown().await?.unwrap_or(Value::Null);

    let entries_per_technology = latest_breakdown
        .get("totals")
        .and_then(|totals| totals.get("tech"))
        .cloned()
        .unwrap_or_else(|| json!({ "2g": 0, "3g": 0, "lte": 0, "5g": 0, "other": 0 }));

    Ok(StatsResponse {
        files_uploaded,
        entries_per_technology,
        latest_breakdown,
        storage_mode: store.mode(),
    })
}
