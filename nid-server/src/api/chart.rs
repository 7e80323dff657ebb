//! Breakdown snapshot read and the administrative wipe.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::AppState;

/// GET /chart-data
///
/// Latest cached breakdown snapshot. Detailed form preferred; legacy
/// simple-counts snapshots from old data still resolve. With nothing
/// uploaded yet the zeroed simple-counts shape is returned.
pub async fn get_chart_data(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.store.latest_breakdown().await?;
    Ok(Json(snapshot.unwrap_or_else(|| {
        json!({ "transport": 0, "wireless": 0, "wireline": 0 })
    })))
}

/// POST /clear-data
///
/// Wipes the chart cache, imports, and active rows. Archived data is kept.
pub async fn clear_data(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.store.clear_all().await?;
    info!("active data and chart cache cleared");
    Ok(Json(json!({ "message": "All data cleared" })))
}
