//! Paginated, filtered row views per category.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use nid_common::{Category, Technology};

use crate::error::ApiError;
use crate::store::{RowPage, RowQuery, DEFAULT_PAGE_SIZE};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
    /// Comma-separated technology tags; unknown tags are ignored.
    pub tech: Option<String>,
}

/// GET /api/uploads/:category
///
/// `category` is one of the three category tags, or `all`/`total` for an
/// unfiltered view. Pages beyond the last return an empty row list with
/// `totalPages` still computed from `totalRows`.
pub async fn get_rows(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<RowsQuery>,
) -> Result<Json<RowPage>, ApiError> {
    let category = match category.to_lowercase().as_str() {
        "all" | "total" => None,
        other => Some(
            other
                .parse::<Category>()
                .map_err(|_| ApiError::bad_request(format!("Invalid category: {other}")))?,
        ),
    };

    let technologies: Vec<Technology> = params
        .tech
        .as_deref()
        .unwrap_or("")
        .split(',')
        .filter_map(|tag| tag.trim().to_lowercase().parse().ok())
        .collect();

    let query = RowQuery {
        category,
        page: params.page.unwrap_or(1),
        page_size: params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        search: params.search,
        technologies,
    }
    .clamped();

    let page = state.store.query_rows(&query).await?;
    Ok(Json(page))
}
