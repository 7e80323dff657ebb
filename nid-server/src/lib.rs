//! nid-server: network inventory dashboard backend.
//!
//! Upload pipeline (decode, classify, persist, aggregate) plus the
//! dual-backend import/archive store and the HTTP API over it.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod breakdown;
pub mod classify;
pub mod decode;
pub mod error;
pub mod models;
pub mod store;

use store::StoreProvider;

/// Uploads above this size are rejected before decoding.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Application state shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: StoreProvider,
}

impl AppState {
    pub fn new(store: StoreProvider) -> Self {
        Self { store }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health::health_check))
        .route("/upload", post(api::upload::upload_file))
        .route("/chart-data", get(api::chart::get_chart_data))
        .route("/clear-data", post(api::chart::clear_data))
        .route("/stats", get(api::stats::get_stats))
        .route(
            "/imports",
            get(api::imports::list_imports).delete(api::imports::delete_imports),
        )
        .route("/api/uploads/:category", get(api::rows::get_rows))
        .route("/api/archives", get(api::archives::list_archives))
        .route("/api/archives/restore", post(api::archives::restore_archives))
        .route("/api/archives/delete", delete(api::archives::delete_archives))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
