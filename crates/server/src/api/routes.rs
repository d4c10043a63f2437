use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers;
use crate::state::AppState;

/// Coordinator API routes served next to the RPC endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
}
