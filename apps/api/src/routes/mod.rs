//! Route tables, one module per resource.

pub mod auth;
pub mod customers;
pub mod products;
pub mod reports;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// `GET /health`, unauthenticated.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.services.db().health_check().await {
        (StatusCode::OK, Json(json!({"status": "ok"})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unavailable"})),
        )
    }
}
