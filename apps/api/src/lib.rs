//! # Tally API
//!
//! HTTP surface for the back office.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally API Routes                               │
//! │                                                                         │
//! │  public          GET  /health            POST /api/auth/login           │
//! │                                                                         │
//! │  ┌──────────────────────── require_auth ─────────────────────────────┐ │
//! │  │                                                                    │ │
//! │  │  /api/products            GET POST                                 │ │
//! │  │  /api/products/low-stock  GET                                      │ │
//! │  │  /api/products/{id}       GET PUT DELETE                           │ │
//! │  │  /api/products/{id}/stock POST         (ledger mutation)           │ │
//! │  │  /api/products/{id}/transactions  GET                              │ │
//! │  │                                                                    │ │
//! │  │  /api/customers           GET POST                                 │ │
//! │  │  /api/customers/at-risk   GET                                      │ │
//! │  │  /api/customers/{id}      GET PUT DELETE                           │ │
//! │  │  /api/customers/{id}/transactions GET POST (ledger mutation)       │ │
//! │  │                                                                    │ │
//! │  │  /api/reports/inventory  /api/reports/customers                    │ │
//! │  │  /api/dashboard/metrics  /api/audit-logs  /api/auth/me             │ │
//! │  └────────────────────────────────────────────────────────────────────┘ │
//! │                                │                                        │
//! │                                ▼                                        │
//! │                    tally_db::Services (permission → ledger → audit)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config::ApiConfig`] for every key and its `TALLY_*` variable.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

// Re-exports
pub use config::ApiConfig;
pub use error::{ApiError, ApiResponse, ApiResult};
pub use state::AppState;

/// Builds the full router over `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .merge(routes::products::router())
        .merge(routes::customers::router())
        .merge(routes::reports::router())
        .route("/api/auth/me", get(routes::auth::me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/auth/login", post(routes::auth::login))
        .merge(protected)
        .with_state(state)
}

// =============================================================================
// Unit Tests
// =============================================================================
