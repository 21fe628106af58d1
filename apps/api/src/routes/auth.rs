//! `/api/auth`: login and the current user.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse};
use axum::Extension;
use serde::{Deserialize, Serialize};
use tally_core::User;
use tally_db::{RequestContext, ServiceError};
use tracing::{info, warn};

use crate::auth::TOKEN_COOKIE;
use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::extract::ApiJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// `POST /api/auth/login`
///
/// Issues a token in the body and as an HTTP-only cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .services
        .db()
        .users()
        .verify_credentials(&request.email, &request.password)
        .await
        .map_err(ServiceError::from)?;

    let Some(user) = user else {
        warn!(email = %request.email, "Login failed");
        return Err(ApiError::Unauthenticated(
            "Invalid email or password".to_string(),
        ));
    };

    let token = state.jwt.issue(&user)?;
    info!(user_id = %user.id, role = %user.role, "User logged in");

    let cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        TOKEN_COOKIE,
        token,
        state.jwt.lifetime_secs()
    );

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        ApiResponse::ok(LoginResponse { token, user }).with_message("Login successful"),
    ))
}

/// `GET /api/auth/me`
pub async fn me(Extension(ctx): Extension<RequestContext>) -> ApiResponse<User> {
    ApiResponse::ok(ctx.user)
}
