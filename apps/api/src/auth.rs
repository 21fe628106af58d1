//! # Identity
//!
//! JWT issuance and validation, plus the middleware that turns a bearer
//! credential into a [`RequestContext`].
//!
//! ## Request Flow
//! ```text
//! Authorization: Bearer <jwt>  ──┐
//!        (or cookie token=<jwt>) ├──► validate ──► reload user ──► RequestContext
//! x-forwarded-for / x-real-ip  ──┘     (HS256)      (by id)        (extension)
//! ```
//! The user is re-read on every request, so a deleted user's token stops
//! working immediately even though it has not expired.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tally_core::{Role, User};
use tally_db::{RequestContext, ServiceError};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Cookie that may carry the token instead of the `Authorization` header.
pub const TOKEN_COOKIE: &str = "token";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub email: String,
    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID
    pub jti: String,
}

/// JWT token manager.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(secret: String, lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Issues a token for `user`.
    pub fn issue(&self, user: &User) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validates signature and expiry.
    pub fn validate(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthenticated("Invalid token".to_string()))
    }
}

// =============================================================================
// Header helpers
// =============================================================================

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Token from the `Authorization` header, else from the `token` cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token);
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(TOKEN_COOKIE)?.strip_prefix('='))
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// First `x-forwarded-for` entry, then `x-real-ip`, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    let real = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    };

    forwarded
        .or_else(real)
        .unwrap_or("unknown")
        .to_string()
}

// =============================================================================
// Middleware
// =============================================================================

/// Rejects the request with 401 unless it carries a valid token for an
/// existing user; otherwise inserts the caller's [`RequestContext`].
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = token_from_headers(req.headers())
        .ok_or_else(|| ApiError::Unauthenticated("No token provided".to_string()))?;

    let claims = state.jwt.validate(&token)?;

    let user = state
        .services
        .db()
        .users()
        .get_by_id(&claims.sub)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| ApiError::Unauthenticated("User not found".to_string()))?;

    let ctx = RequestContext::new(user, client_ip(req.headers()));
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}
