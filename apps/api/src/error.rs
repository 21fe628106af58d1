//! Error and response envelope types for the API.
//!
//! Every response body has the same shape:
//! ```json
//! { "success": true,  "data": { ... }, "message": "optional" }
//! { "success": false, "error": "Validation failed", "errors": { "name": "name is required" } }
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tally_core::ValidationErrors;
use tally_db::ServiceError;
use tracing::{error, warn};

// =============================================================================
// Envelope
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            errors: None,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Service(e) => match e {
                ServiceError::Forbidden => StatusCode::FORBIDDEN,
                ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
                ServiceError::InsufficientStock { .. }
                | ServiceError::DuplicateCode { .. }
                | ServiceError::Inactive { .. } => StatusCode::CONFLICT,
                ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Client-facing message. Internal details stay in the server log.
    fn public_message(&self) -> String {
        match self {
            ApiError::Unauthenticated(msg) | ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::Service(e) => match e {
                ServiceError::Forbidden => "Insufficient permissions".to_string(),
                ServiceError::Validation(_) => "Validation failed".to_string(),
                ServiceError::NotFound { entity, .. } => format!("{} not found", entity),
                ServiceError::Database(_) => "Internal server error".to_string(),
                other => other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else if status == StatusCode::UNAUTHORIZED {
            warn!(reason = %self, "Unauthenticated request");
        }

        let errors = match &self {
            ApiError::Service(ServiceError::Validation(errors)) => Some(errors.clone()),
            _ => None,
        };

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.public_message()),
            errors,
            message: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::ValidationError;
    use tally_db::DbError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::Unauthenticated("no token".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden.into(), StatusCode::FORBIDDEN),
            (
                ServiceError::invalid(ValidationError::Required {
                    field: "name".into(),
                })
                .into(),
                StatusCode::BAD_REQUEST,
            ),
            (ServiceError::not_found("Product", "p1").into(), StatusCode::NOT_FOUND),
            (
                ServiceError::InsufficientStock {
                    code: "PRD1".into(),
                    available: 5,
                    requested: 10,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::DuplicateCode {
                    entity: "Product",
                    code: "PRD1".into(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::Inactive {
                    entity: "Customer",
                    id: "c1".into(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::Database(DbError::Internal("disk".into())).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn test_internal_details_hidden() {
        let err: ApiError = ServiceError::Database(DbError::Internal("disk on fire".into())).into();
        assert_eq!(err.public_message(), "Internal server error");

        let err: ApiError = ServiceError::not_found("Customer", "c-123").into();
        assert_eq!(err.public_message(), "Customer not found");
    }

    #[test]
    fn test_envelope_skips_empty_members() {
        let body = serde_json::to_value(ApiResponse::ok(42).with_message("done")).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "data": 42, "message": "done"}));
    }
}
