//! Errors returned by service operations.

use thiserror::Error;

use crate::error::DbError;
use crate::ledger::LedgerError;
use tally_core::{CoreError, ValidationError, ValidationErrors};

/// Every way a service operation can fail, as seen by callers.
///
/// ## Mapping to callers
/// ```text
/// Forbidden          → 403   role lacks the permission, or row not owned
/// Validation         → 400   field → message map
/// NotFound           → 404
/// InsufficientStock  → 409
/// DuplicateCode      → 409
/// Inactive           → 409   ledger operation on a soft-deleted entity
/// Database           → 500   logged, never shown to the client
/// ```
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Forbidden")]
    Forbidden,

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    #[error("{entity} code '{code}' already exists")]
    DuplicateCode { entity: &'static str, code: String },

    #[error("{entity} {id} is inactive")]
    Inactive { entity: &'static str, id: String },

    #[error(transparent)]
    Database(#[from] DbError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Single-field validation failure.
    pub fn invalid(error: ValidationError) -> Self {
        ServiceError::Validation(error.into())
    }

    /// Maps a unique violation on `column` to `DuplicateCode`, anything else
    /// to `Database`.
    pub(crate) fn from_insert(err: DbError, column: &str, entity: &'static str) -> Self {
        match err {
            DbError::UniqueViolation { field, value } if field == column => {
                ServiceError::DuplicateCode {
                    entity,
                    code: value,
                }
            }
            other => ServiceError::Database(other),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(error: ValidationError) -> Self {
        ServiceError::invalid(error)
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock {
                code,
                available,
                requested,
            } => ServiceError::InsufficientStock {
                code,
                available,
                requested,
            },
            CoreError::Overflow { field } => ServiceError::invalid(
                ValidationError::invalid_format(field, "value is out of range"),
            ),
            CoreError::Validation(e) => ServiceError::invalid(e),
            CoreError::Invalid(errors) => ServiceError::Validation(errors),
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            LedgerError::Inactive { entity, id } => ServiceError::Inactive { entity, id },
            LedgerError::NotOwner { .. } => ServiceError::Forbidden,
            LedgerError::Rule(e) => e.into(),
            LedgerError::Database(e) => ServiceError::Database(e),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
