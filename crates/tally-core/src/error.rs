//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError         - Ledger rule violations                        │
//! │  ├── ValidationError   - A single field failed validation              │
//! │  └── ValidationErrors  - Field → message map returned to clients       │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  ├── DbError           - Database operation failures                   │
//! │  └── ServiceError      - What callers of the service layer see         │
//! │                                                                         │
//! │  tally-api errors (in app)                                             │
//! │  └── ApiError          - HTTP status + response envelope               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → ApiError → Client  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent ledger rule violations. They carry enough context for a
/// user-facing message and never wrap I/O failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stock_out would drive stock below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// stock_out (qty: 10)
    ///      │
    ///      ▼
    /// Check stock: available=5
    ///      │
    ///      ▼
    /// InsufficientStock { code: "PRD123456001", available: 5, requested: 10 }
    ///      │
    ///      ▼
    /// Nothing written, client sees 409
    /// ```
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// The new running value does not fit in the storage type.
    #[error("{field} would overflow")]
    Overflow { field: String },

    /// Single-field validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Multi-field validation error.
    #[error("Validation error: {0}")]
    Invalid(#[from] ValidationErrors),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Validation always runs before any entity state is read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or positive.
    #[error("{field} must be non-negative")]
    MustBeNonNegative { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// Invalid format (e.g., not an integer, malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {}", allowed.join(", "))]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// The field this error refers to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::MustBeNonNegative { field }
            | ValidationError::MustBeNonZero { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. } => field,
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Errors (field map)
// =============================================================================

/// Field-level validation error map.
///
/// Serialises as a plain JSON object (`{"email": "email has invalid format: ..."}`),
/// which is what the `errors` member of the response envelope carries.
/// The first error recorded for a field wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error against its field.
    pub fn add(&mut self, error: ValidationError) {
        self.0
            .entry(error.field().to_string())
            .or_insert_with(|| error.to_string());
    }

    /// Records the error of `result`, if any, and hands back the value.
    pub fn check<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.add(e);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(error);
        errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.values().map(String::as_str).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            code: "PRD000001".to_string(),
            available: 5,
            requested: 10,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for PRD000001: available 5, requested 10"
        );
    }

    #[test]
    fn test_not_allowed_lists_choices() {
        let err = ValidationError::NotAllowed {
            field: "transaction_type".to_string(),
            allowed: vec!["sale".to_string(), "payment".to_string()],
        };
        assert_eq!(err.to_string(), "transaction_type must be one of: sale, payment");
    }

    #[test]
    fn test_first_error_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.add(ValidationError::required("name"));
        errors.add(ValidationError::TooLong {
            field: "name".to_string(),
            max: 10,
        });
        errors.add(ValidationError::invalid_format("email", "not an email"));

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("name"), Some("name is required"));
        assert!(errors.clone().into_result().is_err());
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_errors_serialize_as_object() {
        let errors: ValidationErrors = ValidationError::required("unit").into();
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({ "unit": "unit is required" }));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("quantity").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
