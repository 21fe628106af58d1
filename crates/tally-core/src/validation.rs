//! # Validation Module
//!
//! Field-level validators shared by every write path.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP (axum)                                                  │
//! │  └── JSON shape (deserialisation into the input structs)               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE + input.rs                                       │
//! │  ├── Required / format / sign checks per field                         │
//! │  ├── Sanitisation of free text                                         │
//! │  └── Collected into a field → message map                              │
//! │           │    (runs before any entity state is read)                  │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── UNIQUE (code) constraints                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Numeric fields arrive as raw JSON values so that "not a number",
//! "not an integer" and "missing" can each be reported against the field
//! instead of failing the whole request body.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::ValidationError;
use crate::money::{Money, MoneyParseError};
use crate::MAX_INPUT_LENGTH;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d\s\-+()]{10,}$").expect("phone pattern compiles"));

// =============================================================================
// Text
// =============================================================================

/// Normalises free text: trims, drops `<` and `>`, caps the length.
///
/// ## Example
/// ```rust
/// use tally_core::validation::sanitize_input;
///
/// assert_eq!(sanitize_input("  <b>Bolts</b> "), "bBolts/b");
/// assert_eq!(sanitize_input(&"x".repeat(2000)).len(), 1000);
/// ```
pub fn sanitize_input(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .take(MAX_INPUT_LENGTH)
        .collect()
}

/// Sanitised text, or `None` when nothing is left.
pub fn sanitize_optional(input: Option<&str>) -> Option<String> {
    input.map(sanitize_input).filter(|s| !s.is_empty())
}

/// A required text field: present and non-blank after sanitising.
pub fn validate_required(field: &str, input: Option<&str>) -> ValidationResult<String> {
    sanitize_optional(input).ok_or_else(|| ValidationError::required(field))
}

/// Email format check (`local@domain.tld`, no whitespace).
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_email;
///
/// assert!(validate_email("ops@example.com").is_ok());
/// assert!(validate_email("ops@example").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::invalid_format("email", "invalid email format"))
    }
}

/// Phone format check: at least ten digits, spaces, dashes, plus signs or
/// parentheses.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::invalid_format("phone", "invalid phone number format"))
    }
}

// =============================================================================
// Numbers
// =============================================================================

/// `true` for an absent, `null` or empty-string JSON value.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Reads an integer from a JSON number or numeric string.
///
/// Floats with no fractional part (`5.0`) are accepted; `5.5` is not.
///
/// ## Example
/// ```rust
/// use serde_json::json;
/// use tally_core::validation::parse_integer;
///
/// assert_eq!(parse_integer("quantity", &json!(12)).unwrap(), 12);
/// assert_eq!(parse_integer("quantity", &json!("-7")).unwrap(), -7);
/// assert!(parse_integer("quantity", &json!(1.5)).is_err());
/// ```
pub fn parse_integer(field: &str, value: &Value) -> ValidationResult<i64> {
    let not_integer = || ValidationError::invalid_format(field, "must be an integer");

    match value {
        Value::Null => Err(ValidationError::required(field)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(f as i64),
                _ => Err(not_integer()),
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(ValidationError::required(field));
            }
            s.parse::<i64>().map_err(|_| not_integer())
        }
        _ => Err(not_integer()),
    }
}

/// Reads a monetary amount from a JSON number or decimal string.
pub fn parse_money(field: &str, value: &Value) -> ValidationResult<Money> {
    Money::from_json(value).map_err(|e| match e {
        MoneyParseError::Empty => ValidationError::required(field),
        MoneyParseError::NotANumber => ValidationError::invalid_format(field, "must be a number"),
        MoneyParseError::TooPrecise => {
            ValidationError::invalid_format(field, "at most two decimal places")
        }
        MoneyParseError::OutOfRange => ValidationError::invalid_format(field, "out of range"),
    })
}

/// A monetary amount that must be zero or more (costs, prices, limits).
pub fn parse_non_negative_money(field: &str, value: &Value) -> ValidationResult<Money> {
    let money = parse_money(field, value)?;
    if money.is_negative() {
        return Err(ValidationError::MustBeNonNegative {
            field: field.to_string(),
        });
    }
    Ok(money)
}

/// An integer that must be zero or more (critical levels, payment terms).
pub fn parse_non_negative_integer(field: &str, value: &Value) -> ValidationResult<i64> {
    let n = parse_integer(field, value)?;
    if n < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: field.to_string(),
        });
    }
    Ok(n)
}

/// Ledger quantity: required, integer, non-zero. Sign is kept as submitted.
pub fn parse_quantity(value: Option<&Value>) -> ValidationResult<i64> {
    let value = value.ok_or_else(|| ValidationError::required("quantity"))?;
    let quantity = parse_integer("quantity", value)?;
    if quantity == 0 {
        return Err(ValidationError::MustBeNonZero {
            field: "quantity".to_string(),
        });
    }
    Ok(quantity)
}

/// Ledger amount: required, numeric, strictly positive.
pub fn parse_amount(value: Option<&Value>) -> ValidationResult<Money> {
    let value = value.ok_or_else(|| ValidationError::required("amount"))?;
    let amount = parse_money("amount", value)?;
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(amount)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_input("  hello  "), "hello");
        assert_eq!(sanitize_input("<script>x</script>"), "scriptx/script");
        assert_eq!(sanitize_optional(Some("   ")), None);
        assert_eq!(sanitize_optional(Some(" <> ")), None);
        assert_eq!(sanitize_optional(None), None);
        assert_eq!(sanitize_input(&"é".repeat(1500)).chars().count(), 1000);
    }

    #[test]
    fn test_required() {
        assert_eq!(validate_required("name", Some(" Bolts ")).unwrap(), "Bolts");
        assert_eq!(
            validate_required("name", Some("  ")),
            Err(ValidationError::required("name"))
        );
        assert!(validate_required("name", None).is_err());
    }

    #[test]
    fn test_email() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("a b@c.d").is_err());
        assert!(validate_email("missing-at.com").is_err());
        assert!(validate_email("a@nodot").is_err());
    }

    #[test]
    fn test_phone() {
        assert!(validate_phone("+1 (555) 010-9999").is_ok());
        assert!(validate_phone("5550109999").is_ok());
        assert!(validate_phone("555-0109").is_err());
        assert!(validate_phone("call me maybe").is_err());
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("n", &json!(5.0)).unwrap(), 5);
        assert_eq!(parse_integer("n", &json!(" 42 ")).unwrap(), 42);
        assert_eq!(parse_integer("n", &json!(null)), Err(ValidationError::required("n")));
        assert_eq!(parse_integer("n", &json!("")), Err(ValidationError::required("n")));
        assert!(parse_integer("n", &json!("4.2")).is_err());
        assert!(parse_integer("n", &json!([1])).is_err());
    }

    #[test]
    fn test_quantity_and_amount() {
        assert_eq!(parse_quantity(Some(&json!(-3))).unwrap(), -3);
        assert_eq!(
            parse_quantity(Some(&json!(0))),
            Err(ValidationError::MustBeNonZero {
                field: "quantity".to_string()
            })
        );
        assert_eq!(parse_quantity(None), Err(ValidationError::required("quantity")));

        assert_eq!(parse_amount(Some(&json!("200.50"))).unwrap().cents(), 20050);
        assert!(parse_amount(Some(&json!(0))).is_err());
        assert!(parse_amount(Some(&json!(-5))).is_err());
        assert!(parse_amount(Some(&json!("ten"))).is_err());
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(parse_non_negative_money("unit_cost", &json!(0)).unwrap(), Money::zero());
        assert!(parse_non_negative_money("unit_cost", &json!(-0.01)).is_err());
        assert!(parse_non_negative_integer("critical_stock_level", &json!(-1)).is_err());
    }

    #[test]
    fn test_blank() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&json!(null))));
        assert!(is_blank(Some(&json!(" "))));
        assert!(!is_blank(Some(&json!(0))));
    }
}
