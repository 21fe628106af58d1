//! Business code generation for products (`PRD…`) and customers (`CUS…`).
//!
//! A generated code is the prefix, the last six digits of the millisecond
//! timestamp and a three-digit random suffix, e.g. `PRD482913057`.
//! Collisions are possible in principle; the UNIQUE index on `code` turns
//! one into a `DuplicateCode` error rather than a silent overwrite.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const PRODUCT_CODE_PREFIX: &str = "PRD";
pub const CUSTOMER_CODE_PREFIX: &str = "CUS";

/// Deterministic form of [`generate_code`].
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use tally_core::codes::code_at;
///
/// let at = Utc.timestamp_millis_opt(1_717_000_123_456).unwrap();
/// assert_eq!(code_at("PRD", at, 7), "PRD123456007");
/// ```
pub fn code_at(prefix: &str, at: DateTime<Utc>, nonce: u32) -> String {
    let millis = at.timestamp_millis().rem_euclid(1_000_000);
    format!("{prefix}{millis:06}{:03}", nonce % 1000)
}

/// A fresh code for `prefix` based on the current time.
pub fn generate_code(prefix: &str) -> String {
    let nonce = (Uuid::new_v4().as_u128() % 1000) as u32;
    code_at(prefix, Utc::now(), nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_code_shape() {
        let code = generate_code(CUSTOMER_CODE_PREFIX);
        assert!(code.starts_with("CUS"));
        assert_eq!(code.len(), 12);
        assert!(code[3..].bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn test_zero_padding() {
        let at = Utc.timestamp_millis_opt(1_000_000_000_042).unwrap();
        assert_eq!(code_at(PRODUCT_CODE_PREFIX, at, 5), "PRD000042005");
    }
}
