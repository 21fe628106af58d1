//! # Repository Module
//!
//! SQL access for every table, one repository per aggregate.
//!
//! ## Read/Write Split
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Writes What                                      │
//! │                                                                         │
//! │  Service layer                                                         │
//! │       │                                                                 │
//! │       ├── descriptive fields ──► ProductRepository / CustomerRepository │
//! │       │                          insert, update, soft_delete            │
//! │       │                                                                 │
//! │       ├── running values ──────► LedgerEngine (ledger.rs)              │
//! │       │                          current_stock, current_balance_cents   │
//! │       │                          + one *_transactions row, atomically   │
//! │       │                                                                 │
//! │       └── audit rows ──────────► AuditRecorder (audit.rs)              │
//! │                                  → AuditLogRepository::insert           │
//! │                                                                         │
//! │  Repositories never touch current_stock or current_balance_cents       │
//! │  except through the ledger helpers that take an open transaction.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UserRepository`](user::UserRepository) - Users and credentials
//! - [`ProductRepository`](product::ProductRepository) - Products, low stock, search
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers, at-risk, scoping
//! - [`InventoryTransactionRepository`](inventory_tx::InventoryTransactionRepository) - Stock history
//! - [`CustomerTransactionRepository`](customer_tx::CustomerTransactionRepository) - Balance history
//! - [`AuditLogRepository`](audit::AuditLogRepository) - Append-only audit log

use serde::Deserialize;
use tally_core::EntityStatus;

pub mod audit;
pub mod customer;
pub mod customer_tx;
pub mod inventory_tx;
pub mod product;
pub mod user;

// =============================================================================
// List Filters
// =============================================================================

/// Filters for [`product::ProductRepository::list`]. `None` means "any".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Substring match over name, code and brand.
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<EntityStatus>,
}

/// Filters for [`customer::CustomerRepository::list`]. `None` means "any".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    /// Substring match over name, code and email.
    pub search: Option<String>,
    pub status: Option<EntityStatus>,

    /// Restricts rows to one owning rep. Set from the caller's identity,
    /// never from request input.
    #[serde(skip)]
    pub sales_rep: Option<String>,
}

/// Builds a `LIKE` pattern for a free-text search, or `None` when blank.
///
/// `%`, `_` and `\` in the input are escaped; queries use `ESCAPE '\'`.
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    let term = search?.trim();
    if term.is_empty() {
        return None;
    }

    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern(None), None);
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(Some(" bolt ")), Some("%bolt%".to_string()));
        assert_eq!(like_pattern(Some("50%_off")), Some("%50\\%\\_off%".to_string()));
    }
}
