//! # Ledger Direction Tables
//!
//! The entire business logic of both ledgers: how a submitted magnitude
//! moves a running value.
//!
//! ## Direction Tables
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Inventory (per product)          │  Receivables (per customer)        │
//! │  ──────────────────────────────   │  ───────────────────────────────   │
//! │  stock_in    stock + |q|          │  sale         balance + amount     │
//! │  stock_out   stock - |q|  (≥ 0!)  │  payment      balance - amount     │
//! │  adjustment  |q| (replaces)       │  credit_note  balance - amount     │
//! │                                   │  (balance may go negative)         │
//! │  q ≠ 0, sign ignored              │  amount > 0                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both start at zero. Replaying an entity's transactions in creation order
//! through these functions must reproduce the stored running value; the
//! `replay_*` helpers exist to check exactly that.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CustomerTransactionType, InventoryTransactionType};

// =============================================================================
// Inventory
// =============================================================================

/// Computes the stock level after applying one inventory transaction.
///
/// ## Errors
/// - `quantity == 0` → [`ValidationError::MustBeNonZero`]
/// - stock_out below zero → [`CoreError::InsufficientStock`]
///
/// ## Example
/// ```rust
/// use tally_core::ledger::next_stock;
/// use tally_core::InventoryTransactionType::*;
///
/// assert_eq!(next_stock("PRD1", 0, StockIn, 100).unwrap(), 100);
/// assert_eq!(next_stock("PRD1", 100, StockOut, -30).unwrap(), 70);
/// assert_eq!(next_stock("PRD1", 70, Adjustment, 10).unwrap(), 10);
/// assert!(next_stock("PRD1", 5, StockOut, 10).is_err());
/// ```
pub fn next_stock(
    product_code: &str,
    current: i64,
    kind: InventoryTransactionType,
    quantity: i64,
) -> CoreResult<i64> {
    if quantity == 0 {
        return Err(ValidationError::MustBeNonZero {
            field: "quantity".to_string(),
        }
        .into());
    }

    let magnitude = quantity.checked_abs().ok_or_else(|| overflow("quantity"))?;

    match kind {
        InventoryTransactionType::StockIn => current
            .checked_add(magnitude)
            .ok_or_else(|| overflow("current_stock")),
        InventoryTransactionType::StockOut => {
            if magnitude > current {
                return Err(CoreError::InsufficientStock {
                    code: product_code.to_string(),
                    available: current,
                    requested: magnitude,
                });
            }
            Ok(current - magnitude)
        }
        InventoryTransactionType::Adjustment => Ok(magnitude),
    }
}

/// Replays `(type, quantity)` pairs from zero.
///
/// Fails on the first transaction the direction table would have rejected,
/// which for a consistent history never happens.
pub fn replay_stock<I>(product_code: &str, transactions: I) -> CoreResult<i64>
where
    I: IntoIterator<Item = (InventoryTransactionType, i64)>,
{
    transactions
        .into_iter()
        .try_fold(0, |stock, (kind, qty)| next_stock(product_code, stock, kind, qty))
}

// =============================================================================
// Receivables
// =============================================================================

/// Computes the customer balance after applying one customer transaction.
///
/// ## Errors
/// - `amount <= 0` → [`ValidationError::MustBePositive`]
///
/// ## Example
/// ```rust
/// use tally_core::ledger::next_balance;
/// use tally_core::money::Money;
/// use tally_core::CustomerTransactionType::*;
///
/// let b = next_balance(Money::zero(), Sale, Money::from_cents(20000)).unwrap();
/// let b = next_balance(b, Payment, Money::from_cents(50000)).unwrap();
/// assert_eq!(b.cents(), -30000); // customer in credit
/// ```
pub fn next_balance(
    current: Money,
    kind: CustomerTransactionType,
    amount: Money,
) -> CoreResult<Money> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into());
    }

    let next = match kind {
        CustomerTransactionType::Sale => current.checked_add(amount),
        CustomerTransactionType::Payment | CustomerTransactionType::CreditNote => {
            current.checked_sub(amount)
        }
    };

    next.ok_or_else(|| overflow("current_balance"))
}

/// Replays `(type, amount)` pairs from zero.
pub fn replay_balance<I>(transactions: I) -> CoreResult<Money>
where
    I: IntoIterator<Item = (CustomerTransactionType, Money)>,
{
    transactions
        .into_iter()
        .try_fold(Money::zero(), |balance, (kind, amount)| {
            next_balance(balance, kind, amount)
        })
}

fn overflow(field: &str) -> CoreError {
    CoreError::Overflow {
        field: field.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use CustomerTransactionType::*;
    use InventoryTransactionType::*;

    #[test]
    fn test_inventory_replay_sequence() {
        let stock = next_stock("P", 0, StockIn, 100).unwrap();
        assert_eq!(stock, 100);
        let stock = next_stock("P", stock, StockOut, 30).unwrap();
        assert_eq!(stock, 70);
        let stock = next_stock("P", stock, Adjustment, 10).unwrap();
        assert_eq!(stock, 10);
    }

    #[test]
    fn test_quantity_sign_is_ignored() {
        assert_eq!(next_stock("P", 10, StockIn, -5).unwrap(), 15);
        assert_eq!(next_stock("P", 10, StockOut, -5).unwrap(), 5);
        assert_eq!(next_stock("P", 10, Adjustment, -3).unwrap(), 3);
    }

    #[test]
    fn test_stock_out_cannot_go_negative() {
        let err = next_stock("PRD9", 5, StockOut, 10).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                code,
                available,
                requested,
            } => {
                assert_eq!(code, "PRD9");
                assert_eq!(available, 5);
                assert_eq!(requested, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Draining to exactly zero is fine.
        assert_eq!(next_stock("P", 5, StockOut, 5).unwrap(), 0);
    }

    #[test]
    fn test_zero_quantity_rejected() {
        for kind in InventoryTransactionType::ALL {
            let err = next_stock("P", 10, *kind, 0).unwrap_err();
            assert!(matches!(
                err,
                CoreError::Validation(ValidationError::MustBeNonZero { .. })
            ));
        }
    }

    #[test]
    fn test_stock_overflow_is_an_error() {
        assert!(matches!(
            next_stock("P", i64::MAX, StockIn, 1),
            Err(CoreError::Overflow { .. })
        ));
        assert!(matches!(
            next_stock("P", 0, StockIn, i64::MIN),
            Err(CoreError::Overflow { .. })
        ));
    }

    #[test]
    fn test_customer_balance_sequence() {
        let m = Money::from_cents;
        let b = next_balance(Money::zero(), Sale, m(20000)).unwrap();
        assert_eq!(b, m(20000));
        let b = next_balance(b, Payment, m(5000)).unwrap();
        assert_eq!(b, m(15000));
        let b = next_balance(b, CreditNote, m(2000)).unwrap();
        assert_eq!(b, m(13000));
        let b = next_balance(b, Payment, m(50000)).unwrap();
        assert_eq!(b, m(-37000));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        for kind in CustomerTransactionType::ALL {
            assert!(next_balance(Money::zero(), *kind, Money::zero()).is_err());
            assert!(next_balance(Money::zero(), *kind, Money::from_cents(-1)).is_err());
        }
    }

    #[test]
    fn test_replay_matches_stepwise_application() {
        let history = vec![
            (StockIn, 40),
            (StockIn, 25),
            (StockOut, -15),
            (Adjustment, 12),
            (StockIn, 3),
        ];
        assert_eq!(replay_stock("P", history).unwrap(), 15);
        assert_eq!(replay_stock("P", Vec::new()).unwrap(), 0);

        let m = Money::from_cents;
        let history = vec![(Sale, m(20000)), (Payment, m(5000)), (CreditNote, m(2000))];
        assert_eq!(replay_balance(history).unwrap(), m(13000));
    }

    #[test]
    fn test_replay_surfaces_impossible_history() {
        let history = vec![(StockIn, 5), (StockOut, 6)];
        assert!(matches!(
            replay_stock("P", history),
            Err(CoreError::InsufficientStock { .. })
        ));
    }
}
