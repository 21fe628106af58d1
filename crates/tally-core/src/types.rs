//! # Domain Types
//!
//! Core domain types used throughout the back office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐         ┌──────────────────────────┐              │
//! │  │    Product      │ 1     * │  InventoryTransaction    │              │
//! │  │  current_stock  │◄────────│  stock_in | stock_out |  │              │
//! │  │  (running value)│         │  adjustment, quantity    │              │
//! │  └─────────────────┘         └──────────────────────────┘              │
//! │                                                                         │
//! │  ┌─────────────────┐         ┌──────────────────────────┐              │
//! │  │    Customer     │ 1     * │  CustomerTransaction     │              │
//! │  │ current_balance │◄────────│  sale | payment |        │              │
//! │  │  sales_rep ──┐  │         │  credit_note, amount     │              │
//! │  └──────────────┼──┘         └──────────────────────────┘              │
//! │                 ▼                                                       │
//! │  ┌─────────────────┐         ┌──────────────────────────┐              │
//! │  │      User       │ 1     * │     AuditLogEntry        │              │
//! │  │  role           │◄────────│  append-only             │              │
//! │  └─────────────────┘         └──────────────────────────┘              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Products and customers have:
//! - `id`: UUID v4, immutable, used for database relations
//! - `code`: human-readable business key (`PRD…`, `CUS…`), unique

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Enum helper
// =============================================================================

/// Implements `as_str`, `Display` and `FromStr` for a closed string enum.
///
/// `FromStr` fails with [`ValidationError::NotAllowed`] listing every
/// accepted spelling, so a bad value maps straight onto a field error.
macro_rules! string_enum {
    ($ty:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(ValidationError::NotAllowed {
                        field: $field.to_string(),
                        allowed: $ty::ALL.iter().map(|v| v.as_str().to_string()).collect(),
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Role
// =============================================================================

/// A user's role. The role alone decides which capabilities a user holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    SalesRep,
    Viewer,
}

string_enum!(Role, "role", {
    Admin => "admin",
    Manager => "manager",
    SalesRep => "sales_rep",
    Viewer => "viewer",
});

// =============================================================================
// Entity Status
// =============================================================================

/// Soft-delete flag shared by products and customers.
///
/// ## Lifecycle
/// ```text
/// create ──► Active ──(delete)──► Inactive
///              ▲                     │
///              └────(update)─────────┘
/// ```
/// Inactive entities keep their history and their frozen running value;
/// the ledger refuses new transactions against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Active,
    Inactive,
}

string_enum!(EntityStatus, "status", {
    Active => "active",
    Inactive => "inactive",
});

// =============================================================================
// Transaction Types
// =============================================================================

/// The three verbs that move a product's stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InventoryTransactionType {
    StockIn,
    StockOut,
    Adjustment,
}

string_enum!(InventoryTransactionType, "transaction_type", {
    StockIn => "stock_in",
    StockOut => "stock_out",
    Adjustment => "adjustment",
});

/// The three verbs that move a customer's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CustomerTransactionType {
    Sale,
    Payment,
    CreditNote,
}

string_enum!(CustomerTransactionType, "transaction_type", {
    Sale => "sale",
    Payment => "payment",
    CreditNote => "credit_note",
});

// =============================================================================
// Audit Vocabulary
// =============================================================================

/// What kind of mutation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    StockAdjustment,
    Transaction,
}

string_enum!(AuditAction, "action", {
    Create => "CREATE",
    Update => "UPDATE",
    Delete => "DELETE",
    StockAdjustment => "STOCK_ADJUSTMENT",
    Transaction => "TRANSACTION",
});

/// Which table an audit entry points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityType {
    Product,
    Customer,
    InventoryTransaction,
    CustomerTransaction,
}

string_enum!(AuditEntityType, "entity_type", {
    Product => "product",
    Customer => "customer",
    InventoryTransaction => "inventory_transaction",
    CustomerTransaction => "customer_transaction",
});

// =============================================================================
// User
// =============================================================================

/// An authenticated user as seen by the service layer.
///
/// The password hash never leaves tally-db.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product.
///
/// `current_stock` is only ever written by the ledger engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier, unique across all products.
    pub code: String,

    pub name: String,
    pub brand: Option<String>,
    pub category: String,

    /// Unit of measure ("pcs", "kg", "box", ...).
    pub unit: String,

    pub unit_cost_cents: i64,
    pub selling_price_cents: i64,

    /// Running stock level. Never negative.
    pub current_stock: i64,

    /// At or below this level the product is reported as low stock.
    pub critical_stock_level: i64,

    pub status: EntityStatus,

    /// User that created the product.
    pub created_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    pub fn is_active(&self) -> bool {
        self.status == EntityStatus::Active
    }

    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.critical_stock_level
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer with a receivables balance.
///
/// Sign convention: a positive `current_balance_cents` means the customer
/// owes money; negative means the customer is in credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,

    /// Owning sales rep. Sales reps only see customers they own.
    pub sales_rep: Option<String>,

    /// Payment terms in days.
    pub payment_terms_limit: i64,

    /// Balance at or above which the customer is at risk.
    pub balance_risk_limit_cents: i64,

    /// Running balance. Only ever written by the ledger engine.
    pub current_balance_cents: i64,

    pub status: EntityStatus,
    pub created_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn current_balance(&self) -> Money {
        Money::from_cents(self.current_balance_cents)
    }

    pub fn balance_risk_limit(&self) -> Money {
        Money::from_cents(self.balance_risk_limit_cents)
    }

    pub fn is_active(&self) -> bool {
        self.status == EntityStatus::Active
    }

    pub fn is_at_risk(&self) -> bool {
        self.current_balance_cents >= self.balance_risk_limit_cents
    }
}

// =============================================================================
// Ledger Transactions
// =============================================================================

/// One immutable stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryTransaction {
    pub id: String,
    pub product_id: String,
    pub transaction_type: InventoryTransactionType,

    /// Quantity as submitted. Only its magnitude affects stock.
    pub quantity: i64,

    #[ts(as = "String")]
    pub transaction_date: DateTime<Utc>,

    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One immutable balance movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CustomerTransaction {
    pub id: String,
    pub customer_id: String,
    pub transaction_type: CustomerTransactionType,

    /// Strictly positive magnitude.
    pub amount_cents: i64,

    #[ts(as = "String")]
    pub transaction_date: DateTime<Utc>,

    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CustomerTransaction {
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Result of a stock mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub transaction: InventoryTransaction,
    pub new_stock: i64,
}

/// Result of a balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BalanceMovement {
    pub transaction: CustomerTransaction,
    pub new_balance_cents: i64,
}

// =============================================================================
// Audit Log
// =============================================================================

/// One append-only audit row.
///
/// `changes` is an opaque serialised JSON blob: `{old, new}` for entity
/// mutations, `{data}` for ledger transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AuditLogEntry {
    pub id: String,
    pub user_id: Option<String>,
    pub action: AuditAction,
    pub entity_type: AuditEntityType,
    pub entity_id: String,
    pub changes: Option<String>,
    pub ip_address: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Read Models
// =============================================================================

/// A product whose stock is at or below its critical level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LowStockProduct {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub product: Product,

    /// `critical_stock_level - current_stock`.
    pub deficit: i64,

    pub created_by_name: Option<String>,
}

/// A customer whose balance has reached its risk limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AtRiskCustomer {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub customer: Customer,

    /// `current_balance - balance_risk_limit`.
    pub over_limit_cents: i64,

    pub sales_rep_name: Option<String>,
    pub created_by_name: Option<String>,
}

/// An inventory transaction joined with its product's code and name and
/// the name of the user who recorded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryTransactionDetail {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub transaction: InventoryTransaction,

    pub product_code: String,
    pub product_name: String,
    pub created_by_name: Option<String>,
}

/// A customer transaction joined with its customer's code and name, the
/// customer's owning rep and the user who recorded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CustomerTransactionDetail {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub transaction: CustomerTransaction,

    pub customer_code: String,
    pub customer_name: String,
    pub sales_rep_name: Option<String>,
    pub created_by_name: Option<String>,
}

/// A product together with its most recent stock movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductWithHistory {
    #[serde(flatten)]
    pub product: Product,
    pub recent_transactions: Vec<InventoryTransaction>,
}

/// A customer together with its most recent balance movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerWithHistory {
    #[serde(flatten)]
    pub customer: Customer,
    pub recent_transactions: Vec<CustomerTransaction>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert_eq!(Role::SalesRep.to_string(), "sales_rep");
    }

    #[test]
    fn test_unknown_transaction_type_lists_choices() {
        let err = "refund".parse::<CustomerTransactionType>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "transaction_type must be one of: sale, payment, credit_note"
        );
    }

    #[test]
    fn test_serde_spelling_matches_as_str() {
        let json = serde_json::to_string(&InventoryTransactionType::StockOut).unwrap();
        assert_eq!(json, "\"stock_out\"");

        let json = serde_json::to_string(&AuditAction::StockAdjustment).unwrap();
        assert_eq!(json, "\"STOCK_ADJUSTMENT\"");
        assert_eq!(AuditAction::StockAdjustment.as_str(), "STOCK_ADJUSTMENT");

        let json = serde_json::to_string(&AuditEntityType::CustomerTransaction).unwrap();
        assert_eq!(json, "\"customer_transaction\"");
    }

    #[test]
    fn test_status_defaults_to_active() {
        assert_eq!(EntityStatus::default(), EntityStatus::Active);
        assert_eq!("inactive".parse::<EntityStatus>().unwrap(), EntityStatus::Inactive);
    }
}
