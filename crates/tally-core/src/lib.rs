//! # tally-core: Pure Business Logic for the Tally Back Office
//!
//! This crate holds the rules of the back office as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tally Back Office Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tally-api (axum)                             │   │
//! │  │    /api/products  /api/customers  /api/reports  /api/audit-logs │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (service + ledger engine)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │  ┌───────────┐ ┌────────────┐ ┌──────────┐ ┌────────────────┐  │   │
//! │  │  │   types   │ │permissions │ │  ledger  │ │ validation     │  │   │
//! │  │  │  Product  │ │ role table │ │direction │ │ input, reports │  │   │
//! │  │  │ Customer  │ │ row check  │ │ tables   │ │ pagination     │  │   │
//! │  │  └───────────┘ └────────────┘ └──────────┘ └────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records and closed enums
//! - [`money`] - Integer-cent money
//! - [`permissions`] - Role → permission table and the row-level customer check
//! - [`ledger`] - Direction tables for stock and balances
//! - [`validation`] / [`input`] - Field validation and request inputs
//! - [`reports`] - Report aggregation and dashboard shapes
//! - [`pagination`] - Page/limit handling
//! - [`codes`] - Business code generation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::ledger::next_stock;
//! use tally_core::permissions::{has_permission, Permission};
//! use tally_core::{InventoryTransactionType, Role};
//!
//! assert!(has_permission(Role::Manager, Permission::ProductStockAdjust));
//!
//! let stock = next_stock("PRD1", 0, InventoryTransactionType::StockIn, 100).unwrap();
//! let stock = next_stock("PRD1", stock, InventoryTransactionType::StockOut, 30).unwrap();
//! assert_eq!(stock, 70);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod codes;
pub mod error;
pub mod input;
pub mod ledger;
pub mod money;
pub mod pagination;
pub mod permissions;
pub mod reports;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError, ValidationErrors};
pub use money::Money;
pub use pagination::{Page, PageRequest, Pagination};
pub use permissions::Permission;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Page size when a list request does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Upper bound on a requested page size.
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Free-text inputs are cut to this many characters.
pub const MAX_INPUT_LENGTH: usize = 1000;

/// Transactions shown alongside a single product or customer.
pub const RECENT_TRANSACTIONS_LIMIT: i64 = 10;

/// Transactions of each kind shown on the dashboard.
pub const DASHBOARD_RECENT_LIMIT: i64 = 5;

/// Reference number written on the transaction that seeds opening stock.
pub const OPENING_STOCK_REFERENCE: &str = "OPENING";
