//! # tally-db: Database Layer for Tally
//!
//! SQLite storage, the transactional ledger engine, the audit recorder and
//! the service layer every caller goes through.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Data Flow                                  │
//! │                                                                         │
//! │  HTTP handler (tally-api)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌───────────────┐    │   │
//! │  │   │   Services    │──►│ LedgerEngine  │   │ AuditRecorder │    │   │
//! │  │   │ (service/)    │   │ (ledger.rs)   │   │ (audit.rs)    │    │   │
//! │  │   │ permission →  │   │ lock → compute│   │ inline or     │    │   │
//! │  │   │ row check →   │   │ → write → tx  │   │ background    │    │   │
//! │  │   │ validate      │   └───────┬───────┘   └───────┬───────┘    │   │
//! │  │   └───────┬───────┘           │                   │            │   │
//! │  │           ▼                   ▼                   ▼            │   │
//! │  │   ┌───────────────────────────────────────────────────────┐    │   │
//! │  │   │  Repositories (repository/)  ·  Database (pool.rs)    │    │   │
//! │  │   └───────────────────────────────────────────────────────┘    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) · migrations/sqlite/*.sql embedded at build time         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Per-table SQL
//! - [`ledger`] - Atomic stock and balance mutations
//! - [`audit`] - Best-effort audit trail
//! - [`service`] - Permission-checked operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{AuditMode, AuditRecorder, Database, DbConfig, Services};
//!
//! let db = Database::new(DbConfig::new("tally.db")).await?;
//! let services = Services::new(db.clone(), AuditRecorder::new(db.audit_logs(), AuditMode::Background));
//!
//! let movement = services.products().adjust_stock(&ctx, &id, &request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditEvent, AuditMode, AuditRecorder};
pub use error::{DbError, DbResult};
pub use ledger::{LedgerEngine, LedgerError};
pub use pool::{Database, DbConfig};
pub use service::{RequestContext, ServiceError, ServiceResult, Services};

// Repository re-exports for convenience
pub use repository::audit::AuditLogRepository;
pub use repository::customer::CustomerRepository;
pub use repository::customer_tx::CustomerTransactionRepository;
pub use repository::inventory_tx::InventoryTransactionRepository;
pub use repository::product::ProductRepository;
pub use repository::user::UserRepository;
pub use repository::{CustomerFilter, ProductFilter};
