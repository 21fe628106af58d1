//! # Ledger Engine
//!
//! The only writer of `products.current_stock` and
//! `customers.current_balance_cents`.
//!
//! ## One Mutation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 apply_inventory_transaction(product, entry)             │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  UPDATE products SET updated_at = now WHERE id = ? RETURNING *         │
//! │    │   first write: takes the database write lock, reads the row       │
//! │    │   a concurrent writer waits here (busy_timeout)                   │
//! │    ▼                                                                    │
//! │  missing? ──► NotFound        inactive? ──► Inactive                   │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  tally_core::ledger::next_stock(current, type, qty)                    │
//! │    │   stock_out below zero ──► InsufficientStock                      │
//! │    ▼                                                                    │
//! │  UPDATE products SET current_stock = new                               │
//! │  INSERT INTO inventory_transactions (...)                              │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  COMMIT ──► StockMovement { transaction, new_stock }                   │
//! │                                                                         │
//! │  Any early return drops the transaction, which rolls it back:          │
//! │  no stock change and no transaction row are ever visible.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The customer ledger is the same shape with `next_balance` and no floor.
//! Role permissions are checked by the service layer before the engine is
//! called. Row ownership is checked there too, and checked again here on
//! the locked row when the caller passes an owner scope, so a reassignment
//! committed in between cannot slip through.

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::{customer, customer_tx, inventory_tx, product};
use tally_core::input::{BalanceEntry, StockEntry};
use tally_core::ledger::{next_balance, next_stock, replay_balance, replay_stock};
use tally_core::{
    BalanceMovement, CoreError, Customer, CustomerTransaction, InventoryTransaction,
    InventoryTransactionType, Money, Product, StockMovement, OPENING_STOCK_REFERENCE,
};

// =============================================================================
// Errors
// =============================================================================

/// Why a ledger mutation was refused. Nothing was written in any case.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} is inactive")]
    Inactive { entity: &'static str, id: String },

    /// The locked customer is not owned by the required sales rep.
    #[error("Customer {id} is not owned by the caller")]
    NotOwner { id: String },

    /// Direction-table rejection (insufficient stock, zero quantity, overflow).
    #[error(transparent)]
    Rule(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Database(err.into())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Engine
// =============================================================================

/// Transactional ledger over the connection pool.
///
/// ## Usage
/// ```rust,ignore
/// let movement = db
///     .ledger()
///     .apply_inventory_transaction(&product.id, &entry, Some(&user.id))
///     .await?;
/// assert_eq!(movement.new_stock, 90);
/// ```
#[derive(Debug, Clone)]
pub struct LedgerEngine {
    pool: SqlitePool,
}

impl LedgerEngine {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerEngine { pool }
    }

    /// Inserts a new product, recording a non-zero opening stock as an
    /// `adjustment` transaction in the same database transaction.
    ///
    /// `product.current_stock` is ignored; the stored stock is
    /// `opening_stock` (magnitude).
    ///
    /// ## Returns
    /// The stored product and, if one was written, the opening transaction.
    pub async fn create_product(
        &self,
        mut product: Product,
        opening_stock: i64,
    ) -> LedgerResult<(Product, Option<InventoryTransaction>)> {
        let mut tx = self.pool.begin().await?;

        product.current_stock = 0;
        product::insert_in(&mut tx, &product).await?;

        let opening = if opening_stock != 0 {
            let new_stock = next_stock(
                &product.code,
                0,
                InventoryTransactionType::Adjustment,
                opening_stock,
            )?;
            let record = InventoryTransaction {
                id: Uuid::new_v4().to_string(),
                product_id: product.id.clone(),
                transaction_type: InventoryTransactionType::Adjustment,
                quantity: opening_stock,
                transaction_date: product.created_at,
                reference_number: Some(OPENING_STOCK_REFERENCE.to_string()),
                notes: None,
                created_by: product.created_by.clone(),
                created_at: product.created_at,
            };

            product::set_stock_in(&mut tx, &product.id, new_stock).await?;
            inventory_tx::insert_in(&mut tx, &record).await?;
            product.current_stock = new_stock;
            Some(record)
        } else {
            None
        };

        tx.commit().await?;

        info!(
            product_id = %product.id,
            code = %product.code,
            opening_stock = product.current_stock,
            "Product created"
        );
        Ok((product, opening))
    }

    /// Inserts a new customer. Balances always open at zero.
    pub async fn create_customer(&self, mut customer: Customer) -> LedgerResult<Customer> {
        let mut conn = self.pool.acquire().await?;

        customer.current_balance_cents = 0;
        customer::insert_in(&mut conn, &customer).await?;

        info!(customer_id = %customer.id, code = %customer.code, "Customer created");
        Ok(customer)
    }

    /// Applies one stock movement atomically.
    ///
    /// ## Errors
    /// - [`LedgerError::NotFound`] - no such product
    /// - [`LedgerError::Inactive`] - product was soft-deleted
    /// - [`LedgerError::Rule`] - insufficient stock or zero quantity
    pub async fn apply_inventory_transaction(
        &self,
        product_id: &str,
        entry: &StockEntry,
        actor_id: Option<&str>,
    ) -> LedgerResult<StockMovement> {
        debug!(
            product_id = %product_id,
            transaction_type = %entry.transaction_type,
            quantity = entry.quantity,
            "Applying inventory transaction"
        );

        let mut tx = self.pool.begin().await?;

        let current = product::lock_in(&mut tx, product_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "Product",
                id: product_id.to_string(),
            })?;

        if !current.is_active() {
            warn!(product_id = %product_id, "Stock movement against inactive product rejected");
            return Err(LedgerError::Inactive {
                entity: "Product",
                id: product_id.to_string(),
            });
        }

        let new_stock = next_stock(
            &current.code,
            current.current_stock,
            entry.transaction_type,
            entry.quantity,
        )
        .inspect_err(|e| warn!(product_id = %product_id, error = %e, "Stock movement rejected"))?;

        let now = Utc::now();
        let record = InventoryTransaction {
            id: Uuid::new_v4().to_string(),
            product_id: current.id.clone(),
            transaction_type: entry.transaction_type,
            quantity: entry.quantity,
            transaction_date: now,
            reference_number: entry.reference_number.clone(),
            notes: entry.notes.clone(),
            created_by: actor_id.map(str::to_string),
            created_at: now,
        };

        product::set_stock_in(&mut tx, &current.id, new_stock).await?;
        inventory_tx::insert_in(&mut tx, &record).await?;
        tx.commit().await?;

        info!(
            product_id = %current.id,
            transaction_id = %record.id,
            transaction_type = %record.transaction_type,
            previous_stock = current.current_stock,
            new_stock,
            "Stock adjusted"
        );

        Ok(StockMovement {
            transaction: record,
            new_stock,
        })
    }

    /// Applies one balance movement atomically. Balances may go negative.
    ///
    /// ## Arguments
    /// * `owner_scope` - when set, the customer's owning rep must equal it
    ///
    /// ## Errors
    /// - [`LedgerError::NotFound`] - no such customer
    /// - [`LedgerError::NotOwner`] - owned by someone other than `owner_scope`
    /// - [`LedgerError::Inactive`] - customer was soft-deleted
    /// - [`LedgerError::Rule`] - non-positive amount or overflow
    pub async fn apply_customer_transaction(
        &self,
        customer_id: &str,
        entry: &BalanceEntry,
        actor_id: Option<&str>,
        owner_scope: Option<&str>,
    ) -> LedgerResult<BalanceMovement> {
        debug!(
            customer_id = %customer_id,
            transaction_type = %entry.transaction_type,
            amount = %entry.amount,
            "Applying customer transaction"
        );

        let mut tx = self.pool.begin().await?;

        let current = customer::lock_in(&mut tx, customer_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "Customer",
                id: customer_id.to_string(),
            })?;

        if let Some(owner) = owner_scope {
            if current.sales_rep.as_deref() != Some(owner) {
                warn!(customer_id = %customer_id, "Transaction against another rep's customer rejected");
                return Err(LedgerError::NotOwner {
                    id: customer_id.to_string(),
                });
            }
        }

        if !current.is_active() {
            warn!(customer_id = %customer_id, "Transaction against inactive customer rejected");
            return Err(LedgerError::Inactive {
                entity: "Customer",
                id: customer_id.to_string(),
            });
        }

        let new_balance = next_balance(current.current_balance(), entry.transaction_type, entry.amount)?;

        let now = Utc::now();
        let record = CustomerTransaction {
            id: Uuid::new_v4().to_string(),
            customer_id: current.id.clone(),
            transaction_type: entry.transaction_type,
            amount_cents: entry.amount.cents(),
            transaction_date: now,
            reference_number: entry.reference_number.clone(),
            notes: entry.notes.clone(),
            created_by: actor_id.map(str::to_string),
            created_at: now,
        };

        customer::set_balance_in(&mut tx, &current.id, new_balance.cents()).await?;
        customer_tx::insert_in(&mut tx, &record).await?;
        tx.commit().await?;

        info!(
            customer_id = %current.id,
            transaction_id = %record.id,
            transaction_type = %record.transaction_type,
            previous_balance = %current.current_balance(),
            new_balance = %new_balance,
            "Customer balance updated"
        );

        Ok(BalanceMovement {
            transaction: record,
            new_balance_cents: new_balance.cents(),
        })
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Replays a product's history from zero and compares with the stored
    /// stock.
    ///
    /// ## Returns
    /// `(stored, replayed)`. They are equal for every consistent product.
    pub async fn reconcile_product(&self, product_id: &str) -> LedgerResult<(i64, i64)> {
        let product = product::ProductRepository::new(self.pool.clone())
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "Product",
                id: product_id.to_string(),
            })?;

        let history = inventory_tx::InventoryTransactionRepository::new(self.pool.clone())
            .all_for_product_in_order(product_id)
            .await?;

        let replayed = replay_stock(
            &product.code,
            history.iter().map(|t| (t.transaction_type, t.quantity)),
        )?;

        if replayed != product.current_stock {
            warn!(
                product_id = %product_id,
                stored = product.current_stock,
                replayed,
                "Stock does not match transaction history"
            );
        }

        Ok((product.current_stock, replayed))
    }

    /// Replays a customer's history from zero and compares with the stored
    /// balance.
    pub async fn reconcile_customer(&self, customer_id: &str) -> LedgerResult<(Money, Money)> {
        let customer = customer::CustomerRepository::new(self.pool.clone())
            .get_by_id(customer_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "Customer",
                id: customer_id.to_string(),
            })?;

        let history = customer_tx::CustomerTransactionRepository::new(self.pool.clone())
            .all_for_customer_in_order(customer_id)
            .await?;

        let replayed = replay_balance(
            history
                .iter()
                .map(|t| (t.transaction_type, t.amount())),
        )?;

        if replayed != customer.current_balance() {
            warn!(
                customer_id = %customer_id,
                stored = %customer.current_balance(),
                replayed = %replayed,
                "Balance does not match transaction history"
            );
        }

        Ok((customer.current_balance(), replayed))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::test_support::{create_user, insert_customer, insert_product, insert_product_with};
    use std::time::Duration;
    use tally_core::{CustomerTransactionType, Role};

    fn stock(kind: InventoryTransactionType, quantity: i64) -> StockEntry {
        StockEntry {
            transaction_type: kind,
            quantity,
            reference_number: None,
            notes: None,
        }
    }

    fn balance(kind: CustomerTransactionType, cents: i64) -> BalanceEntry {
        BalanceEntry {
            transaction_type: kind,
            amount: Money::from_cents(cents),
            reference_number: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_inventory_direction_table() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.ledger();
        let product = insert_product(&db, "PRD-1").await;

        use InventoryTransactionType::*;
        let m = ledger
            .apply_inventory_transaction(&product.id, &stock(StockIn, 100), None)
            .await
            .unwrap();
        assert_eq!(m.new_stock, 100);

        let m = ledger
            .apply_inventory_transaction(&product.id, &stock(StockOut, -30), None)
            .await
            .unwrap();
        assert_eq!(m.new_stock, 70);
        assert_eq!(m.transaction.quantity, -30);

        let m = ledger
            .apply_inventory_transaction(&product.id, &stock(Adjustment, 10), None)
            .await
            .unwrap();
        assert_eq!(m.new_stock, 10);

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 10);

        let (stored, replayed) = ledger.reconcile_product(&product.id).await.unwrap();
        assert_eq!(stored, replayed);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.ledger();
        let product = insert_product_with(&db, "PRD-1", 5, 0).await;
        let before = db
            .inventory_transactions()
            .count_for_product(&product.id)
            .await
            .unwrap();

        let err = ledger
            .apply_inventory_transaction(
                &product.id,
                &stock(InventoryTransactionType::StockOut, 10),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rule(CoreError::InsufficientStock {
                available: 5,
                requested: 10,
                ..
            })
        ));

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 5);
        let after = db
            .inventory_transactions()
            .count_for_product(&product.id)
            .await
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = insert_product_with(&db, "PRD-1", 5, 0).await;

        let err = db
            .ledger()
            .apply_inventory_transaction(
                &product.id,
                &stock(InventoryTransactionType::StockIn, 0),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rule(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_and_inactive_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.ledger();

        let err = ledger
            .apply_inventory_transaction("missing", &stock(InventoryTransactionType::StockIn, 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        let product = insert_product_with(&db, "PRD-1", 5, 0).await;
        db.products().soft_delete(&product.id).await.unwrap();

        let err = ledger
            .apply_inventory_transaction(&product.id, &stock(InventoryTransactionType::StockIn, 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Inactive { .. }));

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 5);
    }

    #[tokio::test]
    async fn test_opening_stock_recorded_as_adjustment() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = insert_product_with(&db, "PRD-1", 42, 0).await;

        let history = db
            .inventory_transactions()
            .all_for_product_in_order(&product.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].transaction_type, InventoryTransactionType::Adjustment);
        assert_eq!(history[0].reference_number.as_deref(), Some(OPENING_STOCK_REFERENCE));

        let (stored, replayed) = db.ledger().reconcile_product(&product.id).await.unwrap();
        assert_eq!((stored, replayed), (42, 42));
    }

    #[tokio::test]
    async fn test_customer_balance_may_go_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.ledger();
        let customer = insert_customer(&db, "CUS-1", None).await;

        use CustomerTransactionType::*;
        ledger
            .apply_customer_transaction(&customer.id, &balance(Sale, 20_000), None, None)
            .await
            .unwrap();
        ledger
            .apply_customer_transaction(&customer.id, &balance(CreditNote, 2_000), None, None)
            .await
            .unwrap();
        let m = ledger
            .apply_customer_transaction(&customer.id, &balance(Payment, 55_000), None, None)
            .await
            .unwrap();
        assert_eq!(m.new_balance_cents, -37_000);

        let (stored, replayed) = ledger.reconcile_customer(&customer.id).await.unwrap();
        assert_eq!(stored, replayed);
        assert_eq!(stored.cents(), -37_000);
    }

    #[tokio::test]
    async fn test_customer_non_positive_amount_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = insert_customer(&db, "CUS-1", None).await;

        let err = db
            .ledger()
            .apply_customer_transaction(
                &customer.id,
                &balance(CustomerTransactionType::Sale, 0),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rule(_)));
        assert_eq!(
            db.customer_transactions()
                .count_for_customer(&customer.id)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_inactive_customer_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = insert_customer(&db, "CUS-1", None).await;
        db.customers().soft_delete(&customer.id).await.unwrap();

        let err = db
            .ledger()
            .apply_customer_transaction(
                &customer.id,
                &balance(CustomerTransactionType::Sale, 100),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Inactive { .. }));
    }

    #[tokio::test]
    async fn test_owner_scope_checked_on_locked_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rep_a = create_user(&db, "a@example.com", Role::SalesRep).await;
        let rep_b = create_user(&db, "b@example.com", Role::SalesRep).await;
        let customer = insert_customer(&db, "CUS-1", Some(&rep_a.id)).await;
        let entry = balance(CustomerTransactionType::Sale, 100);

        let err = db
            .ledger()
            .apply_customer_transaction(&customer.id, &entry, Some(&rep_b.id), Some(&rep_b.id))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotOwner { .. }));

        let m = db
            .ledger()
            .apply_customer_transaction(&customer.id, &entry, Some(&rep_a.id), Some(&rep_a.id))
            .await
            .unwrap();
        assert_eq!(m.new_balance_cents, 100);
    }

    #[tokio::test]
    async fn test_created_by_recorded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = create_user(&db, "clerk@example.com", Role::Manager).await;
        let product = insert_product(&db, "PRD-1").await;

        let m = db
            .ledger()
            .apply_inventory_transaction(
                &product.id,
                &stock(InventoryTransactionType::StockIn, 3),
                Some(&user.id),
            )
            .await
            .unwrap();
        assert_eq!(m.transaction.created_by.as_deref(), Some(user.id.as_str()));
    }

    /// Two stock_out of 6 against stock 10 on separate connections: exactly
    /// one commits, the other sees the committed stock and is refused.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stock_out_no_lost_update() {
        let path = std::env::temp_dir().join(format!("tally-ledger-{}.db", Uuid::new_v4()));
        let db = Database::new(
            DbConfig::new(path.clone())
                .max_connections(4)
                .busy_timeout(Duration::from_secs(10)),
        )
        .await
        .unwrap();

        let product = insert_product_with(&db, "PRD-1", 10, 0).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let ledger = db.ledger();
            let id = product.id.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .apply_inventory_transaction(
                        &id,
                        &stock(InventoryTransactionType::StockOut, 6),
                        None,
                    )
                    .await
            }));
        }

        let mut ok = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(m) => {
                    assert_eq!(m.new_stock, 4);
                    ok += 1;
                }
                Err(LedgerError::Rule(CoreError::InsufficientStock { available, .. })) => {
                    assert_eq!(available, 4);
                    insufficient += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((ok, insufficient), (1, 1));

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 4);
        let (stored, replayed) = db.ledger().reconcile_product(&product.id).await.unwrap();
        assert_eq!(stored, replayed);

        db.close().await;
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    /// Writes to different products wait on the shared write lock but both
    /// succeed, and neither sees the other's stock.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_different_products_both_commit() {
        let path = std::env::temp_dir().join(format!("tally-ledger-{}.db", Uuid::new_v4()));
        let db = Database::new(
            DbConfig::new(path.clone())
                .max_connections(4)
                .busy_timeout(Duration::from_secs(10)),
        )
        .await
        .unwrap();

        let a = insert_product_with(&db, "PRD-A", 10, 0).await;
        let b = insert_product_with(&db, "PRD-B", 3, 0).await;

        let mut handles = Vec::new();
        for (id, quantity) in [(a.id.clone(), 6), (b.id.clone(), 3)] {
            let ledger = db.ledger();
            handles.push(tokio::spawn(async move {
                ledger
                    .apply_inventory_transaction(
                        &id,
                        &stock(InventoryTransactionType::StockOut, quantity),
                        None,
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored_a = db.products().get_by_id(&a.id).await.unwrap().unwrap();
        let stored_b = db.products().get_by_id(&b.id).await.unwrap().unwrap();
        assert_eq!(stored_a.current_stock, 4);
        assert_eq!(stored_b.current_stock, 0);

        db.close().await;
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }
}
