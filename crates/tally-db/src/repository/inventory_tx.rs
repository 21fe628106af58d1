//! # Inventory Transaction Repository
//!
//! Read access to the stock ledger plus the insert helper the ledger engine
//! uses inside its transaction. Rows are immutable once written (a trigger
//! rejects `UPDATE`).

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::reports::DateRange;
use tally_core::{InventoryTransaction, InventoryTransactionDetail, PageRequest};

#[derive(Debug, Clone)]
pub struct InventoryTransactionRepository {
    pool: SqlitePool,
}

impl InventoryTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryTransactionRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryTransaction>> {
        let tx = sqlx::query_as::<_, InventoryTransaction>(
            "SELECT * FROM inventory_transactions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tx)
    }

    /// The `limit` most recent transactions of one product, newest first.
    pub async fn recent_for_product(
        &self,
        product_id: &str,
        limit: i64,
    ) -> DbResult<Vec<InventoryTransaction>> {
        let txs = sqlx::query_as::<_, InventoryTransaction>(
            r#"
            SELECT * FROM inventory_transactions
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(txs)
    }

    /// One page of a product's history, newest first.
    pub async fn history_for_product(
        &self,
        product_id: &str,
        page: &PageRequest,
    ) -> DbResult<(Vec<InventoryTransaction>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM inventory_transactions WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        let txs = sqlx::query_as::<_, InventoryTransaction>(
            r#"
            SELECT * FROM inventory_transactions
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(product_id)
        .bind(i64::from(page.limit()))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((txs, total))
    }

    /// Every transaction of a product in the order it was applied.
    ///
    /// Replaying these from zero reproduces `current_stock`.
    pub async fn all_for_product_in_order(
        &self,
        product_id: &str,
    ) -> DbResult<Vec<InventoryTransaction>> {
        let txs = sqlx::query_as::<_, InventoryTransaction>(
            "SELECT * FROM inventory_transactions WHERE product_id = ?1 ORDER BY rowid ASC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(txs)
    }

    /// Transactions dated within `range`, joined with product code and name,
    /// newest first.
    pub async fn report(&self, range: &DateRange) -> DbResult<Vec<InventoryTransactionDetail>> {
        let (from, before) = bounds(range);
        debug!(from = ?from, before = ?before, "Inventory report query");

        let rows = sqlx::query_as::<_, InventoryTransactionDetail>(
            r#"
            SELECT t.*, p.code AS product_code, p.name AS product_name,
                   u.name AS created_by_name
            FROM inventory_transactions t
            INNER JOIN products p ON p.id = t.product_id
            LEFT JOIN users u ON u.id = t.created_by
            WHERE (?1 IS NULL OR t.transaction_date >= ?1)
              AND (?2 IS NULL OR t.transaction_date < ?2)
            ORDER BY t.transaction_date DESC, t.rowid DESC
            "#,
        )
        .bind(from)
        .bind(before)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// The `limit` most recent transactions across all products.
    pub async fn recent_detailed(&self, limit: i64) -> DbResult<Vec<InventoryTransactionDetail>> {
        let rows = sqlx::query_as::<_, InventoryTransactionDetail>(
            r#"
            SELECT t.*, p.code AS product_code, p.name AS product_name,
                   u.name AS created_by_name
            FROM inventory_transactions t
            INNER JOIN products p ON p.id = t.product_id
            LEFT JOIN users u ON u.id = t.created_by
            ORDER BY t.created_at DESC, t.rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_for_product(&self, product_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM inventory_transactions WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

/// Inserts a transaction row on an open transaction.
pub(crate) async fn insert_in(
    conn: &mut SqliteConnection,
    tx: &InventoryTransaction,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_transactions (
            id, product_id, transaction_type, quantity, transaction_date,
            reference_number, notes, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&tx.id)
    .bind(&tx.product_id)
    .bind(tx.transaction_type)
    .bind(tx.quantity)
    .bind(tx.transaction_date)
    .bind(&tx.reference_number)
    .bind(&tx.notes)
    .bind(&tx.created_by)
    .bind(tx.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// `[from, before)` bounds of a report range.
pub(crate) fn bounds(range: &DateRange) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    (range.starts_at(), range.ends_before())
}
