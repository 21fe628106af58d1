//! # Customer Transaction Repository
//!
//! Read access to the receivables ledger. Report and dashboard queries join
//! through `customers` so that a sales rep's scope is applied in SQL.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::inventory_tx::bounds;
use crate::error::DbResult;
use tally_core::reports::DateRange;
use tally_core::{CustomerTransaction, CustomerTransactionDetail, PageRequest};

#[derive(Debug, Clone)]
pub struct CustomerTransactionRepository {
    pool: SqlitePool,
}

impl CustomerTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerTransactionRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CustomerTransaction>> {
        let tx = sqlx::query_as::<_, CustomerTransaction>(
            "SELECT * FROM customer_transactions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tx)
    }

    /// The `limit` most recent transactions of one customer, newest first.
    pub async fn recent_for_customer(
        &self,
        customer_id: &str,
        limit: i64,
    ) -> DbResult<Vec<CustomerTransaction>> {
        let txs = sqlx::query_as::<_, CustomerTransaction>(
            r#"
            SELECT * FROM customer_transactions
            WHERE customer_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(txs)
    }

    /// One page of a customer's history, newest first.
    pub async fn history_for_customer(
        &self,
        customer_id: &str,
        page: &PageRequest,
    ) -> DbResult<(Vec<CustomerTransaction>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM customer_transactions WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        let txs = sqlx::query_as::<_, CustomerTransaction>(
            r#"
            SELECT * FROM customer_transactions
            WHERE customer_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(customer_id)
        .bind(i64::from(page.limit()))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((txs, total))
    }

    /// Every transaction of a customer in the order it was applied.
    pub async fn all_for_customer_in_order(
        &self,
        customer_id: &str,
    ) -> DbResult<Vec<CustomerTransaction>> {
        let txs = sqlx::query_as::<_, CustomerTransaction>(
            "SELECT * FROM customer_transactions WHERE customer_id = ?1 ORDER BY rowid ASC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(txs)
    }

    /// Transactions dated within `range`, joined with customer code and
    /// name, newest first.
    ///
    /// ## Arguments
    /// * `sales_rep` - restrict to customers owned by this rep
    pub async fn report(
        &self,
        range: &DateRange,
        sales_rep: Option<&str>,
    ) -> DbResult<Vec<CustomerTransactionDetail>> {
        let (from, before) = bounds(range);
        debug!(from = ?from, before = ?before, sales_rep = ?sales_rep, "Customer report query");

        let rows = sqlx::query_as::<_, CustomerTransactionDetail>(
            r#"
            SELECT t.*, c.code AS customer_code, c.name AS customer_name,
                   s.name AS sales_rep_name, u.name AS created_by_name
            FROM customer_transactions t
            INNER JOIN customers c ON c.id = t.customer_id
            LEFT JOIN users s ON s.id = c.sales_rep
            LEFT JOIN users u ON u.id = t.created_by
            WHERE (?1 IS NULL OR t.transaction_date >= ?1)
              AND (?2 IS NULL OR t.transaction_date < ?2)
              AND (?3 IS NULL OR c.sales_rep = ?3)
            ORDER BY t.transaction_date DESC, t.rowid DESC
            "#,
        )
        .bind(from)
        .bind(before)
        .bind(sales_rep)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// The `limit` most recent transactions, optionally scoped to one rep.
    pub async fn recent_detailed(
        &self,
        limit: i64,
        sales_rep: Option<&str>,
    ) -> DbResult<Vec<CustomerTransactionDetail>> {
        let rows = sqlx::query_as::<_, CustomerTransactionDetail>(
            r#"
            SELECT t.*, c.code AS customer_code, c.name AS customer_name,
                   s.name AS sales_rep_name, u.name AS created_by_name
            FROM customer_transactions t
            INNER JOIN customers c ON c.id = t.customer_id
            LEFT JOIN users s ON s.id = c.sales_rep
            LEFT JOIN users u ON u.id = t.created_by
            WHERE (?2 IS NULL OR c.sales_rep = ?2)
            ORDER BY t.created_at DESC, t.rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .bind(sales_rep)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_for_customer(&self, customer_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM customer_transactions WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

/// Inserts a transaction row on an open transaction.
pub(crate) async fn insert_in(
    conn: &mut SqliteConnection,
    tx: &CustomerTransaction,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO customer_transactions (
            id, customer_id, transaction_type, amount_cents, transaction_date,
            reference_number, notes, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&tx.id)
    .bind(&tx.customer_id)
    .bind(tx.transaction_type)
    .bind(tx.amount_cents)
    .bind(tx.transaction_date)
    .bind(&tx.reference_number)
    .bind(&tx.notes)
    .bind(&tx.created_by)
    .bind(tx.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
