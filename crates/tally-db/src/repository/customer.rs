//! # Customer Repository
//!
//! Database operations for customers.
//!
//! Every list and aggregate query takes an optional owning-rep filter. A
//! sales rep's scope is applied in the `WHERE` clause, so rows belonging
//! to other reps are never loaded, counted or summed.
//!
//! `current_balance_cents` is written only by
//! [`LedgerEngine`](crate::ledger::LedgerEngine).

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{like_pattern, CustomerFilter};
use crate::error::{DbError, DbResult};
use tally_core::reports::CustomerMetrics;
use tally_core::{AtRiskCustomer, Customer, PageRequest};

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets a customer by its ID, regardless of status.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// Gets a customer by its business code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// Lists customers matching `filter`, newest first.
    pub async fn list(
        &self,
        filter: &CustomerFilter,
        page: &PageRequest,
    ) -> DbResult<(Vec<Customer>, i64)> {
        let pattern = like_pattern(filter.search.as_deref());

        debug!(
            search = ?pattern,
            status = ?filter.status,
            sales_rep = ?filter.sales_rep,
            page = page.page(),
            "Listing customers"
        );

        const WHERE: &str = r#"
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR sales_rep = ?2)
              AND (?3 IS NULL
                   OR name LIKE ?3 ESCAPE '\'
                   OR code LIKE ?3 ESCAPE '\'
                   OR email LIKE ?3 ESCAPE '\')
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM customers {WHERE}"))
            .bind(filter.status)
            .bind(filter.sales_rep.as_deref())
            .bind(pattern.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT * FROM customers {WHERE} ORDER BY created_at DESC, rowid DESC LIMIT ?4 OFFSET ?5"
        ))
        .bind(filter.status)
        .bind(filter.sales_rep.as_deref())
        .bind(pattern.as_deref())
        .bind(i64::from(page.limit()))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((customers, total))
    }

    /// Replaces a customer's descriptive fields, owning rep and status.
    ///
    /// `code` and `current_balance_cents` are never written.
    pub async fn update(&self, customer: &Customer) -> DbResult<Customer> {
        debug!(id = %customer.id, "Updating customer");

        let updated = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers SET
                name = ?2,
                contact_person = ?3,
                email = ?4,
                phone = ?5,
                address = ?6,
                city = ?7,
                region = ?8,
                country = ?9,
                sales_rep = ?10,
                payment_terms_limit = ?11,
                balance_risk_limit_cents = ?12,
                status = ?13,
                updated_at = ?14
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.contact_person)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.region)
        .bind(&customer.country)
        .bind(&customer.sales_rep)
        .bind(customer.payment_terms_limit)
        .bind(customer.balance_risk_limit_cents)
        .bind(customer.status)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| DbError::not_found("Customer", &customer.id))
    }

    /// Soft-deletes a customer. Its balance is frozen from here on.
    pub async fn soft_delete(&self, id: &str) -> DbResult<Customer> {
        debug!(id = %id, "Soft-deleting customer");

        let updated = sqlx::query_as::<_, Customer>(
            "UPDATE customers SET status = 'inactive', updated_at = ?2 WHERE id = ?1 RETURNING *",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Active customers whose balance has reached their risk limit,
    /// furthest over first.
    ///
    /// ## Arguments
    /// * `sales_rep` - restrict to one owning rep (sales rep callers)
    pub async fn at_risk(&self, sales_rep: Option<&str>) -> DbResult<Vec<AtRiskCustomer>> {
        let customers = sqlx::query_as::<_, AtRiskCustomer>(
            r#"
            SELECT c.*, c.current_balance_cents - c.balance_risk_limit_cents AS over_limit_cents,
                   s.name AS sales_rep_name, u.name AS created_by_name
            FROM customers c
            LEFT JOIN users s ON s.id = c.sales_rep
            LEFT JOIN users u ON u.id = c.created_by
            WHERE c.status = 'active'
              AND c.current_balance_cents >= c.balance_risk_limit_cents
              AND (?1 IS NULL OR c.sales_rep = ?1)
            ORDER BY over_limit_cents DESC, c.code ASC
            "#,
        )
        .bind(sales_rep)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = customers.len(), "At-risk query returned customers");
        Ok(customers)
    }

    /// Customer counts and outstanding total for the dashboard.
    pub async fn metrics(&self, sales_rep: Option<&str>) -> DbResult<CustomerMetrics> {
        let (total, active, at_risk, total_outstanding_cents): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(status = 'active'), 0),
                    COALESCE(SUM(status = 'active'
                                 AND current_balance_cents >= balance_risk_limit_cents), 0),
                    COALESCE(SUM(CASE WHEN status = 'active' THEN current_balance_cents END), 0)
                FROM customers
                WHERE (?1 IS NULL OR sales_rep = ?1)
                "#,
            )
            .bind(sales_rep)
            .fetch_one(&self.pool)
            .await?;

        Ok(CustomerMetrics {
            total,
            active,
            at_risk,
            total_outstanding_cents,
        })
    }

    /// Counts all customers (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================

/// Inserts a customer on an open connection or transaction.
pub(crate) async fn insert_in(conn: &mut SqliteConnection, customer: &Customer) -> DbResult<()> {
    debug!(code = %customer.code, "Inserting customer");

    sqlx::query(
        r#"
        INSERT INTO customers (
            id, code, name, contact_person, email, phone,
            address, city, region, country, sales_rep,
            payment_terms_limit, balance_risk_limit_cents, current_balance_cents,
            status, created_by, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10, ?11,
            ?12, ?13, ?14,
            ?15, ?16, ?17, ?18
        )
        "#,
    )
    .bind(&customer.id)
    .bind(&customer.code)
    .bind(&customer.name)
    .bind(&customer.contact_person)
    .bind(&customer.email)
    .bind(&customer.phone)
    .bind(&customer.address)
    .bind(&customer.city)
    .bind(&customer.region)
    .bind(&customer.country)
    .bind(&customer.sales_rep)
    .bind(customer.payment_terms_limit)
    .bind(customer.balance_risk_limit_cents)
    .bind(customer.current_balance_cents)
    .bind(customer.status)
    .bind(&customer.created_by)
    .bind(customer.created_at)
    .bind(customer.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &customer.code),
        other => other,
    })?;

    Ok(())
}

/// Takes the write lock on a customer row and returns its current state.
///
/// See [`super::product::lock_in`].
pub(crate) async fn lock_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        "UPDATE customers SET updated_at = ?2 WHERE id = ?1 RETURNING *",
    )
    .bind(id)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(customer)
}

/// Writes a new balance on a locked row.
pub(crate) async fn set_balance_in(
    conn: &mut SqliteConnection,
    id: &str,
    balance_cents: i64,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE customers SET current_balance_cents = ?2 WHERE id = ?1")
        .bind(id)
        .bind(balance_cents)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Customer", id));
    }

    Ok(())
}

/// Helper to generate a new customer ID.
pub fn generate_customer_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
