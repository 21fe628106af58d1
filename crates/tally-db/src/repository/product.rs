//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Lookup by id or code
//! - Filtered, paginated listing (search over name/code/brand)
//! - Descriptive updates and soft delete
//! - Low-stock query and dashboard counts
//!
//! Stock is never written here. `current_stock` changes only through
//! [`LedgerEngine`](crate::ledger::LedgerEngine), which records a matching
//! inventory transaction in the same database transaction.
//!
//! ## Low Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Low-Stock Ordering                                   │
//! │                                                                         │
//! │  code     stock  critical  deficit                                     │
//! │  ───────  ─────  ────────  ───────                                     │
//! │  PRD-A        0        20       20   ← most urgent first               │
//! │  PRD-B        3        10        7                                     │
//! │  PRD-C        5         5        0   ← at the threshold still counts   │
//! │  PRD-D        9         5        -   (not low)                         │
//! │  PRD-E        0        50        -   (inactive: excluded)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{like_pattern, ProductFilter};
use crate::error::{DbError, DbResult};
use tally_core::reports::ProductMetrics;
use tally_core::{LowStockProduct, PageRequest, Product};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.get_by_id("uuid-here").await?;
/// let (items, total) = repo.list(&ProductFilter::default(), &PageRequest::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found (active or not)
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its business code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists products matching `filter`, newest first.
    ///
    /// ## Returns
    /// The requested page and the total number of matching rows.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: &PageRequest,
    ) -> DbResult<(Vec<Product>, i64)> {
        let pattern = like_pattern(filter.search.as_deref());
        let category = filter
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        debug!(
            search = ?pattern,
            category = ?category,
            status = ?filter.status,
            page = page.page(),
            "Listing products"
        );

        const WHERE: &str = r#"
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR category = ?2)
              AND (?3 IS NULL
                   OR name LIKE ?3 ESCAPE '\'
                   OR code LIKE ?3 ESCAPE '\'
                   OR brand LIKE ?3 ESCAPE '\')
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products {WHERE}"))
            .bind(filter.status)
            .bind(category)
            .bind(pattern.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT * FROM products {WHERE} ORDER BY created_at DESC, rowid DESC LIMIT ?4 OFFSET ?5"
        ))
        .bind(filter.status)
        .bind(category)
        .bind(pattern.as_deref())
        .bind(i64::from(page.limit()))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((products, total))
    }

    /// Updates a product's descriptive fields and status.
    ///
    /// `code`, `current_stock` and `created_*` are never written.
    ///
    /// ## Returns
    /// * `Ok(Product)` - the row as stored after the update
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, "Updating product");

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                name = ?2,
                brand = ?3,
                category = ?4,
                unit = ?5,
                unit_cost_cents = ?6,
                selling_price_cents = ?7,
                critical_stock_level = ?8,
                status = ?9,
                updated_at = ?10
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(&product.unit)
        .bind(product.unit_cost_cents)
        .bind(product.selling_price_cents)
        .bind(product.critical_stock_level)
        .bind(product.status)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| DbError::not_found("Product", &product.id))
    }

    /// Soft-deletes a product by setting status = 'inactive'.
    ///
    /// Its stock is frozen from here on: the ledger rejects transactions
    /// against inactive products.
    pub async fn soft_delete(&self, id: &str) -> DbResult<Product> {
        debug!(id = %id, "Soft-deleting product");

        let updated = sqlx::query_as::<_, Product>(
            "UPDATE products SET status = 'inactive', updated_at = ?2 WHERE id = ?1 RETURNING *",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Active products at or below their critical level, largest deficit first.
    pub async fn low_stock(&self) -> DbResult<Vec<LowStockProduct>> {
        let products = sqlx::query_as::<_, LowStockProduct>(
            r#"
            SELECT p.*, p.critical_stock_level - p.current_stock AS deficit,
                   u.name AS created_by_name
            FROM products p
            LEFT JOIN users u ON u.id = p.created_by
            WHERE p.status = 'active'
              AND p.current_stock <= p.critical_stock_level
            ORDER BY deficit DESC, p.code ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Low-stock query returned products");
        Ok(products)
    }

    /// Product counts for the dashboard.
    pub async fn metrics(&self) -> DbResult<ProductMetrics> {
        let (total, active, low_stock): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(status = 'active'), 0),
                COALESCE(SUM(status = 'active' AND current_stock <= critical_stock_level), 0)
            FROM products
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ProductMetrics {
            total,
            active,
            low_stock,
        })
    }

    /// Σ `current_stock × unit_cost` over active products, in cents.
    pub async fn inventory_value_cents(&self) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(current_stock * unit_cost_cents), 0) FROM products WHERE status = 'active'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }

    /// Counts all products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================

/// Inserts a product on an open connection or transaction.
///
/// Used by the ledger engine so that opening stock is recorded in the same
/// transaction as the product row.
///
/// ## Returns
/// * `Err(DbError::UniqueViolation)` - code already exists
pub(crate) async fn insert_in(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    debug!(code = %product.code, "Inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (
            id, code, name, brand, category, unit,
            unit_cost_cents, selling_price_cents,
            current_stock, critical_stock_level, status,
            created_by, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8,
            ?9, ?10, ?11,
            ?12, ?13, ?14
        )
        "#,
    )
    .bind(&product.id)
    .bind(&product.code)
    .bind(&product.name)
    .bind(&product.brand)
    .bind(&product.category)
    .bind(&product.unit)
    .bind(product.unit_cost_cents)
    .bind(product.selling_price_cents)
    .bind(product.current_stock)
    .bind(product.critical_stock_level)
    .bind(product.status)
    .bind(&product.created_by)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &product.code),
        other => other,
    })?;

    Ok(())
}

/// Takes the write lock on a product row and returns its current state.
///
/// The `UPDATE` is the first write of the enclosing transaction, so SQLite
/// grants the database write lock before the row is read. Nobody else can
/// change `current_stock` until this transaction ends.
pub(crate) async fn lock_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET updated_at = ?2 WHERE id = ?1 RETURNING *",
    )
    .bind(id)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

/// Writes a new stock value on a locked row.
pub(crate) async fn set_stock_in(conn: &mut SqliteConnection, id: &str, stock: i64) -> DbResult<()> {
    let result = sqlx::query("UPDATE products SET current_stock = ?2 WHERE id = ?1")
        .bind(id)
        .bind(stock)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", id));
    }

    Ok(())
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::test_support::{insert_product, insert_product_with};
    use tally_core::EntityStatus;

    #[tokio::test]
    async fn test_get_and_update_keeps_stock_and_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = insert_product_with(&db, "PRD-1", 10, 5).await;
        let mut changed = product.clone();
        changed.name = "Renamed".to_string();
        changed.code = "SHOULD-NOT-APPLY".to_string();
        changed.current_stock = 999;

        let updated = repo.update(&changed).await.unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.code, "PRD-1");
        assert_eq!(updated.current_stock, 10);

        let by_code = repo.get_by_code("PRD-1").await.unwrap().unwrap();
        assert_eq!(by_code.id, product.id);
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut product = insert_product(&db, "PRD-1").await;
        product.id = "missing".to_string();

        let err = db.products().update(&product).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert_product(&db, "PRD-1").await;

        let mut dup = insert_product(&db, "PRD-2").await;
        dup.id = generate_product_id();
        dup.code = "PRD-1".to_string();

        let mut conn = db.pool().acquire().await.unwrap();
        let err = insert_in(&mut conn, &dup).await.unwrap_err();
        assert!(err.is_unique_violation_on("products.code"));
    }

    #[tokio::test]
    async fn test_list_filters_and_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        insert_product(&db, "BOLT-1").await;
        insert_product(&db, "NUT-1").await;
        let bolt2 = insert_product(&db, "BOLT-2").await;
        let retired = insert_product(&db, "BOLT-3").await;
        repo.soft_delete(&retired.id).await.unwrap();

        let filter = ProductFilter {
            search: Some("bolt".to_string()),
            status: Some(EntityStatus::Active),
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, &PageRequest::default()).await.unwrap();
        assert_eq!(total, 2);
        // Newest first
        assert_eq!(items[0].id, bolt2.id);
        assert_eq!(items[1].code, "BOLT-1");

        let (_, any_status) = repo
            .list(
                &ProductFilter {
                    search: Some("bolt".to_string()),
                    ..Default::default()
                },
                &PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(any_status, 3);

        let (page, total) = repo
            .list(&ProductFilter::default(), &PageRequest::new(2, 3))
            .await
            .unwrap();
        assert_eq!(total, 4);
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn test_low_stock_ordering() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        insert_product_with(&db, "PRD-B", 3, 10).await;
        insert_product_with(&db, "PRD-A", 0, 20).await;
        insert_product_with(&db, "PRD-C", 5, 5).await;
        insert_product_with(&db, "PRD-D", 9, 5).await;
        let inactive = insert_product_with(&db, "PRD-E", 0, 50).await;
        repo.soft_delete(&inactive.id).await.unwrap();

        let low = repo.low_stock().await.unwrap();
        let codes: Vec<_> = low.iter().map(|p| p.product.code.as_str()).collect();
        assert_eq!(codes, vec!["PRD-A", "PRD-B", "PRD-C"]);
        assert_eq!(low[0].deficit, 20);
        assert_eq!(low[2].deficit, 0);

        let metrics = repo.metrics().await.unwrap();
        assert_eq!(metrics.total, 5);
        assert_eq!(metrics.active, 4);
        assert_eq!(metrics.low_stock, 3);
    }
}
