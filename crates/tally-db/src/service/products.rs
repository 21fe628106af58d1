//! Product operations: CRUD, stock movements and history.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::{status_filter, RequestContext, ServiceError, ServiceResult, Services};
use crate::audit::AuditEvent;
use crate::ledger::LedgerError;
use crate::repository::product::generate_product_id;
use crate::repository::ProductFilter;
use tally_core::codes::{generate_code, PRODUCT_CODE_PREFIX};
use tally_core::input::{ProductInput, StockRequest};
use tally_core::permissions::Permission;
use tally_core::{
    AuditAction, AuditEntityType, InventoryTransaction, Page, PageRequest, Product,
    ProductWithHistory, StockMovement, RECENT_TRANSACTIONS_LIMIT,
};

const MAX_CODE_ATTEMPTS: u32 = 3;

/// Query-string filters for product listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    /// `active` (default), `inactive` or `all`.
    pub status: Option<String>,
}

pub struct ProductService<'a> {
    services: &'a Services,
}

impl<'a> ProductService<'a> {
    pub(crate) fn new(services: &'a Services) -> Self {
        ProductService { services }
    }

    /// Creates a product, recording any opening stock through the ledger.
    pub async fn create(&self, ctx: &RequestContext, input: &ProductInput) -> ServiceResult<Product> {
        ctx.require(Permission::ProductCreate)?;
        let draft = input.validate()?;

        let now = Utc::now();
        let mut product = Product {
            id: generate_product_id(),
            code: draft
                .code
                .clone()
                .unwrap_or_else(|| generate_code(PRODUCT_CODE_PREFIX)),
            name: draft.name,
            brand: draft.brand,
            category: draft.category,
            unit: draft.unit,
            unit_cost_cents: draft.unit_cost.cents(),
            selling_price_cents: draft.selling_price.cents(),
            current_stock: 0,
            critical_stock_level: draft.critical_stock_level,
            status: draft.status.unwrap_or_default(),
            created_by: Some(ctx.user.id.clone()),
            created_at: now,
            updated_at: now,
        };

        // A generated code may collide; an explicit one is the caller's problem.
        let mut attempts = 0;
        let (product, opening) = loop {
            attempts += 1;
            let result = self
                .services
                .db()
                .ledger()
                .create_product(product.clone(), draft.opening_stock)
                .await;

            match result {
                Ok(created) => break created,
                Err(LedgerError::Database(e)) => {
                    match ServiceError::from_insert(e, "products.code", "Product") {
                        ServiceError::DuplicateCode { .. }
                            if draft.code.is_none() && attempts < MAX_CODE_ATTEMPTS =>
                        {
                            product.code = generate_code(PRODUCT_CODE_PREFIX);
                        }
                        other => return Err(other),
                    }
                }
                Err(other) => return Err(other.into()),
            }
        };

        self.services
            .record(
                ctx,
                AuditEvent::entity_change(
                    AuditAction::Create,
                    AuditEntityType::Product,
                    &product.id,
                    None,
                    Some(&product),
                ),
            )
            .await;

        if let Some(tx) = opening {
            self.services
                .record(
                    ctx,
                    AuditEvent::ledger(
                        AuditAction::StockAdjustment,
                        AuditEntityType::InventoryTransaction,
                        &tx.id,
                        &tx,
                    ),
                )
                .await;
        }

        Ok(product)
    }

    /// A product with its most recent stock movements.
    pub async fn get(&self, ctx: &RequestContext, id: &str) -> ServiceResult<ProductWithHistory> {
        ctx.require(Permission::ProductRead)?;
        let product = self.load(id).await?;

        let recent_transactions = self
            .services
            .db()
            .inventory_transactions()
            .recent_for_product(id, RECENT_TRANSACTIONS_LIMIT)
            .await?;

        Ok(ProductWithHistory {
            product,
            recent_transactions,
        })
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        query: &ProductQuery,
        page: &PageRequest,
    ) -> ServiceResult<Page<Product>> {
        ctx.require(Permission::ProductRead)?;

        let filter = ProductFilter {
            search: query.search.clone(),
            category: query.category.clone(),
            status: status_filter(query.status.as_deref())?,
        };

        let (items, total) = self.services.db().products().list(&filter, page).await?;
        Ok(Page::new(items, page, total))
    }

    /// Replaces descriptive fields. Code and stock never change here;
    /// status changes only when given.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        input: &ProductInput,
    ) -> ServiceResult<Product> {
        ctx.require(Permission::ProductUpdate)?;
        let draft = input.validate()?;
        let old = self.load(id).await?;

        let changed = Product {
            name: draft.name,
            brand: draft.brand,
            category: draft.category,
            unit: draft.unit,
            unit_cost_cents: draft.unit_cost.cents(),
            selling_price_cents: draft.selling_price.cents(),
            critical_stock_level: draft.critical_stock_level,
            status: draft.status.unwrap_or(old.status),
            ..old.clone()
        };

        let updated = self.services.db().products().update(&changed).await?;

        self.services
            .record(
                ctx,
                AuditEvent::entity_change(
                    AuditAction::Update,
                    AuditEntityType::Product,
                    id,
                    Some(&old),
                    Some(&updated),
                ),
            )
            .await;

        Ok(updated)
    }

    /// Soft delete.
    pub async fn delete(&self, ctx: &RequestContext, id: &str) -> ServiceResult<Product> {
        ctx.require(Permission::ProductDelete)?;
        let old = self.load(id).await?;

        let deleted = self.services.db().products().soft_delete(id).await?;
        info!(product_id = %id, user_id = %ctx.user.id, "Product deactivated");

        self.services
            .record(
                ctx,
                AuditEvent::entity_change(
                    AuditAction::Delete,
                    AuditEntityType::Product,
                    id,
                    Some(&old),
                    Some(&deleted),
                ),
            )
            .await;

        Ok(deleted)
    }

    /// Applies one stock movement.
    pub async fn adjust_stock(
        &self,
        ctx: &RequestContext,
        id: &str,
        request: &StockRequest,
    ) -> ServiceResult<StockMovement> {
        ctx.require(Permission::ProductStockAdjust)?;
        let entry = request.validate()?;

        let movement = self
            .services
            .db()
            .ledger()
            .apply_inventory_transaction(id, &entry, Some(&ctx.user.id))
            .await?;

        self.services
            .record(
                ctx,
                AuditEvent::ledger(
                    AuditAction::StockAdjustment,
                    AuditEntityType::InventoryTransaction,
                    &movement.transaction.id,
                    &movement.transaction,
                ),
            )
            .await;

        Ok(movement)
    }

    /// A product's stock movements, newest first.
    pub async fn history(
        &self,
        ctx: &RequestContext,
        id: &str,
        page: &PageRequest,
    ) -> ServiceResult<Page<InventoryTransaction>> {
        ctx.require(Permission::ProductRead)?;
        self.load(id).await?;

        let (items, total) = self
            .services
            .db()
            .inventory_transactions()
            .history_for_product(id, page)
            .await?;

        Ok(Page::new(items, page, total))
    }

    async fn load(&self, id: &str) -> ServiceResult<Product> {
        self.services
            .db()
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, services};
    use serde_json::json;
    use tally_core::{EntityStatus, InventoryTransactionType, Role};

    fn input(code: Option<&str>, stock: i64) -> ProductInput {
        ProductInput {
            code: code.map(str::to_string),
            name: Some("Hex bolt M8".to_string()),
            brand: Some("Acme".to_string()),
            category: Some("Fasteners".to_string()),
            unit: Some("pcs".to_string()),
            unit_cost: Some(json!("0.25")),
            selling_price: Some(json!(0.4)),
            critical_stock_level: Some(json!(10)),
            current_stock: Some(json!(stock)),
            status: None,
        }
    }

    fn stock_request(kind: &str, quantity: i64) -> StockRequest {
        StockRequest {
            transaction_type: Some(kind.to_string()),
            quantity: Some(json!(quantity)),
            reference_number: Some("PO-1".to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_with_opening_stock_and_audit() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;

        let product = svc.products().create(&admin, &input(None, 25)).await.unwrap();
        assert!(product.code.starts_with(PRODUCT_CODE_PREFIX));
        assert_eq!(product.current_stock, 25);
        assert_eq!(product.unit_cost_cents, 25);
        assert_eq!(product.selling_price_cents, 40);

        let with_history = svc.products().get(&admin, &product.id).await.unwrap();
        assert_eq!(with_history.recent_transactions.len(), 1);
        assert_eq!(
            with_history.recent_transactions[0].transaction_type,
            InventoryTransactionType::Adjustment
        );

        let audit = db.audit_logs().count().await.unwrap();
        assert_eq!(audit, 2);
    }

    #[tokio::test]
    async fn test_duplicate_code() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;

        svc.products().create(&admin, &input(Some("BOLT-8"), 0)).await.unwrap();
        let err = svc
            .products()
            .create(&admin, &input(Some("BOLT-8"), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateCode { ref code, .. } if code == "BOLT-8"));
    }

    #[tokio::test]
    async fn test_permissions_by_role() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;
        let rep = context(&db, Role::SalesRep).await;
        let viewer = context(&db, Role::Viewer).await;
        let manager = context(&db, Role::Manager).await;

        let product = svc.products().create(&admin, &input(None, 5)).await.unwrap();

        assert!(matches!(
            svc.products().create(&viewer, &input(None, 0)).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.products()
                .adjust_stock(&rep, &product.id, &stock_request("stock_in", 1))
                .await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.products().delete(&manager, &product.id).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(svc.products().get(&viewer, &product.id).await.is_ok());

        let movement = svc
            .products()
            .adjust_stock(&manager, &product.id, &stock_request("stock_in", 5))
            .await
            .unwrap();
        assert_eq!(movement.new_stock, 10);
    }

    #[tokio::test]
    async fn test_stock_errors() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;
        let product = svc.products().create(&admin, &input(None, 5)).await.unwrap();

        let err = svc
            .products()
            .adjust_stock(&admin, &product.id, &stock_request("stock_out", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientStock { available: 5, .. }));

        let err = svc
            .products()
            .adjust_stock(&admin, &product.id, &stock_request("stock_in", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = svc
            .products()
            .adjust_stock(&admin, "missing", &stock_request("stock_in", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));

        svc.products().delete(&admin, &product.id).await.unwrap();
        let err = svc
            .products()
            .adjust_stock(&admin, &product.id, &stock_request("stock_in", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Inactive { .. }));
    }

    #[tokio::test]
    async fn test_bad_body_rejected_before_product_lookup() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;

        let mut change = input(None, 0);
        change.name = None;
        let err = svc
            .products()
            .update(&admin, "no-such-id", &change)
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => assert!(errors.get("name").is_some()),
            other => panic!("unexpected {other:?}"),
        }

        let err = svc
            .products()
            .adjust_stock(&admin, "no-such-id", &stock_request("stock_in", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_stock_and_can_reactivate() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;
        let product = svc.products().create(&admin, &input(None, 7)).await.unwrap();
        svc.products().delete(&admin, &product.id).await.unwrap();

        let mut change = input(None, 999);
        change.name = Some("Hex bolt M8 zinc".to_string());
        change.status = Some("active".to_string());

        let updated = svc
            .products()
            .update(&admin, &product.id, &change)
            .await
            .unwrap();
        assert_eq!(updated.name, "Hex bolt M8 zinc");
        assert_eq!(updated.current_stock, 7);
        assert_eq!(updated.code, product.code);
        assert_eq!(updated.status, EntityStatus::Active);
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_undo_stock_movement() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;
        let product = svc.products().create(&admin, &input(None, 5)).await.unwrap();

        sqlx::query("DROP TABLE audit_logs")
            .execute(db.pool())
            .await
            .unwrap();

        let movement = svc
            .products()
            .adjust_stock(&admin, &product.id, &stock_request("stock_in", 3))
            .await
            .unwrap();
        assert_eq!(movement.new_stock, 8);

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 8);
    }

    #[tokio::test]
    async fn test_list_defaults_to_active() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;

        let a = svc.products().create(&admin, &input(None, 0)).await.unwrap();
        svc.products().create(&admin, &input(None, 0)).await.unwrap();
        svc.products().delete(&admin, &a.id).await.unwrap();

        let page = svc
            .products()
            .list(&admin, &ProductQuery::default(), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 1);

        let all = ProductQuery {
            status: Some("all".to_string()),
            ..Default::default()
        };
        let page = svc
            .products()
            .list(&admin, &all, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 2);
    }
}
