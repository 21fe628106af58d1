//! Read-only reports: low stock, at-risk customers, period reports and the
//! dashboard. Nothing here writes; every figure is derived from stored rows.

use tally_core::permissions::{customer_scope, Permission};
use tally_core::reports::{
    CustomerReport, DashboardMetrics, DateRange, InventoryMetrics, InventoryReport, RecentActivity,
};
use tally_core::{AtRiskCustomer, LowStockProduct, DASHBOARD_RECENT_LIMIT};

use super::{RequestContext, ServiceResult, Services};

pub struct ReportService<'a> {
    services: &'a Services,
}

impl<'a> ReportService<'a> {
    pub(crate) fn new(services: &'a Services) -> Self {
        ReportService { services }
    }

    /// Active products at or below their critical level, largest deficit
    /// first.
    pub async fn low_stock(&self, ctx: &RequestContext) -> ServiceResult<Vec<LowStockProduct>> {
        ctx.require(Permission::ReportView)?;
        Ok(self.services.db().products().low_stock().await?)
    }

    /// Active customers at or over their risk limit. Sales reps see only
    /// their own.
    pub async fn at_risk(&self, ctx: &RequestContext) -> ServiceResult<Vec<AtRiskCustomer>> {
        ctx.require(Permission::ReportView)?;
        let scope = customer_scope(ctx.user.role, &ctx.user.id);
        Ok(self.services.db().customers().at_risk(scope).await?)
    }

    /// Stock movements dated within `[start_date, end_date]`, with totals.
    pub async fn inventory(
        &self,
        ctx: &RequestContext,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> ServiceResult<InventoryReport> {
        ctx.require(Permission::ReportView)?;
        let range = DateRange::parse(start_date, end_date)?;

        let rows = self.services.db().inventory_transactions().report(&range).await?;
        Ok(InventoryReport::new(rows))
    }

    /// Balance movements dated within `[start_date, end_date]`, with totals.
    pub async fn customers(
        &self,
        ctx: &RequestContext,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> ServiceResult<CustomerReport> {
        ctx.require(Permission::ReportView)?;
        let range = DateRange::parse(start_date, end_date)?;
        let scope = customer_scope(ctx.user.role, &ctx.user.id);

        let rows = self
            .services
            .db()
            .customer_transactions()
            .report(&range, scope)
            .await?;
        Ok(CustomerReport::new(rows))
    }

    /// Headline counts and the latest activity.
    pub async fn dashboard(&self, ctx: &RequestContext) -> ServiceResult<DashboardMetrics> {
        ctx.require(Permission::ReportView)?;
        let db = self.services.db();
        let scope = customer_scope(ctx.user.role, &ctx.user.id);

        let products = db.products().metrics().await?;
        let customers = db.customers().metrics(scope).await?;
        let total_value_cents = db.products().inventory_value_cents().await?;
        let inventory_transactions = db
            .inventory_transactions()
            .recent_detailed(DASHBOARD_RECENT_LIMIT)
            .await?;
        let customer_transactions = db
            .customer_transactions()
            .recent_detailed(DASHBOARD_RECENT_LIMIT, scope)
            .await?;

        Ok(DashboardMetrics {
            products,
            customers,
            inventory: InventoryMetrics { total_value_cents },
            recent_activity: RecentActivity {
                inventory_transactions,
                customer_transactions,
            },
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::service::ServiceError;
    use crate::test_support::{context, services};
    use chrono::Utc;
    use serde_json::json;
    use tally_core::input::{BalanceRequest, CustomerInput, ProductInput, StockRequest};
    use tally_core::Role;

    fn product(code: &str, stock: i64, critical: i64, unit_cost: &str) -> ProductInput {
        ProductInput {
            code: Some(code.to_string()),
            name: Some(format!("Product {code}")),
            category: Some("General".to_string()),
            unit: Some("pcs".to_string()),
            unit_cost: Some(json!(unit_cost)),
            critical_stock_level: Some(json!(critical)),
            current_stock: Some(json!(stock)),
            ..Default::default()
        }
    }

    fn customer(name: &str, risk_limit: &str) -> CustomerInput {
        CustomerInput {
            name: Some(name.to_string()),
            balance_risk_limit: Some(json!(risk_limit)),
            ..Default::default()
        }
    }

    fn movement(kind: &str, amount: &str) -> BalanceRequest {
        BalanceRequest {
            transaction_type: Some(kind.to_string()),
            amount: Some(json!(amount)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_inventory_report_and_dashboard() {
        let (svc, db) = services().await;
        let admin = context(&db, Role::Admin).await;

        let a = svc.products().create(&admin, &product("A", 10, 2, "1.50")).await.unwrap();
        svc.products().create(&admin, &product("B", 1, 5, "2.00")).await.unwrap();

        let out = StockRequest {
            transaction_type: Some("stock_out".to_string()),
            quantity: Some(json!(4)),
            ..Default::default()
        };
        svc.products().adjust_stock(&admin, &a.id, &out).await.unwrap();

        let today = Utc::now().date_naive().to_string();
        let report = svc
            .reports()
            .inventory(&admin, Some(&today), Some(&today))
            .await
            .unwrap();
        assert_eq!(report.summary.total_transactions, 3);
        assert_eq!(report.summary.total_stock_out, 4);
        assert!(report.transactions.iter().any(|t| t.product_code == "A"));
        assert!(report
            .transactions
            .iter()
            .all(|t| t.created_by_name.as_deref() == Some(admin.user.name.as_str())));

        let low = svc.reports().low_stock(&admin).await.unwrap();
        assert_eq!(low[0].created_by_name.as_deref(), Some(admin.user.name.as_str()));

        let dashboard = svc.reports().dashboard(&admin).await.unwrap();
        assert_eq!(dashboard.products.total, 2);
        assert_eq!(dashboard.products.low_stock, 1);
        // 6 × 1.50 + 1 × 2.00
        assert_eq!(dashboard.inventory.total_value_cents, 1_100);
        assert_eq!(dashboard.recent_activity.inventory_transactions.len(), 3);
    }

    #[tokio::test]
    async fn test_customer_report_and_at_risk_are_scoped() {
        let (svc, db) = services().await;
        let rep_a = context(&db, Role::SalesRep).await;
        let rep_b = context(&db, Role::SalesRep).await;

        let a = svc.customers().create(&rep_a, &customer("A", "100")).await.unwrap();
        let b = svc.customers().create(&rep_b, &customer("B", "100")).await.unwrap();

        svc.customers()
            .record_transaction(&rep_a, &a.id, &movement("sale", "150"))
            .await
            .unwrap();
        svc.customers()
            .record_transaction(&rep_a, &a.id, &movement("credit_note", "20"))
            .await
            .unwrap();
        svc.customers()
            .record_transaction(&rep_b, &b.id, &movement("sale", "500"))
            .await
            .unwrap();

        let report = svc.reports().customers(&rep_a, None, None).await.unwrap();
        assert_eq!(report.summary.total_transactions, 2);
        assert_eq!(report.summary.total_sales_cents, 15_000);
        assert_eq!(report.summary.net_outstanding_cents, 13_000);
        assert!(report.transactions.iter().all(|t| t.customer_code == a.code));
        assert!(report.transactions.iter().all(|t| {
            t.sales_rep_name.as_deref() == Some(rep_a.user.name.as_str())
                && t.created_by_name.as_deref() == Some(rep_a.user.name.as_str())
        }));

        let at_risk = svc.reports().at_risk(&rep_a).await.unwrap();
        assert_eq!(at_risk.len(), 1);
        assert_eq!(at_risk[0].customer.id, a.id);
        assert_eq!(at_risk[0].over_limit_cents, 3_000);
        assert_eq!(at_risk[0].sales_rep_name.as_deref(), Some(rep_a.user.name.as_str()));
        assert_eq!(at_risk[0].created_by_name.as_deref(), Some(rep_a.user.name.as_str()));

        let dashboard = svc.reports().dashboard(&rep_b).await.unwrap();
        assert_eq!(dashboard.customers.total, 1);
        assert_eq!(dashboard.customers.total_outstanding_cents, 50_000);
    }

    #[tokio::test]
    async fn test_bad_date_range() {
        let (svc, db) = services().await;
        let viewer = context(&db, Role::Viewer).await;

        let err = svc
            .reports()
            .inventory(&viewer, Some("2024-02-01"), Some("2024-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = svc
            .reports()
            .inventory(&viewer, Some("01/02/2024"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
