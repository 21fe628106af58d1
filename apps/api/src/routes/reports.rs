//! Reports, the dashboard and the audit log.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Router};
use serde::Deserialize;
use tally_core::reports::{CustomerReport, DashboardMetrics, InventoryReport};
use tally_core::{AuditLogEntry, Page, PageRequest};
use tally_db::RequestContext;

use crate::error::{ApiResponse, ApiResult};
use crate::extract::ApiQuery;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/reports/inventory", get(inventory_report))
        .route("/api/reports/customers", get(customer_report))
        .route("/api/dashboard/metrics", get(dashboard))
        .route("/api/audit-logs", get(audit_logs))
}

/// `?start_date=YYYY-MM-DD&end_date=YYYY-MM-DD`, both inclusive.
#[derive(Debug, Default, Deserialize)]
struct PeriodParams {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuditParams {
    entity_type: Option<String>,
}

async fn inventory_report(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(period): ApiQuery<PeriodParams>,
) -> ApiResult<ApiResponse<InventoryReport>> {
    let report = state
        .services
        .reports()
        .inventory(&ctx, period.start_date.as_deref(), period.end_date.as_deref())
        .await?;
    Ok(ApiResponse::ok(report))
}

async fn customer_report(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(period): ApiQuery<PeriodParams>,
) -> ApiResult<ApiResponse<CustomerReport>> {
    let report = state
        .services
        .reports()
        .customers(&ctx, period.start_date.as_deref(), period.end_date.as_deref())
        .await?;
    Ok(ApiResponse::ok(report))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<ApiResponse<DashboardMetrics>> {
    let metrics = state.services.reports().dashboard(&ctx).await?;
    Ok(ApiResponse::ok(metrics))
}

async fn audit_logs(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(params): ApiQuery<AuditParams>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<AuditLogEntry>>> {
    let entries = state
        .services
        .audit_log()
        .list(&ctx, params.entity_type.as_deref(), &page)
        .await?;
    Ok(ApiResponse::ok(entries))
}
