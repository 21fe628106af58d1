//! `/api/customers`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Router};
use tally_core::input::{BalanceRequest, CustomerInput};
use tally_core::{
    AtRiskCustomer, BalanceMovement, Customer, CustomerTransaction, CustomerWithHistory, Page,
    PageRequest,
};
use tally_db::service::customers::CustomerQuery;
use tally_db::RequestContext;

use crate::error::{ApiResponse, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/customers", get(list_customers).post(create_customer))
        .route("/api/customers/at-risk", get(at_risk))
        .route(
            "/api/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route(
            "/api/customers/{id}/transactions",
            get(customer_history).post(record_transaction),
        )
}

async fn list_customers(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(query): ApiQuery<CustomerQuery>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<Customer>>> {
    let page = state.services.customers().list(&ctx, &query, &page).await?;
    Ok(ApiResponse::ok(page))
}

async fn create_customer(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(input): ApiJson<CustomerInput>,
) -> ApiResult<(StatusCode, ApiResponse<Customer>)> {
    let customer = state.services.customers().create(&ctx, &input).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(customer).with_message("Customer created successfully"),
    ))
}

async fn get_customer(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<CustomerWithHistory>> {
    let customer = state.services.customers().get(&ctx, &id).await?;
    Ok(ApiResponse::ok(customer))
}

async fn update_customer(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<CustomerInput>,
) -> ApiResult<ApiResponse<Customer>> {
    let customer = state.services.customers().update(&ctx, &id, &input).await?;
    Ok(ApiResponse::ok(customer).with_message("Customer updated successfully"))
}

async fn delete_customer(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Customer>> {
    let customer = state.services.customers().delete(&ctx, &id).await?;
    Ok(ApiResponse::ok(customer).with_message("Customer deleted successfully"))
}

async fn record_transaction(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<BalanceRequest>,
) -> ApiResult<(StatusCode, ApiResponse<BalanceMovement>)> {
    let movement = state
        .services
        .customers()
        .record_transaction(&ctx, &id, &request)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(movement).with_message("Transaction recorded successfully"),
    ))
}

async fn customer_history(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<CustomerTransaction>>> {
    let history = state.services.customers().history(&ctx, &id, &page).await?;
    Ok(ApiResponse::ok(history))
}

async fn at_risk(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<ApiResponse<Vec<AtRiskCustomer>>> {
    let customers = state.services.reports().at_risk(&ctx).await?;
    Ok(ApiResponse::ok(customers))
}
