//! `/api/products`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::post;
use axum::{Extension, Router};
use tally_core::input::{ProductInput, StockRequest};
use tally_core::{
    InventoryTransaction, LowStockProduct, Page, PageRequest, Product, ProductWithHistory,
    StockMovement,
};
use tally_db::service::products::ProductQuery;
use tally_db::RequestContext;

use crate::error::{ApiResponse, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/low-stock", get(low_stock))
        .route(
            "/api/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/api/products/{id}/stock", post(adjust_stock))
        .route("/api/products/{id}/transactions", get(product_history))
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(query): ApiQuery<ProductQuery>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<Product>>> {
    let page = state.services.products().list(&ctx, &query, &page).await?;
    Ok(ApiResponse::ok(page))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<(StatusCode, ApiResponse<Product>)> {
    let product = state.services.products().create(&ctx, &input).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(product).with_message("Product created successfully"),
    ))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<ProductWithHistory>> {
    let product = state.services.products().get(&ctx, &id).await?;
    Ok(ApiResponse::ok(product))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<ApiResponse<Product>> {
    let product = state.services.products().update(&ctx, &id, &input).await?;
    Ok(ApiResponse::ok(product).with_message("Product updated successfully"))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Product>> {
    let product = state.services.products().delete(&ctx, &id).await?;
    Ok(ApiResponse::ok(product).with_message("Product deleted successfully"))
}

async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<StockRequest>,
) -> ApiResult<ApiResponse<StockMovement>> {
    let movement = state
        .services
        .products()
        .adjust_stock(&ctx, &id, &request)
        .await?;
    Ok(ApiResponse::ok(movement).with_message("Stock adjusted successfully"))
}

async fn product_history(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<ApiResponse<Page<InventoryTransaction>>> {
    let history = state.services.products().history(&ctx, &id, &page).await?;
    Ok(ApiResponse::ok(history))
}

async fn low_stock(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<ApiResponse<Vec<LowStockProduct>>> {
    let products = state.services.reports().low_stock(&ctx).await?;
    Ok(ApiResponse::ok(products))
}
