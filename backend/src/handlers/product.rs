//! HTTP handlers for ledger reads

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::Page;
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::CursorQuery;
use crate::services::catalog::{CatalogService, ProductStock, StockMovement, UnitPrice};
use crate::AppState;

pub async fn get_product_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductStock>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.get_stock(product_id).await?))
}

pub async fn get_product_price(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<UnitPrice>> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.unit_price(product_id).await?))
}

/// Stock movement journal of one product, newest first
pub async fn list_product_movements(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<CursorQuery>,
) -> AppResult<Json<Page<StockMovement>>> {
    let page = query.page(&state.config.pagination)?;
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_movements(product_id, page).await?))
}
