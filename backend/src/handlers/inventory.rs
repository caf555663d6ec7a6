//! HTTP handlers for stocktaking

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use shared::{NewInventory, Page};
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::CursorQuery;
use crate::middleware::CurrentUser;
use crate::services::inventory::{Inventory, InventoryReport, InventoryService, InventorySnapshot};
use crate::AppState;

/// Record a physical count
pub async fn do_inventory(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewInventory>,
) -> AppResult<(StatusCode, Json<InventoryReport>)> {
    let service = InventoryService::new(state.db, state.config);
    let report = service.do_inventory(&current_user.0, input).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn list_inventories(
    State(state): State<AppState>,
    Query(query): Query<CursorQuery>,
) -> AppResult<Json<Page<Inventory>>> {
    let page = query.page(&state.config.pagination)?;
    let service = InventoryService::new(state.db, state.config);
    Ok(Json(service.list_inventories(page).await?))
}

pub async fn get_inventory_products(
    State(state): State<AppState>,
    Path(inventory_id): Path<Uuid>,
) -> AppResult<Json<Vec<InventorySnapshot>>> {
    let service = InventoryService::new(state.db, state.config);
    Ok(Json(service.get_inventory_products(inventory_id).await?))
}

/// Snapshots of one count as a CSV download
pub async fn export_inventory_products(
    State(state): State<AppState>,
    Path(inventory_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = InventoryService::new(state.db, state.config);
    let csv = service.export_csv(inventory_id).await?;
    let disposition = format!("attachment; filename=\"inventory-{}.csv\"", inventory_id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
