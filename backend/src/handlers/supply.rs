//! HTTP handlers for supplier deliveries

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{NewSupply, Page};
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::CursorQuery;
use crate::middleware::CurrentUser;
use crate::services::supply::{SupplyDetail, SupplyInfo, SupplyService};
use crate::AppState;

/// Record a delivery and add it to stock
pub async fn create_supply(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewSupply>,
) -> AppResult<(StatusCode, Json<SupplyDetail>)> {
    let service = SupplyService::new(state.db, state.config);
    let supply = service.create_supply(&current_user.0, input).await?;
    Ok((StatusCode::CREATED, Json(supply)))
}

/// Delete a delivery and take it back out of stock
pub async fn delete_supply(
    State(state): State<AppState>,
    Path(supply_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = SupplyService::new(state.db, state.config);
    service.delete_supply(supply_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_supplies(
    State(state): State<AppState>,
    Query(query): Query<CursorQuery>,
) -> AppResult<Json<Page<SupplyInfo>>> {
    let page = query.page(&state.config.pagination)?;
    let service = SupplyService::new(state.db, state.config);
    Ok(Json(service.list_supplies(page).await?))
}

pub async fn get_supply(
    State(state): State<AppState>,
    Path(supply_id): Path<Uuid>,
) -> AppResult<Json<SupplyDetail>> {
    let service = SupplyService::new(state.db, state.config);
    Ok(Json(service.get_supply(supply_id).await?))
}
