//! HTTP handlers for checkout and order processing

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{NewOrder, OrderStatus, Page};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::CursorQuery;
use crate::middleware::{CurrentUser, MaybeUser};
use crate::services::order::{CreatedOrder, OrderDetail, OrderService, OrderSummary};
use crate::AppState;

/// `GET /orders` filters
#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

/// Place an order; the caller may be anonymous
pub async fn create_order(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(input): Json<NewOrder>,
) -> AppResult<(StatusCode, Json<CreatedOrder>)> {
    let service = OrderService::new(state.db, state.config);
    let order = service.create_order(user.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn process_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db, state.config);
    Ok(Json(service.process_order(order_id).await?))
}

pub async fn complete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db, state.config);
    Ok(Json(service.complete_order(order_id).await?))
}

/// Admin order list, optionally by status
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<Page<OrderSummary>>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<OrderStatus>())
        .transpose()
        .map_err(|msg| AppError::validation("status", msg))?;
    let page = CursorQuery {
        cursor: query.cursor,
        limit: query.limit,
    }
    .page(&state.config.pagination)?;

    let service = OrderService::new(state.db, state.config);
    Ok(Json(service.list_admin_orders(status, page).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db, state.config);
    Ok(Json(service.get_order(order_id).await?))
}

/// Orders of the authenticated customer
pub async fn list_my_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<CursorQuery>,
) -> AppResult<Json<Page<OrderSummary>>> {
    let page = query.page(&state.config.pagination)?;
    let service = OrderService::new(state.db, state.config);
    Ok(Json(
        service.list_user_orders(current_user.0.user_id, page).await?,
    ))
}
