//! Route definitions for the stock settlement server

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{
    handlers,
    middleware::{auth_middleware, optional_auth_middleware, require_staff},
    AppState,
};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Checkout (anyone) and order administration (staff)
        .nest("/orders", checkout_routes(state.clone()).merge(order_routes(state.clone())))
        // Customer's own data
        .nest("/me", me_routes(state.clone()))
        // Staff routes - supplier deliveries
        .nest("/supplies", supply_routes(state.clone()))
        // Staff routes - stocktaking
        .nest("/inventories", inventory_routes(state.clone()))
        // Staff routes - ledger reads
        .nest("/products", product_routes(state))
}

/// Order placement; a bearer token is optional
fn checkout_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_order))
        .route_layer(middleware::from_fn_with_state(state, optional_auth_middleware))
}

/// Order administration routes (staff)
fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders))
        .route("/:order_id", get(handlers::get_order))
        .route("/:order_id/process", post(handlers::process_order))
        .route("/:order_id/complete", post(handlers::complete_order))
        .route_layer(middleware::from_fn(require_staff))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Authenticated customer routes
fn me_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", get(handlers::list_my_orders))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Supply routes (staff)
fn supply_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_supplies).post(handlers::create_supply))
        .route(
            "/:supply_id",
            get(handlers::get_supply).delete(handlers::delete_supply),
        )
        .route_layer(middleware::from_fn(require_staff))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Inventory routes (staff)
fn inventory_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_inventories).post(handlers::do_inventory),
        )
        .route("/:inventory_id/products", get(handlers::get_inventory_products))
        .route(
            "/:inventory_id/products/export",
            get(handlers::export_inventory_products),
        )
        .route_layer(middleware::from_fn(require_staff))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Product ledger routes (staff)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:product_id/price", get(handlers::get_product_price))
        .route("/:product_id/stock", get(handlers::get_product_stock))
        .route("/:product_id/movements", get(handlers::list_product_movements))
        .route_layer(middleware::from_fn(require_staff))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
