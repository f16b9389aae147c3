//! Route definitions for the Optica inventory ledger

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/stock", stock_routes())
        .nest("/movements", movement_routes())
        .route("/alerts", get(handlers::list_alerts))
        .route("/reconciliation", get(handlers::verify_all))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
        // Health check (public)
        .route("/health", get(handlers::health_check))
}

/// Stock record routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_stock_record))
        .route("/lookup", get(handlers::lookup_stock_record))
        .route(
            "/:record_id",
            get(handlers::get_stock_record).delete(handlers::annul_stock_record),
        )
        .route("/:record_id/min-quantity", put(handlers::set_min_quantity))
        .route("/:record_id/movements", get(handlers::list_record_movements))
        .route("/:record_id/reconciliation", get(handlers::verify_record))
}

/// Movement ledger routes
fn movement_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::apply_movement))
        .route("/:movement_id", get(handlers::get_movement))
        .route("/:movement_id/reverse", post(handlers::reverse_movement))
}
