//! HTTP handlers for stock records

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{StockKey, StockMovement, StockRecord};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::{require_admin, CurrentUser};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStockRequest {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub color_id: Uuid,
    pub brand_id: Uuid,
    #[serde(default)]
    #[validate(range(min = 0, message = "min_quantity cannot be negative"))]
    pub min_quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetMinQuantityRequest {
    #[validate(range(min = 0, message = "min_quantity cannot be negative"))]
    pub min_quantity: i64,
}

/// Create an empty stock record
pub async fn create_stock_record(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateStockRequest>,
) -> AppResult<(StatusCode, Json<StockRecord>)> {
    require_admin(&current_user.0)?;
    input.validate()?;

    let key = StockKey::new(
        input.product_id,
        input.branch_id,
        input.color_id,
        input.brand_id,
    );
    let record = state
        .stock()
        .create(key, input.min_quantity, current_user.0.actor())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Find the active record for a composite key
pub async fn lookup_stock_record(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(key): Query<StockKey>,
) -> AppResult<Json<StockRecord>> {
    let record = state.stock().find(&key).await?;
    Ok(Json(record))
}

pub async fn get_stock_record(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<StockRecord>> {
    let record = state.stock().get(record_id).await?;
    Ok(Json(record))
}

/// Soft-annul a record
pub async fn annul_stock_record(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<StockRecord>> {
    require_admin(&current_user.0)?;
    let record = state
        .stock()
        .annul(record_id, current_user.0.actor())
        .await?;
    Ok(Json(record))
}

pub async fn set_min_quantity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(record_id): Path<Uuid>,
    Json(input): Json<SetMinQuantityRequest>,
) -> AppResult<Json<StockRecord>> {
    require_admin(&current_user.0)?;
    input.validate()?;

    let record = state
        .stock()
        .set_min_quantity(record_id, input.min_quantity, current_user.0.actor())
        .await?;
    Ok(Json(record))
}

/// Ledger history of one record
pub async fn list_record_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let movements = state.ledger().list_movements(record_id).await?;
    Ok(Json(movements))
}
