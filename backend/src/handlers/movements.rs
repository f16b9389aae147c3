//! HTTP handlers for stock movements and reversals

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{MovementKind, StockKey, StockMovement};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::{require_admin, CurrentUser};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyMovementRequest {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub color_id: Uuid,
    pub brand_id: Uuid,
    pub kind: MovementKind,
    pub delta: i64,
    #[validate(length(min = 1, max = 500, message = "reason must be between 1 and 500 characters"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReverseMovementRequest {
    #[validate(length(min = 1, max = 500, message = "reason must be between 1 and 500 characters"))]
    pub reason: String,
}

/// Record a movement against a stock record
pub async fn apply_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ApplyMovementRequest>,
) -> AppResult<(StatusCode, Json<StockMovement>)> {
    if input.kind.is_privileged() {
        require_admin(&current_user.0)?;
    }
    input.validate()?;

    let key = StockKey::new(
        input.product_id,
        input.branch_id,
        input.color_id,
        input.brand_id,
    );
    let movement = state
        .engine()
        .apply_movement(
            key,
            input.kind,
            input.delta,
            &input.reason,
            current_user.0.actor(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

pub async fn get_movement(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<StockMovement>> {
    let movement = state.ledger().get_movement(movement_id).await?;
    Ok(Json(movement))
}

/// Reverse a movement, returning the compensating entry
pub async fn reverse_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
    Json(input): Json<ReverseMovementRequest>,
) -> AppResult<(StatusCode, Json<StockMovement>)> {
    require_admin(&current_user.0)?;
    input.validate()?;

    let compensation = state
        .reversals()
        .reverse_movement(movement_id, &input.reason, current_user.0.actor())
        .await?;
    Ok((StatusCode::CREATED, Json(compensation)))
}
