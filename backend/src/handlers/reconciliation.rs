//! HTTP handlers for ledger reconciliation checks

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::ReconciliationReport;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_admin, CurrentUser};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReconciliationQuery {
    pub branch_id: Option<Uuid>,
}

/// Replay one record's ledger against its stored quantity
pub async fn verify_record(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<ReconciliationReport>> {
    let report = state.engine().verify_record(record_id).await?;
    Ok(Json(report))
}

/// Every active record whose stored quantity disagrees with its ledger
pub async fn verify_all(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ReconciliationQuery>,
) -> AppResult<Json<Vec<ReconciliationReport>>> {
    require_admin(&current_user.0)?;
    let reports = state.engine().verify_all(query.branch_id).await?;
    Ok(Json(reports))
}
