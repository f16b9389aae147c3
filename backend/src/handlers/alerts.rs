//! HTTP handlers for stock alerts

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{AlertCursor, AlertFilter, AlertStatus, AlertView, Page};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    pub branch_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    /// `bajo` or `agotado`
    pub status: Option<String>,
    /// Cursor returned as `next_cursor` by the previous page
    pub after: Option<String>,
    pub limit: Option<u32>,
}

impl AlertQuery {
    fn filter(&self) -> AppResult<AlertFilter> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<AlertStatus>)
            .transpose()
            .map_err(AppError::ValidationError)?;

        Ok(AlertFilter {
            branch_id: self.branch_id,
            product_id: self.product_id,
            status,
        })
    }

    fn cursor(&self) -> AppResult<Option<AlertCursor>> {
        self.after
            .as_deref()
            .map(str::parse::<AlertCursor>)
            .transpose()
            .map_err(AppError::ValidationError)
    }
}

/// List records in alert, one page at a time
pub async fn list_alerts(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<AlertQuery>,
) -> AppResult<Json<Page<AlertView>>> {
    let filter = query.filter()?;
    let after = query.cursor()?;
    let limit = state.config.ledger.page_size(query.limit);

    let page = state.alerts().list_alerts(&filter, after, limit).await?;
    Ok(Json(page))
}
