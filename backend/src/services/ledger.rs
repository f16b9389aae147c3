//! Read access to the movement ledger

use std::sync::Arc;

use shared::StockMovement;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct MovementLedger {
    store: Arc<dyn LedgerStore>,
}

impl MovementLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn get_movement(&self, movement_id: Uuid) -> AppResult<StockMovement> {
        self.store
            .get_movement(movement_id)
            .await?
            .ok_or(AppError::MovementNotFound(movement_id))
    }

    /// History of one record in ledger order. Annulled records keep their
    /// history readable.
    pub async fn list_movements(&self, record_id: Uuid) -> AppResult<Vec<StockMovement>> {
        if self.store.get_record(record_id).await?.is_none() {
            return Err(AppError::RecordNotFound(record_id.to_string()));
        }
        self.store.list_movements(record_id).await
    }
}
