//! Stock record store: lifecycle of (product, branch, color, brand) records
//!
//! Records are created with zero stock and only ever change quantity through
//! the reconciliation engine. Annulment is a soft delete that frees the key
//! for a new record while keeping the old record and its ledger readable.

use std::sync::Arc;

use chrono::Utc;
use shared::{validate_min_quantity, Actor, StockKey, StockRecord};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::reconciliation::describe_key;
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn LedgerStore>,
}

impl StockService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Create an empty record for `key`
    pub async fn create(
        &self,
        key: StockKey,
        min_quantity: i64,
        actor: Actor,
    ) -> AppResult<StockRecord> {
        actor.ensure_admin()?;
        validate_min_quantity(min_quantity)
            .map_err(|msg| AppError::ValidationError(msg.to_string()))?;

        let record = self
            .store
            .create_record(StockRecord::new(key, min_quantity, actor.id))
            .await?;

        tracing::info!(
            record_id = %record.id,
            product_id = %key.product_id,
            branch_id = %key.branch_id,
            min_quantity,
            "Stock record created"
        );
        Ok(record)
    }

    pub async fn get(&self, record_id: Uuid) -> AppResult<StockRecord> {
        self.store
            .get_record(record_id)
            .await?
            .ok_or_else(|| AppError::RecordNotFound(record_id.to_string()))
    }

    /// Active record for a key
    pub async fn find(&self, key: &StockKey) -> AppResult<StockRecord> {
        self.store
            .find_record(key)
            .await?
            .ok_or_else(|| AppError::RecordNotFound(describe_key(key)))
    }

    pub async fn annul(&self, record_id: Uuid, actor: Actor) -> AppResult<StockRecord> {
        actor.ensure_admin()?;
        let record = self
            .store
            .annul_record(record_id, actor.id, Utc::now())
            .await?;
        tracing::info!(%record_id, quantity = record.quantity, actor = %actor.id, "Stock record annulled");
        Ok(record)
    }

    /// Annul the active record for a key
    pub async fn annul_by_key(&self, key: &StockKey, actor: Actor) -> AppResult<StockRecord> {
        actor.ensure_admin()?;
        let record = self.find(key).await?;
        self.annul(record.id, actor).await
    }

    pub async fn set_min_quantity(
        &self,
        record_id: Uuid,
        min_quantity: i64,
        actor: Actor,
    ) -> AppResult<StockRecord> {
        actor.ensure_admin()?;
        validate_min_quantity(min_quantity)
            .map_err(|msg| AppError::ValidationError(msg.to_string()))?;

        let record = self
            .store
            .set_min_quantity(record_id, min_quantity, actor.id, Utc::now())
            .await?;
        tracing::info!(%record_id, min_quantity, "Alert threshold updated");
        Ok(record)
    }
}
