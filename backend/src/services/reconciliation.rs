//! Reconciliation engine: the only writer of stock quantities
//!
//! Each movement is applied in one transaction that locks the target record,
//! computes the new quantity, rejects anything that would go negative, writes
//! the quantity and appends the ledger entry. Either both writes land or
//! neither does.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    next_quantity, validate_movement, Actor, MovementKind, NewMovement, ReconciliationReport,
    StockKey, StockMovement, StockRecord,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::retry::{run_transaction, RetryConfig};
use crate::store::{LedgerStore, LedgerTx};

/// A validated movement waiting for its record lock
#[derive(Debug, Clone)]
pub(crate) struct PendingMovement {
    pub kind: MovementKind,
    pub delta: i64,
    pub reason: String,
    pub actor_id: Uuid,
    pub reversal_of: Option<Uuid>,
}

#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn LedgerStore>,
    retry: RetryConfig,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn LedgerStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub(crate) fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub(crate) fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Apply a movement to the record identified by `key`.
    ///
    /// Returns the persisted movement; the record's quantity is already
    /// updated when this returns. Adjustments require an admin actor.
    pub async fn apply_movement(
        &self,
        key: StockKey,
        kind: MovementKind,
        delta: i64,
        reason: &str,
        actor: Actor,
    ) -> AppResult<StockMovement> {
        if kind.is_privileged() {
            actor.ensure_admin()?;
        }
        let reason = validate_movement(kind, delta, reason)?.to_string();

        let result = run_transaction(&self.retry, "apply_movement", || {
            let pending = PendingMovement {
                kind,
                delta,
                reason: reason.clone(),
                actor_id: actor.id,
                reversal_of: None,
            };
            async move {
                let mut tx = self.store.begin().await?;
                let record = tx
                    .lock_record(&key)
                    .await?
                    .ok_or_else(|| AppError::RecordNotFound(describe_key(&key)))?;
                let movement = self.apply_locked(tx.as_mut(), &record, pending).await?;
                tx.commit().await?;
                Ok(movement)
            }
        })
        .await;

        match &result {
            Ok(movement) => tracing::info!(
                record_id = %movement.record_id,
                movement_id = %movement.id,
                kind = %movement.kind,
                delta = movement.delta,
                quantity = movement.quantity_after,
                actor = %actor.id,
                "Movement applied"
            ),
            Err(err) => tracing::warn!(
                product_id = %key.product_id,
                branch_id = %key.branch_id,
                kind = %kind,
                delta,
                error = %err,
                "Movement rejected"
            ),
        }
        result
    }

    /// Apply a movement to a record already locked by `tx`
    pub(crate) async fn apply_locked(
        &self,
        tx: &mut dyn LedgerTx,
        record: &StockRecord,
        pending: PendingMovement,
    ) -> AppResult<StockMovement> {
        let new_quantity = next_quantity(record.quantity, pending.delta)?;
        if new_quantity < 0 {
            return Err(AppError::InsufficientStock {
                record_id: record.id,
                available: record.quantity,
                requested: pending.delta.saturating_neg(),
            });
        }

        let now = Utc::now();
        tx.update_quantity(record.id, new_quantity, pending.actor_id, now)
            .await?;
        tx.append_movement(NewMovement {
            id: Uuid::new_v4(),
            record_id: record.id,
            kind: pending.kind,
            delta: pending.delta,
            quantity_after: new_quantity,
            reason: pending.reason,
            actor_id: pending.actor_id,
            created_at: now,
            reversal_of: pending.reversal_of,
        })
        .await
    }

    /// Replay one record's ledger and compare it with the stored quantity
    pub async fn verify_record(&self, record_id: Uuid) -> AppResult<ReconciliationReport> {
        let (record, movements) = self
            .store
            .ledger_snapshot(record_id)
            .await?
            .ok_or_else(|| AppError::RecordNotFound(record_id.to_string()))?;

        let report = ReconciliationReport::build(&record, &movements);
        if !report.consistent {
            tracing::error!(
                record_id = %record_id,
                stored = report.stored_quantity,
                replayed = report.replayed_quantity,
                first_divergence = ?report.first_divergence,
                "Stock record disagrees with its ledger"
            );
        }
        Ok(report)
    }

    /// Check every active record, optionally within one branch, returning
    /// only the inconsistent ones
    pub async fn verify_all(
        &self,
        branch_id: Option<Uuid>,
    ) -> AppResult<Vec<ReconciliationReport>> {
        let ids = self.store.active_record_ids().await?;
        let mut checked = 0usize;
        let mut inconsistent = Vec::new();

        for id in ids {
            // Annulled between listing and checking
            let Some((record, movements)) = self.store.ledger_snapshot(id).await? else {
                continue;
            };
            if record.is_annulled() || branch_id.is_some_and(|b| b != record.key.branch_id) {
                continue;
            }
            checked += 1;

            let report = ReconciliationReport::build(&record, &movements);
            if !report.consistent {
                tracing::error!(
                    record_id = %id,
                    stored = report.stored_quantity,
                    replayed = report.replayed_quantity,
                    first_divergence = ?report.first_divergence,
                    "Stock record disagrees with its ledger"
                );
                inconsistent.push(report);
            }
        }

        tracing::info!(
            checked,
            inconsistent = inconsistent.len(),
            "Ledger reconciliation sweep finished"
        );
        Ok(inconsistent)
    }
}

pub(crate) fn describe_key(key: &StockKey) -> String {
    format!(
        "(product {}, branch {}, color {}, brand {})",
        key.product_id, key.branch_id, key.color_id, key.brand_id
    )
}
