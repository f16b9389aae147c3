//! Reversal coordinator
//!
//! Undoes a movement by appending a compensating adjustment with the negated
//! delta and flagging the original, all inside one transaction. History is
//! never edited in place.

use shared::{validate_reason, Actor, MovementKind, MovementViolation, StockMovement};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::reconciliation::{PendingMovement, ReconciliationEngine};
use crate::services::retry::run_transaction;

#[derive(Clone)]
pub struct ReversalCoordinator {
    engine: ReconciliationEngine,
}

impl ReversalCoordinator {
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self { engine }
    }

    /// Reverse `movement_id`, returning the compensating movement.
    ///
    /// Admin only. `reason` records why the movement was undone and is kept
    /// separately from the original movement's reason.
    pub async fn reverse_movement(
        &self,
        movement_id: Uuid,
        reason: &str,
        actor: Actor,
    ) -> AppResult<StockMovement> {
        actor.ensure_admin()?;
        let reason = validate_reason(reason)?.to_string();

        let result = run_transaction(self.engine.retry(), "reverse_movement", || {
            let reason = reason.clone();
            async move {
                let mut tx = self.engine.store().begin().await?;

                let original = tx
                    .lock_movement(movement_id)
                    .await?
                    .ok_or(AppError::MovementNotFound(movement_id))?;
                if original.reversed {
                    return Err(AppError::AlreadyReversed(movement_id));
                }
                if original.is_compensating() {
                    return Err(AppError::NotReversible(movement_id));
                }

                let record = tx
                    .lock_record_by_id(original.record_id)
                    .await?
                    .ok_or_else(|| AppError::RecordNotFound(original.record_id.to_string()))?;

                let delta = original
                    .delta
                    .checked_neg()
                    .ok_or(MovementViolation::Overflow {
                        quantity: record.quantity,
                        delta: original.delta,
                    })?;

                // Same non-negativity guard as any other movement
                let compensation = self
                    .engine
                    .apply_locked(
                        tx.as_mut(),
                        &record,
                        PendingMovement {
                            kind: MovementKind::Adjustment,
                            delta,
                            reason,
                            actor_id: actor.id,
                            reversal_of: Some(original.id),
                        },
                    )
                    .await?;

                tx.mark_reversed(original.id, compensation.id, compensation.created_at)
                    .await?;
                tx.commit().await?;
                Ok(compensation)
            }
        })
        .await;

        match &result {
            Ok(compensation) => tracing::info!(
                %movement_id,
                compensation_id = %compensation.id,
                record_id = %compensation.record_id,
                delta = compensation.delta,
                quantity = compensation.quantity_after,
                actor = %actor.id,
                "Movement reversed"
            ),
            Err(err) => tracing::warn!(%movement_id, error = %err, "Reversal rejected"),
        }
        result
    }
}
