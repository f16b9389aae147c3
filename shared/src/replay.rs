//! Ledger replay
//!
//! Rebuilds a record's quantity from its movement history and cross-checks the
//! bookkeeping the engine writes alongside each movement.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{StockMovement, StockRecord};

/// Result of replaying one record's ledger
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplayOutcome {
    /// Sum of every delta in sequence order
    pub replayed_quantity: i64,
    /// Sum of deltas of movements that are neither reversed nor compensating
    pub effective_quantity: i64,
    pub movement_count: usize,
    /// First sequence whose recorded `quantity_after` disagrees with the replay
    pub first_divergence: Option<i64>,
    /// First sequence at which the running balance dipped below zero
    pub negative_at: Option<i64>,
    /// Reversed movements without a matching compensating entry
    pub broken_reversals: Vec<Uuid>,
}

/// Replay a record's movements.
///
/// The slice may arrive in any order; it is walked by `sequence`.
pub fn replay(movements: &[StockMovement]) -> ReplayOutcome {
    let mut ordered: Vec<&StockMovement> = movements.iter().collect();
    ordered.sort_by_key(|m| m.sequence);

    let by_id: HashMap<Uuid, &StockMovement> = ordered.iter().map(|m| (m.id, *m)).collect();

    let mut outcome = ReplayOutcome {
        movement_count: ordered.len(),
        ..Default::default()
    };

    for movement in &ordered {
        outcome.replayed_quantity = outcome.replayed_quantity.saturating_add(movement.delta);

        if outcome.first_divergence.is_none()
            && movement.quantity_after != outcome.replayed_quantity
        {
            outcome.first_divergence = Some(movement.sequence);
        }
        if outcome.negative_at.is_none() && outcome.replayed_quantity < 0 {
            outcome.negative_at = Some(movement.sequence);
        }

        if !movement.reversed && !movement.is_compensating() {
            outcome.effective_quantity = outcome.effective_quantity.saturating_add(movement.delta);
        }

        if movement.reversed {
            let paired = movement
                .reversed_by
                .and_then(|id| by_id.get(&id))
                .map(|c| c.reversal_of == Some(movement.id) && c.delta == -movement.delta)
                .unwrap_or(false);
            if !paired {
                outcome.broken_reversals.push(movement.id);
            }
        }
    }

    outcome
}

/// Outcome of checking a stored quantity against its ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub record_id: Uuid,
    pub stored_quantity: i64,
    pub replayed_quantity: i64,
    pub effective_quantity: i64,
    pub movement_count: usize,
    pub first_divergence: Option<i64>,
    pub broken_reversals: Vec<Uuid>,
    pub consistent: bool,
}

impl ReconciliationReport {
    pub fn build(record: &StockRecord, movements: &[StockMovement]) -> Self {
        let outcome = replay(movements);
        let consistent = record.quantity == outcome.replayed_quantity
            && outcome.replayed_quantity == outcome.effective_quantity
            && outcome.first_divergence.is_none()
            && outcome.negative_at.is_none()
            && outcome.broken_reversals.is_empty();

        Self {
            record_id: record.id,
            stored_quantity: record.quantity,
            replayed_quantity: outcome.replayed_quantity,
            effective_quantity: outcome.effective_quantity,
            movement_count: outcome.movement_count,
            first_divergence: outcome.first_divergence,
            broken_reversals: outcome.broken_reversals,
            consistent,
        }
    }
}
