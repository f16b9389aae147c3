//! Movement ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of stock-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Goods received; delta must be positive
    #[serde(alias = "entrada")]
    Inbound,
    /// Goods leaving the branch; delta must be negative
    #[serde(alias = "salida")]
    Outbound,
    /// Manual correction or compensating entry; either sign
    #[serde(alias = "ajuste")]
    Adjustment,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Inbound => "inbound",
            MovementKind::Outbound => "outbound",
            MovementKind::Adjustment => "adjustment",
        }
    }

    /// Whether callers need elevated privileges to submit this kind
    pub fn is_privileged(&self) -> bool {
        matches!(self, MovementKind::Adjustment)
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MovementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" | "entrada" => Ok(MovementKind::Inbound),
            "outbound" | "salida" => Ok(MovementKind::Outbound),
            "adjustment" | "ajuste" => Ok(MovementKind::Adjustment),
            other => Err(format!("unknown movement kind: {}", other)),
        }
    }
}

/// A persisted ledger entry
///
/// Immutable once written, except for the reversal bookkeeping
/// (`reversed`, `reversed_by`, `reversed_at`), which is set at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    /// Store-assigned ledger order
    pub sequence: i64,
    pub record_id: Uuid,
    pub kind: MovementKind,
    pub delta: i64,
    /// Record quantity right after this movement committed
    pub quantity_after: i64,
    pub reason: String,
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub reversed: bool,
    pub reversed_by: Option<Uuid>,
    pub reversed_at: Option<DateTime<Utc>>,
    /// Set on compensating entries: the movement this one cancels
    pub reversal_of: Option<Uuid>,
}

impl StockMovement {
    /// Compensating entries can never be reversed themselves
    pub fn is_compensating(&self) -> bool {
        self.reversal_of.is_some()
    }
}

/// A movement ready to be appended by a store transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub id: Uuid,
    pub record_id: Uuid,
    pub kind: MovementKind,
    pub delta: i64,
    pub quantity_after: i64,
    pub reason: String,
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub reversal_of: Option<Uuid>,
}

impl NewMovement {
    /// Materialize with the sequence number assigned by the store
    pub fn into_movement(self, sequence: i64) -> StockMovement {
        StockMovement {
            id: self.id,
            sequence,
            record_id: self.record_id,
            kind: self.kind,
            delta: self.delta,
            quantity_after: self.quantity_after,
            reason: self.reason,
            actor_id: self.actor_id,
            created_at: self.created_at,
            reversed: false,
            reversed_by: None,
            reversed_at: None,
            reversal_of: self.reversal_of,
        }
    }
}
