//! Stock record models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Composite identity of a stock record.
///
/// One live record exists per (product, branch, color, brand) tuple. The field
/// order is also the ordering used by alert pagination: branch first, then
/// product, color and brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub color_id: Uuid,
    pub brand_id: Uuid,
}

impl StockKey {
    pub fn new(product_id: Uuid, branch_id: Uuid, color_id: Uuid, brand_id: Uuid) -> Self {
        Self {
            product_id,
            branch_id,
            color_id,
            brand_id,
        }
    }

    /// Tuple used for stable ordering (branch, product, color, brand)
    pub fn sort_tuple(&self) -> (Uuid, Uuid, Uuid, Uuid) {
        (self.branch_id, self.product_id, self.color_id, self.brand_id)
    }
}

impl PartialOrd for StockKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StockKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_tuple().cmp(&other.sort_tuple())
    }
}

/// Current-quantity projection of the movement ledger for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub key: StockKey,
    pub quantity: i64,
    /// Alert threshold; quantities at or below it are reported as low
    pub min_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
    pub annulled_at: Option<DateTime<Utc>>,
    pub annulled_by: Option<Uuid>,
}

impl StockRecord {
    /// Build a fresh, empty record
    pub fn new(key: StockKey, min_quantity: i64, created_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            quantity: 0,
            min_quantity,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
            annulled_at: None,
            annulled_by: None,
        }
    }

    pub fn is_annulled(&self) -> bool {
        self.annulled_at.is_some()
    }

    /// Derived alert status for the current quantity
    pub fn status(&self) -> super::AlertStatus {
        super::AlertStatus::classify(self.quantity, self.min_quantity)
    }
}
