//! Stock alert classification

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{StockKey, StockRecord};

/// Derived stock status, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertStatus {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "bajo")]
    Low,
    #[serde(rename = "agotado")]
    Out,
}

impl AlertStatus {
    /// Classify a quantity against its configured minimum.
    ///
    /// `agotado` at zero, `bajo` while `0 < quantity <= min_quantity`,
    /// `normal` otherwise.
    pub fn classify(quantity: i64, min_quantity: i64) -> Self {
        if quantity <= 0 {
            AlertStatus::Out
        } else if quantity <= min_quantity {
            AlertStatus::Low
        } else {
            AlertStatus::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Normal => "normal",
            AlertStatus::Low => "bajo",
            AlertStatus::Out => "agotado",
        }
    }

    pub fn is_alert(&self) -> bool {
        !matches!(self, AlertStatus::Normal)
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(AlertStatus::Normal),
            "bajo" | "low" => Ok(AlertStatus::Low),
            "agotado" | "out" => Ok(AlertStatus::Out),
            other => Err(format!("unknown alert status: {}", other)),
        }
    }
}

/// Query-time projection of a record in alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertView {
    pub record_id: Uuid,
    #[serde(flatten)]
    pub key: StockKey,
    pub quantity: i64,
    pub min_quantity: i64,
    pub status: AlertStatus,
}

impl AlertView {
    /// Project a record, or `None` when its status is normal
    pub fn from_record(record: &StockRecord) -> Option<Self> {
        let status = record.status();
        status.is_alert().then(|| Self {
            record_id: record.id,
            key: record.key,
            quantity: record.quantity,
            min_quantity: record.min_quantity,
            status,
        })
    }
}

/// Filter accepted by alert listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertFilter {
    pub branch_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    /// Restrict to one alert status; `normal` matches nothing
    pub status: Option<AlertStatus>,
}

impl AlertFilter {
    pub fn matches(&self, view: &AlertView) -> bool {
        self.branch_id.map_or(true, |b| b == view.key.branch_id)
            && self.product_id.map_or(true, |p| p == view.key.product_id)
            && self.status.map_or(true, |s| s == view.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(AlertStatus::classify(0, 5), AlertStatus::Out);
        assert_eq!(AlertStatus::classify(0, 0), AlertStatus::Out);
        assert_eq!(AlertStatus::classify(4, 5), AlertStatus::Low);
        assert_eq!(AlertStatus::classify(5, 5), AlertStatus::Low);
        assert_eq!(AlertStatus::classify(6, 5), AlertStatus::Normal);
        assert_eq!(AlertStatus::classify(1, 0), AlertStatus::Normal);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&AlertStatus::Out).unwrap(), "\"agotado\"");
        assert_eq!(serde_json::to_string(&AlertStatus::Low).unwrap(), "\"bajo\"");
        assert_eq!("low".parse::<AlertStatus>().unwrap(), AlertStatus::Low);
    }

    #[test]
    fn test_view_skips_normal_records() {
        let key = StockKey::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut record = StockRecord::new(key, 5, Uuid::new_v4());
        record.quantity = 20;
        assert!(AlertView::from_record(&record).is_none());

        record.quantity = 4;
        let view = AlertView::from_record(&record).unwrap();
        assert_eq!(view.status, AlertStatus::Low);
        assert_eq!(view.record_id, record.id);
    }

    proptest! {
        #[test]
        fn prop_classify_partitions_quantities(quantity in 0i64..10_000, min in 0i64..10_000) {
            let status = AlertStatus::classify(quantity, min);
            match status {
                AlertStatus::Out => prop_assert_eq!(quantity, 0),
                AlertStatus::Low => prop_assert!(quantity > 0 && quantity <= min),
                AlertStatus::Normal => prop_assert!(quantity > min),
            }
        }
    }
}
