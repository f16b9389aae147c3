//! Common types used across the ledger

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::StockKey;

/// Keyset cursor for alert pagination.
///
/// Wraps the composite key of the last row returned; the next page starts
/// strictly after it. Rendered as four dot-separated UUIDs in
/// branch.product.color.brand order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AlertCursor(pub StockKey);

impl std::fmt::Display for AlertCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let k = &self.0;
        write!(
            f,
            "{}.{}.{}.{}",
            k.branch_id, k.product_id, k.color_id, k.brand_id
        )
    }
}

impl std::str::FromStr for AlertCursor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err("cursor must contain four ids".to_string());
        }
        let parse = |p: &str| Uuid::parse_str(p).map_err(|e| format!("invalid cursor id: {}", e));
        Ok(AlertCursor(StockKey {
            branch_id: parse(parts[0])?,
            product_id: parse(parts[1])?,
            color_id: parse(parts[2])?,
            brand_id: parse(parts[3])?,
        }))
    }
}

impl From<AlertCursor> for String {
    fn from(cursor: AlertCursor) -> Self {
        cursor.to_string()
    }
}

impl TryFrom<String> for AlertCursor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One page of a keyset-paginated listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Present when more rows may follow
    pub next_cursor: Option<AlertCursor>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            next_cursor: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_text_roundtrip_keeps_branch_first() {
        let key = StockKey::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let text = AlertCursor(key).to_string();

        assert!(text.starts_with(&key.branch_id.to_string()));
        assert_eq!(text.parse::<AlertCursor>().unwrap(), AlertCursor(key));
    }

    #[test]
    fn test_cursor_rejects_malformed_text() {
        assert!("".parse::<AlertCursor>().is_err());
        assert!("a.b.c.d".parse::<AlertCursor>().is_err());
        assert!(format!("{}.{}", Uuid::nil(), Uuid::nil())
            .parse::<AlertCursor>()
            .is_err());
    }
}
