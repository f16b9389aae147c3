//! Validation rules for ledger input
//!
//! These are pure checks; the backend maps failures onto its error taxonomy.

use thiserror::Error;

use crate::models::MovementKind;

/// Longest accepted movement or reversal reason, in characters
pub const MAX_REASON_LEN: usize = 500;

/// Why a submitted movement is malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MovementViolation {
    #[error("delta must be non-zero")]
    ZeroDelta,

    #[error("inbound movements require a positive delta, got {0}")]
    InboundNotPositive(i64),

    #[error("outbound movements require a negative delta, got {0}")]
    OutboundNotNegative(i64),

    #[error("a reason is required")]
    EmptyReason,

    #[error("reason must be at most {max} characters")]
    ReasonTooLong { max: usize },

    #[error("applying delta {delta} to quantity {quantity} overflows")]
    Overflow { quantity: i64, delta: i64 },
}

/// Validate a reason and return it trimmed
pub fn validate_reason(reason: &str) -> Result<&str, MovementViolation> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(MovementViolation::EmptyReason);
    }
    if trimmed.chars().count() > MAX_REASON_LEN {
        return Err(MovementViolation::ReasonTooLong {
            max: MAX_REASON_LEN,
        });
    }
    Ok(trimmed)
}

/// Validate the sign convention of a movement kind
pub fn validate_delta(kind: MovementKind, delta: i64) -> Result<(), MovementViolation> {
    if delta == 0 {
        return Err(MovementViolation::ZeroDelta);
    }
    match kind {
        MovementKind::Inbound if delta < 0 => Err(MovementViolation::InboundNotPositive(delta)),
        MovementKind::Outbound if delta > 0 => Err(MovementViolation::OutboundNotNegative(delta)),
        _ => Ok(()),
    }
}

/// Validate a whole movement submission, returning the trimmed reason
pub fn validate_movement(
    kind: MovementKind,
    delta: i64,
    reason: &str,
) -> Result<&str, MovementViolation> {
    validate_delta(kind, delta)?;
    validate_reason(reason)
}

/// Add a delta to a quantity without wrapping.
///
/// The result may be negative; non-negativity is enforced by the caller so it
/// can report the shortfall.
pub fn next_quantity(quantity: i64, delta: i64) -> Result<i64, MovementViolation> {
    quantity
        .checked_add(delta)
        .ok_or(MovementViolation::Overflow { quantity, delta })
}

/// Validate an alert threshold
pub fn validate_min_quantity(min_quantity: i64) -> Result<(), &'static str> {
    if min_quantity < 0 {
        return Err("Minimum quantity cannot be negative");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_delta_sign_conventions() {
        assert!(validate_delta(MovementKind::Inbound, 20).is_ok());
        assert!(validate_delta(MovementKind::Outbound, -16).is_ok());
        assert!(validate_delta(MovementKind::Adjustment, 3).is_ok());
        assert!(validate_delta(MovementKind::Adjustment, -3).is_ok());

        assert_eq!(
            validate_delta(MovementKind::Inbound, -1),
            Err(MovementViolation::InboundNotPositive(-1))
        );
        assert_eq!(
            validate_delta(MovementKind::Outbound, 4),
            Err(MovementViolation::OutboundNotNegative(4))
        );
    }

    #[test]
    fn test_zero_delta_rejected_for_every_kind() {
        for kind in [
            MovementKind::Inbound,
            MovementKind::Outbound,
            MovementKind::Adjustment,
        ] {
            assert_eq!(validate_delta(kind, 0), Err(MovementViolation::ZeroDelta));
        }
    }

    #[test]
    fn test_validate_reason() {
        assert_eq!(validate_reason("  compra proveedor "), Ok("compra proveedor"));
        assert_eq!(validate_reason(""), Err(MovementViolation::EmptyReason));
        assert_eq!(validate_reason("   \t"), Err(MovementViolation::EmptyReason));

        let long = "x".repeat(MAX_REASON_LEN + 1);
        assert_eq!(
            validate_reason(&long),
            Err(MovementViolation::ReasonTooLong {
                max: MAX_REASON_LEN
            })
        );
        // Multi-byte characters count once
        let accented = "ñ".repeat(MAX_REASON_LEN);
        assert!(validate_reason(&accented).is_ok());
    }

    #[test]
    fn test_validate_movement_checks_delta_first() {
        assert_eq!(
            validate_movement(MovementKind::Inbound, 0, ""),
            Err(MovementViolation::ZeroDelta)
        );
        assert_eq!(
            validate_movement(MovementKind::Outbound, -2, " venta "),
            Ok("venta")
        );
    }

    #[test]
    fn test_next_quantity() {
        assert_eq!(next_quantity(4, -4), Ok(0));
        assert_eq!(next_quantity(4, -10), Ok(-6));
        assert_eq!(
            next_quantity(i64::MAX, 1),
            Err(MovementViolation::Overflow {
                quantity: i64::MAX,
                delta: 1
            })
        );
    }

    #[test]
    fn test_validate_min_quantity() {
        assert!(validate_min_quantity(0).is_ok());
        assert!(validate_min_quantity(5).is_ok());
        assert!(validate_min_quantity(-1).is_err());
    }
}
