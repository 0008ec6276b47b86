//! Verdant Fee Engine
//!
//! Deterministic fee calculation for marketplace settlements.
//!
//! # Fee Model
//!
//! | Component      | Basis                                   |
//! |----------------|-----------------------------------------|
//! | Platform fee   | fixed amount per unit, any method       |
//! | Processor fee  | percentage of subtotal + fixed, online  |
//! | Processor fee  | zero for cash handover                  |
//!
//! All derived quantities are rounded half-up to 2 decimal places, matching
//! currency display. The calculator is a pure function over an immutable
//! [`FeeSnapshot`]; it never reads configuration itself. Callers obtain one
//! snapshot per operation (see [`provider::FeeConfigProvider`]) so a
//! concurrent settings change can never produce an inconsistent bill.

pub mod provider;

pub use provider::{FeeConfigProvider, FeeConfigSource, StaticFeeSource};

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use verdant_types::{MarketError, PaymentMethod, Result};

/// Settings key for the per-unit platform fee.
pub const KEY_PLATFORM_FEE_FIXED: &str = "platform_fee_fixed";
/// Settings key for the processor percentage, stored as a percent (2.49).
pub const KEY_PROCESSOR_FEE_PERCENTAGE: &str = "paypal_fee_percentage";
/// Settings key for the flat processor fee.
pub const KEY_PROCESSOR_FEE_FIXED: &str = "paypal_fee_fixed";

/// Immutable, point-in-time copy of the configured fee parameters.
///
/// Assembled once per calculation and passed by value; administrators
/// changing settings never retroactively alter an in-flight breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSnapshot {
    /// Platform fee charged per unit, regardless of payment method.
    pub platform_fee_fixed: Decimal,
    /// Processor percentage as a fraction (0.0249 = 2.49%).
    pub processor_fee_percentage: Decimal,
    /// Flat processor fee per online charge.
    pub processor_fee_fixed: Decimal,
}

impl Default for FeeSnapshot {
    /// Hardcoded last-resort defaults, mirroring the seeded settings.
    fn default() -> Self {
        Self {
            platform_fee_fixed: dec!(0.42),
            processor_fee_percentage: dec!(0.0249),
            processor_fee_fixed: dec!(0.49),
        }
    }
}

impl FeeSnapshot {
    /// All fields must be non-negative for the snapshot to be usable.
    pub fn validate(&self) -> Result<()> {
        if self.platform_fee_fixed < Decimal::ZERO
            || self.processor_fee_percentage < Decimal::ZERO
            || self.processor_fee_fixed < Decimal::ZERO
        {
            return Err(MarketError::InvalidInput(
                "fee configuration fields must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Full fee breakdown of one charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub subtotal: Decimal,
    pub platform_fee: Decimal,
    pub processor_fee: Decimal,
    /// `subtotal + platform_fee + processor_fee`, exactly.
    pub total: Decimal,
    /// Seller's net: `subtotal - platform_fee - processor_fee`.
    pub seller_net: Decimal,
}

/// Round half-up to the currency's 2 minor digits.
fn round2(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute the fee breakdown for `quantity` units at `unit_price`.
///
/// Pure: the same inputs always reproduce the same auditable totals.
/// Preconditions: `unit_price > 0`, `quantity >= 1`, non-negative snapshot
/// fields; violations fail with `InvalidInput`.
pub fn compute(
    unit_price: Decimal,
    quantity: i64,
    method: PaymentMethod,
    cfg: &FeeSnapshot,
) -> Result<FeeBreakdown> {
    if unit_price <= Decimal::ZERO {
        return Err(MarketError::InvalidInput(format!(
            "unit price must be positive, got {unit_price}"
        )));
    }
    if quantity < 1 {
        return Err(MarketError::InvalidInput(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    cfg.validate()?;

    let qty = Decimal::from(quantity);
    let subtotal = round2(unit_price * qty);
    let platform_fee = round2(cfg.platform_fee_fixed * qty);
    let processor_fee = if method.is_online() {
        round2(subtotal * cfg.processor_fee_percentage + cfg.processor_fee_fixed)
    } else {
        Decimal::ZERO
    };

    Ok(FeeBreakdown {
        subtotal,
        platform_fee,
        processor_fee,
        total: subtotal + platform_fee + processor_fee,
        seller_net: subtotal - platform_fee - processor_fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_example() {
        // 10.00 x 2 online with (0.42, 0.0249, 0.49)
        let cfg = FeeSnapshot::default();
        let b = compute(dec!(10.00), 2, PaymentMethod::Paypal, &cfg).unwrap();
        assert_eq!(b.subtotal, dec!(20.00));
        assert_eq!(b.platform_fee, dec!(0.84));
        // 20.00 * 0.0249 + 0.49 = 0.988 -> 0.99
        assert_eq!(b.processor_fee, dec!(0.99));
        assert_eq!(b.total, dec!(21.83));
        assert_eq!(b.seller_net, dec!(18.17));
    }

    #[test]
    fn total_is_sum_of_parts() {
        let cfg = FeeSnapshot::default();
        for (price, qty) in [(dec!(0.01), 1), (dec!(3.33), 7), (dec!(999.99), 3)] {
            let b = compute(price, qty, PaymentMethod::Paypal, &cfg).unwrap();
            assert_eq!(b.total, b.subtotal + b.platform_fee + b.processor_fee);
            assert_eq!(b.seller_net, b.subtotal - b.platform_fee - b.processor_fee);
        }
    }

    #[test]
    fn cash_has_no_processor_fee() {
        let cfg = FeeSnapshot::default();
        let b = compute(dec!(10.00), 2, PaymentMethod::Cash, &cfg).unwrap();
        assert_eq!(b.processor_fee, Decimal::ZERO);
        assert_eq!(b.total, dec!(20.84));
    }

    #[test]
    fn half_up_rounding_at_each_derived_quantity() {
        let cfg = FeeSnapshot {
            platform_fee_fixed: dec!(0.125),
            processor_fee_percentage: dec!(0.025),
            processor_fee_fixed: Decimal::ZERO,
        };
        let b = compute(dec!(1.005), 1, PaymentMethod::Paypal, &cfg).unwrap();
        // 1.005 rounds half-up to 1.01, then 1.01 * 0.025 = 0.02525 -> 0.03
        assert_eq!(b.subtotal, dec!(1.01));
        assert_eq!(b.platform_fee, dec!(0.13));
        assert_eq!(b.processor_fee, dec!(0.03));
    }

    #[test]
    fn seller_net_can_go_negative_below_fee_floor() {
        // Pathologically small price relative to the fixed fees; callers
        // guard against listing below the fee floor.
        let cfg = FeeSnapshot::default();
        let b = compute(dec!(0.10), 1, PaymentMethod::Paypal, &cfg).unwrap();
        assert!(b.seller_net < Decimal::ZERO);
        assert_eq!(b.total, b.subtotal + b.platform_fee + b.processor_fee);
    }

    #[test]
    fn rejects_invalid_inputs() {
        let cfg = FeeSnapshot::default();
        assert!(matches!(
            compute(Decimal::ZERO, 1, PaymentMethod::Cash, &cfg),
            Err(MarketError::InvalidInput(_))
        ));
        assert!(matches!(
            compute(dec!(-5), 1, PaymentMethod::Cash, &cfg),
            Err(MarketError::InvalidInput(_))
        ));
        assert!(matches!(
            compute(dec!(5), 0, PaymentMethod::Cash, &cfg),
            Err(MarketError::InvalidInput(_))
        ));

        let bad = FeeSnapshot {
            platform_fee_fixed: dec!(-0.42),
            ..FeeSnapshot::default()
        };
        assert!(matches!(
            compute(dec!(5), 1, PaymentMethod::Cash, &bad),
            Err(MarketError::InvalidInput(_))
        ));
    }
}
