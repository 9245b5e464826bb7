//! Resale pricing.
//!
//! `price = round5(clamp(BASE_VALUE * multiplier(tier), MIN_PRICE, MAX_PRICE))`
//!
//! Multipliers are decimals so the result is exactly reproducible.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::value_objects::RarityTier;

/// Base value every multiplier scales
pub const BASE_VALUE: u64 = 50;

/// Lowest price an item can carry
pub const MIN_PRICE: u64 = 10;

/// Highest price an item can carry
pub const MAX_PRICE: u64 = 10_000;

/// Prices are rounded to a multiple of this unit
pub const ROUND_TO: u64 = 5;

/// Price multiplier for a tier. Monotonically increasing in tier order.
pub fn multiplier(tier: RarityTier) -> Decimal {
    match tier {
        RarityTier::F => dec!(1.0),
        RarityTier::E => dec!(1.2),
        RarityTier::D => dec!(1.5),
        RarityTier::C => dec!(2.0),
        RarityTier::B => dec!(2.5),
        RarityTier::A => dec!(3.5),
        RarityTier::S => dec!(5.0),
        RarityTier::SPlus => dec!(7.0),
    }
}

/// Compute the resale price of a tier.
///
/// # Example
///
/// ```
/// # use tokendex_domain::{compute_price, RarityTier};
/// assert_eq!(compute_price(RarityTier::F), 50);
/// assert_eq!(compute_price(RarityTier::SPlus), 350);
/// ```
pub fn compute_price(tier: RarityTier) -> u64 {
    price_from_multiplier(multiplier(tier))
}

/// Compute the price for a stored rarity label.
///
/// Unrecognized labels price like the lowest tier instead of failing.
pub fn compute_price_for_label(label: &str) -> u64 {
    let multiplier = label.parse::<RarityTier>().map(multiplier).unwrap_or(dec!(1.0));
    price_from_multiplier(multiplier)
}

/// Whether a stored price satisfies the inventory invariant
pub fn is_valid_price(price: u64) -> bool {
    (MIN_PRICE..=MAX_PRICE).contains(&price)
}

fn price_from_multiplier(multiplier: Decimal) -> u64 {
    let raw = Decimal::from(BASE_VALUE) * multiplier;
    let clamped = raw.clamp(Decimal::from(MIN_PRICE), Decimal::from(MAX_PRICE));

    let unit = Decimal::from(ROUND_TO);
    let rounded =
        (clamped / unit).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * unit;

    // Bounds are themselves multiples of ROUND_TO, so rounding stays in range
    rounded.to_u64().unwrap_or(MIN_PRICE)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prices_within_bounds_and_rounded() {
        for tier in RarityTier::ALL {
            let price = compute_price(tier);
            assert!(is_valid_price(price), "{} priced {}", tier, price);
            assert_eq!(price % ROUND_TO, 0, "{} priced {}", tier, price);
        }
    }

    #[test]
    fn test_prices_monotonic() {
        let prices: Vec<u64> = RarityTier::ALL.iter().map(|t| compute_price(*t)).collect();
        for pair in prices.windows(2) {
            assert!(pair[0] <= pair[1], "prices not monotonic: {:?}", prices);
        }
    }

    #[test]
    fn test_price_table() {
        let expected = [50, 60, 75, 100, 125, 175, 250, 350];
        for (tier, price) in RarityTier::ALL.iter().zip(expected) {
            assert_eq!(compute_price(*tier), price, "tier {}", tier);
        }
    }

    #[test]
    fn test_unknown_label_uses_default_multiplier() {
        assert_eq!(compute_price_for_label("legendary"), 50);
        assert_eq!(compute_price_for_label("A"), compute_price(RarityTier::A));
    }

    #[test]
    fn test_clamp_and_round() {
        assert_eq!(price_from_multiplier(dec!(0.01)), MIN_PRICE);
        assert_eq!(price_from_multiplier(dec!(1000)), MAX_PRICE);
        // 50 * 1.25 = 62.5 -> 12.5 units -> 13 units
        assert_eq!(price_from_multiplier(dec!(1.25)), 65);
        // 50 * 1.23 = 61.5 -> 12.3 units -> 12 units
        assert_eq!(price_from_multiplier(dec!(1.23)), 60);
    }

    #[test]
    fn test_reproducible() {
        for tier in RarityTier::ALL {
            assert_eq!(compute_price(tier), compute_price(tier));
        }
    }
}
