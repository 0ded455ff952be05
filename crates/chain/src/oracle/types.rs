//! Price quote type and the fixed-point helpers around it.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::u256_math::{format_units, mul_div_floor, WAD};

/// Reference units per one reward unit, 18-decimal fixed point.
///
/// Zero means the price is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct PriceQuote(pub U256);

impl PriceQuote {
    pub const UNAVAILABLE: PriceQuote = PriceQuote(U256::ZERO);

    pub fn is_available(&self) -> bool {
        !self.0.is_zero()
    }

    pub fn as_option(&self) -> Option<U256> {
        self.is_available().then_some(self.0)
    }

    /// Express a reward amount (18 decimals) in reference units.
    ///
    /// Returns `None` when the quote is unavailable.
    pub fn convert(&self, reward_amount: U256) -> Option<U256> {
        self.as_option()
            .map(|price| mul_div_floor(reward_amount, price, WAD))
    }
}

impl fmt::Display for PriceQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_available() {
            write!(f, "{}", format_units(self.0, 18, 18))
        } else {
            write!(f, "unavailable")
        }
    }
}

/// Spot price from constant-product reserves:
/// `reference_reserve * 1e18 / reward_reserve`.
///
/// An empty reward side yields [`PriceQuote::UNAVAILABLE`].
pub fn reserve_ratio_price(reference_reserve: U256, reward_reserve: U256) -> PriceQuote {
    if reward_reserve.is_zero() {
        return PriceQuote::UNAVAILABLE;
    }
    PriceQuote(mul_div_floor(reference_reserve, WAD, reward_reserve))
}
