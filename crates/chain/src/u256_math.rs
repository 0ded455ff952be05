//! U256 arithmetic for reward and price calculations.
//!
//! All helpers floor toward zero and never narrow to a machine integer.

use alloy::primitives::U256;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10000u64, 0, 0, 0]);

/// Percent denominator (100 = 100%)
pub const PERCENT_DENOMINATOR: U256 = U256::from_limbs([100u64, 0, 0, 0]);

/// Reward token decimals
pub const REWARD_DECIMALS: u8 = 18;

/// Fast power of 10 (up to 10^77).
#[inline]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// `a * b / denominator`, floored.
///
/// Falls back to a split computation when `a * b` overflows, which is exact
/// as long as the final result fits in 256 bits. Returns zero for a zero
/// denominator.
#[inline]
pub fn mul_div_floor(a: U256, b: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::ZERO;
    }
    match a.checked_mul(b) {
        Some(product) => product / denominator,
        None => {
            let whole = (a / denominator).saturating_mul(b);
            let rem = (a % denominator).saturating_mul(b) / denominator;
            whole.saturating_add(rem)
        }
    }
}

/// Portion of `value` given by `basis_points`.
/// Returns: value * basis_points / 10000
#[inline]
pub fn basis_points_of(value: U256, basis_points: u16) -> U256 {
    mul_div_floor(value, U256::from(basis_points), BPS_DENOMINATOR)
}

/// Apply basis points reduction (e.g., for protocol fees).
/// Returns: value * (10000 - basis_points) / 10000
///
/// Example: apply_basis_points(1000, 100) = 990 (1% reduction)
#[inline]
pub fn apply_basis_points(value: U256, basis_points: u16) -> U256 {
    let factor = U256::from(10000u16.saturating_sub(basis_points));
    mul_div_floor(value, factor, BPS_DENOMINATOR)
}

/// Portion of `value` given by `percent`.
/// Returns: value * percent / 100
#[inline]
pub fn percent_of(value: U256, percent: u16) -> U256 {
    mul_div_floor(value, U256::from(percent), PERCENT_DENOMINATOR)
}

/// Apply a percentage reduction (e.g., for late-claim penalties).
/// Returns: value * (100 - percent) / 100
#[inline]
pub fn apply_percent(value: U256, percent: u8) -> U256 {
    let factor = U256::from(100u8.saturating_sub(percent));
    mul_div_floor(value, factor, PERCENT_DENOMINATOR)
}

/// Convert WAD (18 decimals) to f64.
/// Use only for display/logging, not for computation.
#[inline]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        wad.to_string().parse::<f64>().unwrap_or(f64::MAX) / 1e18
    }
}

/// Render a fixed-point amount with at most `fraction_digits` decimals,
/// trimming trailing zeros (truncates, never rounds).
///
/// Example: format_units(1_234_500_000_000_000_000, 18, 2) = "1.23"
pub fn format_units(value: U256, decimals: u8, fraction_digits: usize) -> String {
    let digits = value.to_string();
    if value.is_zero() {
        return digits;
    }

    let decimals = decimals as usize;
    let (int_part, frac_part) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", digits, width = decimals))
    };

    let frac: String = frac_part.chars().take(fraction_digits).collect();
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int_part
    } else {
        format!("{}.{}", int_part, frac)
    }
}
