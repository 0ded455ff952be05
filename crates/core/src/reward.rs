//! Reward arithmetic: tier fees, penalty curves, net and referral amounts.
//!
//! Pure functions over U256. Every division floors.

use alloy::primitives::U256;
use boxkeeper_chain::u256_math::{apply_basis_points, apply_percent, basis_points_of, percent_of};
use boxkeeper_chain::{ContractVersion, FeeSchedule};
use std::collections::HashMap;
use std::fmt::Debug;
use thiserror::Error;

use crate::config::{PenaltyConfig, PenaltyCurveKind};

const SECONDS_PER_DAY: u64 = 86_400;

/// Reward computation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardError {
    /// Batch size has no fee tier.
    #[error("no fee tier for {unit_count} units on {version}")]
    UnsupportedTier { version: ContractVersion, unit_count: u64 },

    /// Fee schedule not loaded for a version.
    #[error("fee schedule for {0} not loaded")]
    ScheduleMissing(ContractVersion),

    /// Batch reward does not fit in 256 bits.
    #[error("reward of {unit_count} units overflows")]
    Overflow { unit_count: u64 },
}

/// Fee schedules of every deployed generation.
#[derive(Debug, Clone, Default)]
pub struct FeeSchedules {
    schedules: HashMap<ContractVersion, FeeSchedule>,
}

impl FeeSchedules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, version: ContractVersion, schedule: FeeSchedule) {
        self.schedules.insert(version, schedule);
    }

    pub fn get(&self, version: ContractVersion) -> Option<&FeeSchedule> {
        self.schedules.get(&version)
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}

/// Fee rate in basis points for a batch of `unit_count` on `version`.
pub fn fee_rate(schedules: &FeeSchedules, version: ContractVersion, unit_count: u64) -> Result<u16, RewardError> {
    let schedule = schedules
        .get(version)
        .ok_or(RewardError::ScheduleMissing(version))?;
    schedule
        .rate_for(unit_count)
        .ok_or(RewardError::UnsupportedTier { version, unit_count })
}

/// Reward of a whole batch: per-account reward times unit count.
pub fn gross_reward(reward_per_account: U256, unit_count: u64) -> Result<U256, RewardError> {
    reward_per_account
        .checked_mul(U256::from(unit_count))
        .ok_or(RewardError::Overflow { unit_count })
}

/// `gross * (10000 - fee) / 10000`.
pub fn net_claimable(
    gross: U256,
    unit_count: u64,
    schedules: &FeeSchedules,
    version: ContractVersion,
) -> Result<U256, RewardError> {
    let fee = fee_rate(schedules, version, unit_count)?;
    Ok(apply_basis_points(gross, fee))
}

/// `(gross * fee / 10000) * refer_fee_percent / 100`.
pub fn referral_share(
    gross: U256,
    unit_count: u64,
    schedules: &FeeSchedules,
    version: ContractVersion,
    refer_fee_percent: u16,
) -> Result<U256, RewardError> {
    let fee = fee_rate(schedules, version, unit_count)?;
    Ok(percent_of(basis_points_of(gross, fee), refer_fee_percent))
}

/// `net * (100 - penalty) / 100`.
pub fn net_after_penalty(net: U256, penalty_percent: u8) -> U256 {
    apply_percent(net, penalty_percent)
}

/// Rank scaled to a term: `ceil(rank * term / default_term)`.
pub fn scaled_rank(rank: u64, term_days: u64, default_term_days: u64) -> u64 {
    if default_term_days == 0 {
        return rank;
    }
    let scaled = (rank as u128 * term_days as u128).div_ceil(default_term_days as u128);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Late-claim penalty as a function of time past maturity.
///
/// Implementations return 0 before maturity and never decrease as `now`
/// grows.
pub trait PenaltyCurve: Send + Sync + Debug {
    fn penalty_percent(&self, maturity_ts: u64, now: u64) -> u8;
}

/// `percent_per_day` for every full day past maturity plus grace, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CappedLinearPenalty {
    pub grace_secs: u64,
    pub percent_per_day: u8,
    pub max_percent: u8,
}

impl Default for CappedLinearPenalty {
    fn default() -> Self {
        Self {
            grace_secs: 0,
            percent_per_day: 1,
            max_percent: 99,
        }
    }
}

impl PenaltyCurve for CappedLinearPenalty {
    fn penalty_percent(&self, maturity_ts: u64, now: u64) -> u8 {
        let start = maturity_ts.saturating_add(self.grace_secs);
        if maturity_ts == 0 || now <= start {
            return 0;
        }
        let days_late = (now - start) / SECONDS_PER_DAY;
        let penalty = days_late.saturating_mul(self.percent_per_day as u64);
        penalty.min(self.max_percent.min(100) as u64) as u8
    }
}

/// XEN's withdrawal-window schedule: `2^(days+3) / 7 - 1` percent for the
/// first week late, then the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalWindowPenalty {
    pub window_days: u64,
    pub max_percent: u8,
}

impl Default for WithdrawalWindowPenalty {
    fn default() -> Self {
        Self {
            window_days: 7,
            max_percent: 99,
        }
    }
}

impl PenaltyCurve for WithdrawalWindowPenalty {
    fn penalty_percent(&self, maturity_ts: u64, now: u64) -> u8 {
        if maturity_ts == 0 || now <= maturity_ts || self.window_days == 0 {
            return 0;
        }
        let days_late = (now - maturity_ts) / SECONDS_PER_DAY;
        let max = self.max_percent.min(100) as u64;
        if days_late > self.window_days - 1 || days_late + 3 >= 64 {
            return max as u8;
        }
        let penalty = ((1u64 << (days_late + 3)) / self.window_days).saturating_sub(1);
        penalty.min(max) as u8
    }
}

/// Penalty curve selected by configuration.
pub fn penalty_curve_from_config(config: &PenaltyConfig) -> Box<dyn PenaltyCurve> {
    match config.curve {
        PenaltyCurveKind::CappedLinear => Box::new(CappedLinearPenalty {
            grace_secs: config.grace_secs,
            percent_per_day: config.percent_per_day,
            max_percent: config.max_percent,
        }),
        PenaltyCurveKind::WithdrawalWindow => Box::new(WithdrawalWindowPenalty {
            max_percent: config.max_percent,
            ..Default::default()
        }),
    }
}
