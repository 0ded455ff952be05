//! Shared domain types for box positions across contract generations.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token id, unique only within a (chain, version) pair.
pub type TokenId = u64;

/// Contract generation a box token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractVersion {
    /// V0 XenBox, deployed on Ethereum mainnet only.
    Legacy,
    /// V1 XenBoxUpgradeable, deployed on every supported chain.
    Upgradeable,
}

impl ContractVersion {
    /// All generations, legacy first.
    pub const ALL: [ContractVersion; 2] = [ContractVersion::Legacy, ContractVersion::Upgradeable];

    /// Numeric tag used by the dApp ("0" / "1").
    pub fn tag(&self) -> u8 {
        match self {
            Self::Legacy => 0,
            Self::Upgradeable => 1,
        }
    }

    /// Whether this generation carries the referral mechanism.
    pub fn has_referrals(&self) -> bool {
        matches!(self, Self::Upgradeable)
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.tag())
    }
}

/// Cache key: a token id tagged with its generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub version: ContractVersion,
    pub token_id: TokenId,
}

impl PositionKey {
    pub fn new(version: ContractVersion, token_id: TokenId) -> Self {
        Self { version, token_id }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.version, self.token_id)
    }
}

/// Raw per-token state as read from chain, before reward aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    /// First sub-account index (inclusive)
    pub range_start: u64,
    /// Last sub-account index (exclusive)
    pub range_end: u64,
    /// Maturity timestamp (unix seconds); 0 when not yet resolvable
    pub maturity_ts: u64,
    /// Lock term in days
    pub term_days: u64,
    /// Mint reward of a single sub-account (18 decimals)
    pub reward_per_account: U256,
}

impl TokenSnapshot {
    /// Batch size of the box.
    pub fn unit_count(&self) -> u64 {
        self.range_end.saturating_sub(self.range_start)
    }
}

/// Batch-size tiers that carry a fee rate.
pub const FEE_TIERS: [u64; 4] = [10, 20, 50, 100];

/// Fee rate per batch-size tier, in basis points of 10 000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    tiers: [(u64, u16); 4],
}

impl FeeSchedule {
    /// Build a schedule from the four tier rates (10, 20, 50, 100).
    pub fn new(fee10: u16, fee20: u16, fee50: u16, fee100: u16) -> Self {
        Self {
            tiers: [(10, fee10), (20, fee20), (50, fee50), (100, fee100)],
        }
    }

    /// Same rate for every tier (legacy contract exposes a single fee).
    pub fn uniform(fee: u16) -> Self {
        Self::new(fee, fee, fee, fee)
    }

    /// Exact-match tier lookup.
    pub fn rate_for(&self, unit_count: u64) -> Option<u16> {
        self.tiers
            .iter()
            .find(|(units, _)| *units == unit_count)
            .map(|(_, bps)| *bps)
    }

    pub fn tiers(&self) -> &[(u64, u16)] {
        &self.tiers
    }
}

/// Reserves of a constant-product pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReserves {
    pub reserve0: U256,
    pub reserve1: U256,
    pub token0: Address,
}

impl PoolReserves {
    /// Split into (reference reserve, reward reserve) given the reference token.
    pub fn oriented(&self, reference_token: Address) -> (U256, U256) {
        if self.token0 == reference_token {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        }
    }
}

/// Referral standing of an account on the upgradeable contract.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferralAccount {
    /// Whether the account may earn referral rewards
    pub is_eligible: bool,
    /// Share of the protocol fee paid to referrers, in percent
    pub refer_fee_percent: u16,
    /// Referral reward accrued and not yet withdrawn
    pub unclaimed_reward: U256,
}

/// Optional overrides for state-mutating calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Legacy gas price in wei
    pub gas_price: Option<u128>,
}
