//! Position data structures for box tokens.

use alloy::primitives::U256;
use boxkeeper_chain::{ContractVersion, PositionKey, TokenId, TokenSnapshot};
use serde::{Deserialize, Serialize};

use crate::reward::{self, RewardError};

/// Cached state of one box token. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub version: ContractVersion,
    pub token_id: TokenId,
    /// First sub-account index (inclusive)
    pub range_start: u64,
    /// Last sub-account index (exclusive)
    pub range_end: u64,
    /// Unix seconds; 0 means not resolvable
    pub maturity_ts: u64,
    pub term_days: u64,
    /// Per-account reward times unit count (18 decimals)
    pub gross_reward: U256,
}

impl TokenRecord {
    /// Aggregate a chain snapshot into a record.
    pub fn from_snapshot(
        version: ContractVersion,
        token_id: TokenId,
        snapshot: &TokenSnapshot,
    ) -> Result<Self, RewardError> {
        Ok(Self {
            version,
            token_id,
            range_start: snapshot.range_start,
            range_end: snapshot.range_end,
            maturity_ts: snapshot.maturity_ts,
            term_days: snapshot.term_days,
            gross_reward: reward::gross_reward(snapshot.reward_per_account, snapshot.unit_count())?,
        })
    }

    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.version, self.token_id)
    }

    pub fn unit_count(&self) -> u64 {
        self.range_end.saturating_sub(self.range_start)
    }

    /// Maturity is known.
    pub fn is_resolved(&self) -> bool {
        self.maturity_ts != 0
    }

    /// Claimable at `now` (unix seconds).
    pub fn is_matured(&self, now: u64) -> bool {
        self.is_resolved() && now >= self.maturity_ts
    }

    pub fn status(&self, now: u64) -> PositionStatus {
        if !self.is_resolved() {
            PositionStatus::Unresolved
        } else if now >= self.maturity_ts {
            PositionStatus::Matured
        } else {
            PositionStatus::Locked
        }
    }
}

/// Lifecycle of a position as seen by a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionStatus {
    /// No record yet, or maturity not resolvable
    Unresolved,
    /// Before maturity
    Locked,
    /// At or past maturity
    Matured,
}

/// One row of a position view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionView {
    pub key: PositionKey,
    pub status: PositionStatus,
    /// Absent when the record could not be fetched
    pub record: Option<TokenRecord>,
    /// Fee-adjusted amount; absent for unsupported tiers or missing records
    pub net_claimable: Option<U256>,
    /// Net amount after the late-claim penalty at view time
    pub net_after_penalty: Option<U256>,
    /// Penalty percent at view time
    pub penalty_percent: u8,
    /// Net amount in reference units; absent when the price is unavailable
    pub reference_value: Option<U256>,
    /// Referrer's share of the fee (referral view only)
    pub referral_share: Option<U256>,
}

impl PositionView {
    /// Row for a key whose record is unavailable.
    pub fn unresolved(key: PositionKey) -> Self {
        Self {
            key,
            status: PositionStatus::Unresolved,
            record: None,
            net_claimable: None,
            net_after_penalty: None,
            penalty_percent: 0,
            reference_value: None,
            referral_share: None,
        }
    }
}
