//! Box keeper core logic.
//!
//! This crate provides the position and reward aggregation engine:
//! - Engine and per-chain configuration
//! - Reward calculator (tier fees, penalty curves, referral shares)
//! - Fetch-once, single-flight token record cache with bounded concurrency
//! - Position views (owned, claimable, force-eligible, referral, search)
//! - Explicit per-account session context
//! - Persisted first-write-wins referral codes

pub mod config;
mod position;
mod position_cache;
mod position_index;
mod referral_store;
pub mod reward;
mod session;

#[cfg(test)]
mod testing;

pub use config::{load_from_env, ChainConfig, ConfigRegistry, EngineConfig};
pub use position::{PositionStatus, PositionView, TokenRecord};
pub use position_cache::{PositionCache, DEFAULT_MAX_CONCURRENT_FETCHES};
pub use position_index::{
    value_record, PositionIndex, PositionListing, SearchError, SearchQuery, Valuation, DEFAULT_PAGE_SIZE,
};
pub use referral_store::{ReferralStore, DEFAULT_REFERRAL_STORE};
pub use reward::{
    CappedLinearPenalty, FeeSchedules, PenaltyCurve, RewardError, WithdrawalWindowPenalty,
};
pub use session::{ChainStats, ReferralState, SessionContext};
