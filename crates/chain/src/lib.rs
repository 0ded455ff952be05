//! Box keeper chain interaction layer.
//!
//! This crate provides:
//! - Contract bindings for both box generations, the helper and XEN token
//! - One [`BoxContract`] implementation per generation
//! - [`ChainGateway`]: versioned reads and fire-and-forget writes
//! - Bounded fixed-interval retry for reads
//! - Reference-currency pricing (reserve ratio or simulated swap)
//! - Transaction signing and sending
//!
//! Supports any EVM chain where the upgradeable box is deployed; the legacy
//! box is optional per chain.

pub mod contracts;
mod error;
mod gateway;
pub mod oracle;
mod retry;
mod signer;
mod types;
pub mod u256_math;

pub use contracts::{BoxContract, LegacyBox, UpgradeableBox};
pub use error::{ChainError, WriteError};
pub use gateway::{BoxDeployment, ChainGateway, EvmGateway};
pub use oracle::{PriceOracle, PriceQuote, PriceStrategy, ReserveRatio, SimulatedSwap};
pub use retry::{RetryingCaller, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL};
pub use signer::TransactionSender;
pub use types::{
    ContractVersion, FeeSchedule, PoolReserves, PositionKey, ReferralAccount, TokenId, TokenSnapshot,
    WriteOptions, FEE_TIERS,
};
