//! Box contract generations behind one interface.
//!
//! Each generation resolves ownership, token state and fees differently:
//!
//! - **Legacy (V0)**: mint data lives on the XEN token, keyed by a proxy
//!   address derived from the token's `start` index; one flat fee.
//! - **Upgradeable (V1)**: mint data is mirrored on the box contract and
//!   looked up by token id; four tiered fees; referrals.
//!
//! Callers only see [`BoxContract`]. Nothing outside this module and the
//! gateway branches on [`ContractVersion`].
//!
//! # Example
//!
//! ```rust,ignore
//! use boxkeeper_chain::contracts::{BoxContract, UpgradeableBox};
//!
//! let upgradeable = UpgradeableBox::new(rpc_url, box_address, helper_address);
//! let snapshot = upgradeable.token_snapshot(42).await?;
//! ```

pub mod bindings;
pub mod common;
mod legacy;
mod upgradeable;

pub use legacy::LegacyBox;
pub use upgradeable::UpgradeableBox;

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::ProviderBuilder;
use async_trait::async_trait;
use reqwest::Url;
use std::fmt::Debug;

use bindings::IXenBoxHelper;

use crate::error::ChainError;
use crate::types::{ContractVersion, FeeSchedule, TokenId, TokenSnapshot};

/// Read surface and calldata encoding of one box contract generation.
#[async_trait]
pub trait BoxContract: Send + Sync + Debug {
    /// Generation implemented by this contract.
    fn version(&self) -> ContractVersion;

    /// Box contract address.
    fn address(&self) -> Address;

    /// Number of tokens ever minted (token ids are `0..total`).
    async fn total_supply(&self) -> Result<u64, ChainError>;

    /// Token ids in `0..total` owned by `owner`, ascending.
    async fn owned_token_ids(&self, owner: Address, total: u64) -> Result<Vec<TokenId>, ChainError>;

    /// Range, maturity, term and per-account reward of a token.
    async fn token_snapshot(&self, token_id: TokenId) -> Result<TokenSnapshot, ChainError>;

    /// Current fee schedule.
    async fn fee_schedule(&self) -> Result<FeeSchedule, ChainError>;

    /// Calldata for `claim(tokenId, term)`.
    fn encode_claim(&self, token_id: TokenId, term_days: u64) -> Bytes;
}

/// Owned token ids of `target` through the helper's range scan.
///
/// The helper walks `[0, total)` server-side, so a single eth_call covers
/// the whole collection.
pub(crate) async fn helper_owned_ids(
    rpc_url: &Url,
    helper: Address,
    target: Address,
    owner: Address,
    total: u64,
) -> Result<Vec<TokenId>, ChainError> {
    let provider = ProviderBuilder::new().on_http(rpc_url.clone());
    let contract = IXenBoxHelper::new(helper, &provider);
    let ids = contract
        .getOwnedTokenIdList(target, owner, U256::ZERO, U256::from(total))
        .call()
        .await
        .map_err(|e| ChainError::rpc("getOwnedTokenIdList", e))?
        ._0;
    to_token_ids(ids, "getOwnedTokenIdList")
}

/// Per-account mint reward of a proxy at the current block.
pub(crate) async fn helper_mint_reward(
    rpc_url: &Url,
    helper: Address,
    proxy: Address,
) -> Result<U256, ChainError> {
    let provider = ProviderBuilder::new().on_http(rpc_url.clone());
    let contract = IXenBoxHelper::new(helper, &provider);
    Ok(contract
        .calculateMintReward(proxy)
        .call()
        .await
        .map_err(|e| ChainError::rpc("calculateMintReward", e))?
        ._0)
}

/// Narrow a U256 read from chain into a u64.
pub(crate) fn to_u64(value: U256, operation: &'static str) -> Result<u64, ChainError> {
    u64::try_from(value).map_err(|_| ChainError::invalid(operation, format!("{} exceeds u64", value)))
}

/// Narrow a fee rate read from chain into basis points.
pub(crate) fn to_bps(value: U256, operation: &'static str) -> Result<u16, ChainError> {
    let bps = u16::try_from(value)
        .map_err(|_| ChainError::invalid(operation, format!("fee {} is not a basis-point value", value)))?;
    if bps > 10_000 {
        return Err(ChainError::invalid(operation, format!("fee {} exceeds 10000 bps", bps)));
    }
    Ok(bps)
}

/// Convert a list of U256 token ids.
pub(crate) fn to_token_ids(ids: Vec<U256>, operation: &'static str) -> Result<Vec<TokenId>, ChainError> {
    ids.into_iter().map(|id| to_u64(id, operation)).collect()
}
