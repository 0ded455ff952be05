//! Versioned chain access for one chain session.
//!
//! [`ChainGateway`] is the only surface the engine uses to talk to a chain.
//! [`EvmGateway`] implements it over JSON-RPC with one [`BoxContract`] per
//! deployed generation; tests substitute an in-memory gateway.

use alloy::primitives::{Address, B256, U256};
use alloy::providers::ProviderBuilder;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Url;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::contracts::common::{IQuoterV2, IUniswapV2Pair, IERC20};
use crate::contracts::{BoxContract, LegacyBox, UpgradeableBox};
use crate::error::{ChainError, WriteError};
use crate::signer::TransactionSender;
use crate::types::{
    ContractVersion, FeeSchedule, PoolReserves, ReferralAccount, TokenId, TokenSnapshot, WriteOptions,
};

/// Read and write calls against whichever contract generations a chain has.
///
/// Reads return raw chain state; retries and caching belong to the caller.
/// Writes are fire-and-forget: they resolve with the transaction hash.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Generations deployed on this chain, legacy first.
    fn versions(&self) -> Vec<ContractVersion>;

    /// Box contract address of a generation.
    fn box_address(&self, version: ContractVersion) -> Option<Address>;

    async fn total_supply(&self, version: ContractVersion) -> Result<u64, ChainError>;

    /// One page of token ids owned by `owner`, ascending.
    async fn enumerate_owned(
        &self,
        version: ContractVersion,
        owner: Address,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TokenId>, ChainError>;

    /// One page of upgradeable token ids minted with `referrer`.
    async fn enumerate_referred(
        &self,
        referrer: Address,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TokenId>, ChainError>;

    /// One page of upgradeable token ids open to force-renewal by anyone.
    async fn enumerate_force_candidates(&self, offset: usize, limit: usize) -> Result<Vec<TokenId>, ChainError>;

    async fn fetch_record(&self, version: ContractVersion, token_id: TokenId) -> Result<TokenSnapshot, ChainError>;

    /// Opaque reward curve: per-account reward for a mint at `rank` and `term_days`.
    async fn evaluate_reward_curve(&self, rank: u64, term_days: u64) -> Result<U256, ChainError>;

    async fn fetch_fee_schedule(&self, version: ContractVersion) -> Result<FeeSchedule, ChainError>;

    async fn fetch_referral_account(&self, account: Address) -> Result<ReferralAccount, ChainError>;

    async fn fetch_pool_reserves(&self, pool: Address) -> Result<PoolReserves, ChainError>;

    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, ChainError>;

    /// Input amount of `token_in` needed to receive `amount_out` of `token_out`.
    async fn quote_exact_output(
        &self,
        quoter: Address,
        token_in: Address,
        token_out: Address,
        amount_out: U256,
        fee: u32,
    ) -> Result<U256, ChainError>;

    async fn mint(
        &self,
        unit_count: u64,
        term_days: u64,
        referrer: Address,
        options: WriteOptions,
    ) -> Result<B256, WriteError>;

    async fn claim(
        &self,
        version: ContractVersion,
        token_id: TokenId,
        term_days: u64,
        options: WriteOptions,
    ) -> Result<B256, WriteError>;

    async fn force_renew(&self, token_id: TokenId, term_days: u64, options: WriteOptions) -> Result<B256, WriteError>;

    async fn claim_referral_reward(&self, options: WriteOptions) -> Result<B256, WriteError>;
}

/// Box contract addresses of one chain.
#[derive(Debug, Clone)]
pub struct BoxDeployment {
    /// V0 box, mainnet only
    pub legacy_box: Option<Address>,
    pub upgradeable_box: Address,
    pub helper: Address,
    pub xen: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Listing {
    Owned(ContractVersion),
    Referred,
    ForceCandidates,
}

/// JSON-RPC gateway.
///
/// The helper contract returns a whole ownership listing per call, so the
/// first page (offset 0) fetches and memoizes the listing and later pages
/// are sliced from it.
pub struct EvmGateway {
    chain_id: u64,
    contracts: BTreeMap<ContractVersion, Arc<dyn BoxContract>>,
    upgradeable: Arc<UpgradeableBox>,
    rpc_url: Url,
    listings: DashMap<(Listing, Address), Arc<Vec<TokenId>>>,
    sender: Option<Arc<TransactionSender>>,
}

impl EvmGateway {
    pub fn new(rpc_url: Url, chain_id: u64, deployment: BoxDeployment) -> Self {
        let upgradeable = Arc::new(UpgradeableBox::new(
            rpc_url.clone(),
            deployment.upgradeable_box,
            deployment.helper,
        ));

        let mut contracts: BTreeMap<ContractVersion, Arc<dyn BoxContract>> = BTreeMap::new();
        if let Some(legacy_box) = deployment.legacy_box {
            contracts.insert(
                ContractVersion::Legacy,
                Arc::new(LegacyBox::new(rpc_url.clone(), legacy_box, deployment.helper, deployment.xen)),
            );
        }
        contracts.insert(ContractVersion::Upgradeable, upgradeable.clone());

        Self {
            chain_id,
            contracts,
            upgradeable,
            rpc_url,
            listings: DashMap::new(),
            sender: None,
        }
    }

    /// Enable writes through `sender`.
    pub fn with_sender(mut self, sender: TransactionSender) -> Self {
        self.sender = Some(Arc::new(sender));
        self
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.sender.as_ref().map(|s| s.address)
    }

    fn contract(&self, version: ContractVersion) -> Result<&Arc<dyn BoxContract>, ChainError> {
        self.contracts
            .get(&version)
            .ok_or(ChainError::VersionUnavailable(version))
    }

    fn sender(&self) -> Result<&TransactionSender, WriteError> {
        self.sender.as_deref().ok_or(WriteError::NoSigner)
    }

    async fn listing_page(
        &self,
        listing: Listing,
        account: Address,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TokenId>, ChainError> {
        let key = (listing, account);
        let cached = if offset == 0 {
            None
        } else {
            self.listings.get(&key).map(|entry| entry.value().clone())
        };

        let ids = match cached {
            Some(ids) => ids,
            None => {
                let ids = Arc::new(self.fetch_listing(listing, account).await?);
                debug!(?listing, account = %account, count = ids.len(), "Listing fetched");
                self.listings.insert(key, ids.clone());
                ids
            }
        };

        Ok(ids.iter().skip(offset).take(limit).copied().collect())
    }

    async fn fetch_listing(&self, listing: Listing, account: Address) -> Result<Vec<TokenId>, ChainError> {
        match listing {
            Listing::Owned(version) => {
                let contract = self.contract(version)?;
                let total = contract.total_supply().await?;
                contract.owned_token_ids(account, total).await
            }
            Listing::Referred => {
                let total = self.upgradeable.total_supply().await?;
                self.upgradeable.referred_token_ids(account, total).await
            }
            Listing::ForceCandidates => {
                let total = self.upgradeable.total_supply().await?;
                self.upgradeable.force_candidate_ids(total).await
            }
        }
    }
}

#[async_trait]
impl ChainGateway for EvmGateway {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn versions(&self) -> Vec<ContractVersion> {
        self.contracts.keys().copied().collect()
    }

    fn box_address(&self, version: ContractVersion) -> Option<Address> {
        self.contracts.get(&version).map(|c| c.address())
    }

    async fn total_supply(&self, version: ContractVersion) -> Result<u64, ChainError> {
        self.contract(version)?.total_supply().await
    }

    #[instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn enumerate_owned(
        &self,
        version: ContractVersion,
        owner: Address,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TokenId>, ChainError> {
        self.listing_page(Listing::Owned(version), owner, offset, limit).await
    }

    #[instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn enumerate_referred(
        &self,
        referrer: Address,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TokenId>, ChainError> {
        self.listing_page(Listing::Referred, referrer, offset, limit).await
    }

    #[instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn enumerate_force_candidates(&self, offset: usize, limit: usize) -> Result<Vec<TokenId>, ChainError> {
        self.listing_page(Listing::ForceCandidates, Address::ZERO, offset, limit)
            .await
    }

    async fn fetch_record(&self, version: ContractVersion, token_id: TokenId) -> Result<TokenSnapshot, ChainError> {
        self.contract(version)?.token_snapshot(token_id).await
    }

    async fn evaluate_reward_curve(&self, rank: u64, term_days: u64) -> Result<U256, ChainError> {
        self.upgradeable.mint_reward_curve(rank, term_days).await
    }

    async fn fetch_fee_schedule(&self, version: ContractVersion) -> Result<FeeSchedule, ChainError> {
        self.contract(version)?.fee_schedule().await
    }

    async fn fetch_referral_account(&self, account: Address) -> Result<ReferralAccount, ChainError> {
        self.upgradeable.referral_account(account).await
    }

    async fn fetch_pool_reserves(&self, pool: Address) -> Result<PoolReserves, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let pair = IUniswapV2Pair::new(pool, &provider);

        let reserves_call = pair.getReserves();
        let token0_call = pair.token0();
        let (reserves, token0) = tokio::try_join!(reserves_call.call(), token0_call.call())
            .map_err(|e| ChainError::rpc("getReserves", e))?;

        Ok(PoolReserves {
            reserve0: U256::from(reserves.reserve0),
            reserve1: U256::from(reserves.reserve1),
            token0: token0._0,
        })
    }

    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let erc20 = IERC20::new(token, &provider);
        Ok(erc20
            .balanceOf(holder)
            .call()
            .await
            .map_err(|e| ChainError::rpc("balanceOf", e))?
            ._0)
    }

    async fn quote_exact_output(
        &self,
        quoter: Address,
        token_in: Address,
        token_out: Address,
        amount_out: U256,
        fee: u32,
    ) -> Result<U256, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let quoter = IQuoterV2::new(quoter, &provider);

        let params = IQuoterV2::QuoteExactOutputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amount: amount_out,
            fee: alloy::primitives::Uint::<24, 1>::from(fee & 0xFFFFFF),
            sqrtPriceLimitX96: alloy::primitives::U160::ZERO,
        };

        let result = quoter
            .quoteExactOutputSingle(params)
            .call()
            .await
            .map_err(|e| ChainError::rpc("quoteExactOutputSingle", e))?;
        Ok(result.amountIn)
    }

    async fn mint(
        &self,
        unit_count: u64,
        term_days: u64,
        referrer: Address,
        options: WriteOptions,
    ) -> Result<B256, WriteError> {
        let calldata = self.upgradeable.encode_mint(unit_count, term_days, referrer);
        self.sender()?
            .send(self.upgradeable.address(), calldata, options)
            .await
    }

    async fn claim(
        &self,
        version: ContractVersion,
        token_id: TokenId,
        term_days: u64,
        options: WriteOptions,
    ) -> Result<B256, WriteError> {
        let contract = self
            .contracts
            .get(&version)
            .ok_or(WriteError::VersionUnavailable(version))?;
        let calldata = contract.encode_claim(token_id, term_days);
        self.sender()?.send(contract.address(), calldata, options).await
    }

    async fn force_renew(&self, token_id: TokenId, term_days: u64, options: WriteOptions) -> Result<B256, WriteError> {
        let calldata = self.upgradeable.encode_force(token_id, term_days);
        self.sender()?
            .send(self.upgradeable.address(), calldata, options)
            .await
    }

    async fn claim_referral_reward(&self, options: WriteOptions) -> Result<B256, WriteError> {
        let calldata = self.upgradeable.encode_get_reward();
        self.sender()?
            .send(self.upgradeable.address(), calldata, options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(legacy: bool) -> BoxDeployment {
        BoxDeployment {
            legacy_box: legacy.then(|| Address::repeat_byte(0x01)),
            upgradeable_box: Address::repeat_byte(0x02),
            helper: Address::repeat_byte(0x03),
            xen: Address::repeat_byte(0x04),
        }
    }

    fn gateway(legacy: bool) -> EvmGateway {
        EvmGateway::new("http://127.0.0.1:1".parse().unwrap(), 1, deployment(legacy))
    }

    #[test]
    fn test_versions_follow_deployment() {
        assert_eq!(
            gateway(true).versions(),
            vec![ContractVersion::Legacy, ContractVersion::Upgradeable]
        );
        assert_eq!(gateway(false).versions(), vec![ContractVersion::Upgradeable]);
        assert_eq!(gateway(false).box_address(ContractVersion::Legacy), None);
    }

    #[tokio::test]
    async fn test_missing_version_is_reported() {
        let result = gateway(false).total_supply(ContractVersion::Legacy).await;
        assert!(matches!(
            result,
            Err(ChainError::VersionUnavailable(ContractVersion::Legacy))
        ));
    }

    #[tokio::test]
    async fn test_writes_without_signer() {
        let gw = gateway(true);
        assert_eq!(
            gw.claim_referral_reward(WriteOptions::default()).await,
            Err(WriteError::NoSigner)
        );
        assert_eq!(
            gw.claim(ContractVersion::Legacy, 1, 100, WriteOptions::default()).await,
            Err(WriteError::NoSigner)
        );
        assert_eq!(
            gateway(false)
                .claim(ContractVersion::Legacy, 1, 100, WriteOptions::default())
                .await,
            Err(WriteError::VersionUnavailable(ContractVersion::Legacy))
        );
    }

    #[tokio::test]
    async fn test_pages_are_served_from_memoized_listing() {
        let gw = gateway(false);
        let owner = Address::repeat_byte(0x09);
        gw.listings.insert(
            (Listing::Owned(ContractVersion::Upgradeable), owner),
            Arc::new((0..120).collect()),
        );

        let page = gw
            .enumerate_owned(ContractVersion::Upgradeable, owner, 50, 50)
            .await
            .unwrap();
        assert_eq!(page.first(), Some(&50));
        assert_eq!(page.len(), 50);

        let tail = gw
            .enumerate_owned(ContractVersion::Upgradeable, owner, 100, 50)
            .await
            .unwrap();
        assert_eq!(tail.len(), 20);
    }
}
