//! V1 XenBoxUpgradeable, deployed on every supported chain.

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::ProviderBuilder;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use super::bindings::{IXenBoxHelper, IXenBoxUpgradeable};
use super::{helper_mint_reward, helper_owned_ids, to_bps, to_token_ids, to_u64, BoxContract};
use crate::error::ChainError;
use crate::types::{ContractVersion, FeeSchedule, ReferralAccount, TokenId, TokenSnapshot};

/// Upgradeable box contract plus the referral and minting surface that
/// only this generation exposes.
#[derive(Debug, Clone)]
pub struct UpgradeableBox {
    rpc_url: Url,
    address: Address,
    helper: Address,
}

impl UpgradeableBox {
    pub fn new(rpc_url: Url, address: Address, helper: Address) -> Self {
        Self {
            rpc_url,
            address,
            helper,
        }
    }

    /// Token ids in `0..total` minted with `referrer` as referrer.
    pub async fn referred_token_ids(&self, referrer: Address, total: u64) -> Result<Vec<TokenId>, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let helper = IXenBoxHelper::new(self.helper, &provider);
        let ids = helper
            .getReferTokenIdList(self.address, referrer, U256::ZERO, U256::from(total))
            .call()
            .await
            .map_err(|e| ChainError::rpc("getReferTokenIdList", e))?
            ._0;
        to_token_ids(ids, "getReferTokenIdList")
    }

    /// Token ids in `0..total` that anyone may force-renew.
    pub async fn force_candidate_ids(&self, total: u64) -> Result<Vec<TokenId>, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let helper = IXenBoxHelper::new(self.helper, &provider);
        let ids = helper
            .getForceTokenIdList(self.address, U256::ZERO, U256::from(total))
            .call()
            .await
            .map_err(|e| ChainError::rpc("getForceTokenIdList", e))?
            ._0;
        to_token_ids(ids, "getForceTokenIdList")
    }

    /// Eligibility, fee share and accrued reward of a referrer.
    pub async fn referral_account(&self, account: Address) -> Result<ReferralAccount, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let contract = IXenBoxUpgradeable::new(self.address, &provider);

        let percent_call = contract.referFeePercent();
        let reward_call = contract.rewardMap(account);
        let refer_call = contract.isRefer(account);
        let (percent, reward, is_refer) = tokio::try_join!(
            percent_call.call(),
            reward_call.call(),
            refer_call.call()
        )
        .map_err(|e| ChainError::rpc("referralAccount", e))?;

        let refer_fee_percent = u16::try_from(percent._0)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| ChainError::invalid("referFeePercent", format!("{} is not a percentage", percent._0)))?;

        Ok(ReferralAccount {
            is_eligible: is_refer._0,
            refer_fee_percent,
            unclaimed_reward: reward._0,
        })
    }

    /// Per-account reward the curve pays for a hypothetical mint.
    pub async fn mint_reward_curve(&self, rank: u64, term_days: u64) -> Result<U256, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let helper = IXenBoxHelper::new(self.helper, &provider);
        Ok(helper
            .calculateMintRewardNew(U256::from(rank), U256::from(term_days))
            .call()
            .await
            .map_err(|e| ChainError::rpc("calculateMintRewardNew", e))?
            ._0)
    }

    /// Calldata for `mint(amount, term, refer)`.
    pub fn encode_mint(&self, unit_count: u64, term_days: u64, referrer: Address) -> Bytes {
        IXenBoxUpgradeable::mintCall {
            amount: U256::from(unit_count),
            term: U256::from(term_days),
            refer: referrer,
        }
        .abi_encode()
        .into()
    }

    /// Calldata for `force(tokenId, term)`.
    pub fn encode_force(&self, token_id: TokenId, term_days: u64) -> Bytes {
        IXenBoxUpgradeable::forceCall {
            tokenId: U256::from(token_id),
            term: U256::from(term_days),
        }
        .abi_encode()
        .into()
    }

    /// Calldata for `getReward()`.
    pub fn encode_get_reward(&self) -> Bytes {
        IXenBoxUpgradeable::getRewardCall {}.abi_encode().into()
    }
}

#[async_trait]
impl BoxContract for UpgradeableBox {
    fn version(&self) -> ContractVersion {
        ContractVersion::Upgradeable
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn total_supply(&self) -> Result<u64, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let contract = IXenBoxUpgradeable::new(self.address, &provider);
        let total = contract
            .totalToken()
            .call()
            .await
            .map_err(|e| ChainError::rpc("totalToken", e))?
            ._0;
        to_u64(total, "totalToken")
    }

    async fn owned_token_ids(&self, owner: Address, total: u64) -> Result<Vec<TokenId>, ChainError> {
        helper_owned_ids(&self.rpc_url, self.helper, self.address, owner, total).await
    }

    async fn token_snapshot(&self, token_id: TokenId) -> Result<TokenSnapshot, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let contract = IXenBoxUpgradeable::new(self.address, &provider);

        let range_call = contract.tokenMap(U256::from(token_id));
        let mint_call = contract.userMints(U256::from(token_id));
        let (range, mint) = tokio::try_join!(range_call.call(), mint_call.call())
            .map_err(|e| ChainError::rpc("tokenMap", e))?;

        let range_start = to_u64(U256::from(range.start), "tokenMap")?;
        let range_end = to_u64(U256::from(range.end), "tokenMap")?;

        let proxy = contract
            .proxyAddress(U256::from(range_start))
            .call()
            .await
            .map_err(|e| ChainError::rpc("proxyAddress", e))?
            ._0;
        let reward = helper_mint_reward(&self.rpc_url, self.helper, proxy).await?;

        let snapshot = TokenSnapshot {
            range_start,
            range_end,
            maturity_ts: to_u64(mint.maturityTs, "userMints")?,
            term_days: to_u64(mint.term, "userMints")?,
            reward_per_account: reward,
        };

        debug!(
            token_id,
            proxy = %proxy,
            units = snapshot.unit_count(),
            maturity_ts = snapshot.maturity_ts,
            "Upgradeable token snapshot"
        );

        Ok(snapshot)
    }

    async fn fee_schedule(&self) -> Result<FeeSchedule, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let contract = IXenBoxUpgradeable::new(self.address, &provider);

        let fee10_call = contract.fee10();
        let fee20_call = contract.fee20();
        let fee50_call = contract.fee50();
        let fee100_call = contract.fee100();
        let (fee10, fee20, fee50, fee100) = tokio::try_join!(
            fee10_call.call(),
            fee20_call.call(),
            fee50_call.call(),
            fee100_call.call()
        )
        .map_err(|e| ChainError::rpc("feeSchedule", e))?;

        Ok(FeeSchedule::new(
            to_bps(fee10._0, "fee10")?,
            to_bps(fee20._0, "fee20")?,
            to_bps(fee50._0, "fee50")?,
            to_bps(fee100._0, "fee100")?,
        ))
    }

    fn encode_claim(&self, token_id: TokenId, term_days: u64) -> Bytes {
        IXenBoxUpgradeable::claimCall {
            tokenId: U256::from(token_id),
            term: U256::from(term_days),
        }
        .abi_encode()
        .into()
    }
}
