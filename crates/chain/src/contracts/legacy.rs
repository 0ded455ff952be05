//! V0 XenBox (Ethereum mainnet only).

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::ProviderBuilder;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use super::bindings::{IXen, IXenBox};
use super::{helper_mint_reward, helper_owned_ids, to_bps, to_u64, BoxContract};
use crate::error::ChainError;
use crate::types::{ContractVersion, FeeSchedule, TokenId, TokenSnapshot};

/// Legacy box contract. Mint data is read from the XEN token itself,
/// keyed by the proxy that owns the first sub-account of the batch.
#[derive(Debug, Clone)]
pub struct LegacyBox {
    rpc_url: Url,
    address: Address,
    helper: Address,
    xen: Address,
}

impl LegacyBox {
    pub fn new(rpc_url: Url, address: Address, helper: Address, xen: Address) -> Self {
        Self {
            rpc_url,
            address,
            helper,
            xen,
        }
    }
}

#[async_trait]
impl BoxContract for LegacyBox {
    fn version(&self) -> ContractVersion {
        ContractVersion::Legacy
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn total_supply(&self) -> Result<u64, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let contract = IXenBox::new(self.address, &provider);
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
        let contract = IXenBox::new(self.address, &provider);

        let range = contract
            .tokenMap(U256::from(token_id))
            .call()
            .await
            .map_err(|e| ChainError::rpc("tokenMap", e))?;
        let range_start = to_u64(range.start, "tokenMap")?;
        let range_end = to_u64(range.end, "tokenMap")?;

        let proxy = contract
            .getProxyAddress(range.start)
            .call()
            .await
            .map_err(|e| ChainError::rpc("getProxyAddress", e))?
            ._0;

        let xen = IXen::new(self.xen, &provider);
        let mint_call = xen.userMints(proxy);
        let (mint, reward) = tokio::join!(
            mint_call.call(),
            helper_mint_reward(&self.rpc_url, self.helper, proxy)
        );
        let mint = mint.map_err(|e| ChainError::rpc("userMints", e))?;

        let snapshot = TokenSnapshot {
            range_start,
            range_end,
            maturity_ts: to_u64(mint.maturityTs, "userMints")?,
            term_days: to_u64(mint.term, "userMints")?,
            reward_per_account: reward?,
        };

        debug!(
            token_id,
            proxy = %proxy,
            units = snapshot.unit_count(),
            maturity_ts = snapshot.maturity_ts,
            "Legacy token snapshot"
        );

        Ok(snapshot)
    }

    async fn fee_schedule(&self) -> Result<FeeSchedule, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let contract = IXenBox::new(self.address, &provider);
        let fee = contract
            .fee()
            .call()
            .await
            .map_err(|e| ChainError::rpc("fee", e))?
            ._0;
        Ok(FeeSchedule::uniform(to_bps(fee, "fee")?))
    }

    fn encode_claim(&self, token_id: TokenId, term_days: u64) -> Bytes {
        IXenBox::claimCall {
            tokenId: U256::from(token_id),
            term: U256::from(term_days),
        }
        .abi_encode()
        .into()
    }
}
