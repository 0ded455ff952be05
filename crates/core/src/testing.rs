//! In-memory gateway for engine tests.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use boxkeeper_chain::{
    ChainError, ChainGateway, ContractVersion, FeeSchedule, PoolReserves, PositionKey, ReferralAccount, TokenId,
    TokenSnapshot, WriteError, WriteOptions,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted [`ChainGateway`] with call counters.
#[derive(Default)]
pub struct MockGateway {
    pub chain_id: u64,
    pub versions: Vec<ContractVersion>,
    pub totals: HashMap<ContractVersion, u64>,
    /// Owned ids per (version, owner)
    pub owned: HashMap<(ContractVersion, Address), Vec<TokenId>>,
    /// Referred ids per referrer
    pub referred: Mutex<HashMap<Address, Vec<TokenId>>>,
    pub force_candidates: Vec<TokenId>,
    pub snapshots: HashMap<PositionKey, TokenSnapshot>,
    pub fee_schedules: HashMap<ContractVersion, FeeSchedule>,
    pub referral: ReferralAccount,
    pub reserves: Option<PoolReserves>,
    pub balances: HashMap<Address, U256>,
    pub swap_quote: Option<U256>,
    /// Per-account reward returned by the reward curve
    pub curve_reward: U256,
    pub curve_fails: bool,
    /// Versions whose enumeration always fails
    pub broken_versions: HashSet<ContractVersion>,
    pub write_error: Option<WriteError>,
    pub fetch_delay: Duration,

    /// Next N record fetches fail transiently
    pub fail_next_fetches: AtomicU32,

    pub fetch_calls: AtomicUsize,
    pub fee_calls: AtomicUsize,
    pub referral_calls: AtomicUsize,
    pub referred_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub pages: Mutex<Vec<(ContractVersion, usize, usize)>>,
    pub curve_calls: Mutex<Vec<(u64, u64)>>,
    pub writes: Mutex<Vec<String>>,
}

impl MockGateway {
    /// Mainnet-like gateway with both generations deployed.
    pub fn mainnet() -> Self {
        Self {
            chain_id: 1,
            versions: vec![ContractVersion::Legacy, ContractVersion::Upgradeable],
            ..Default::default()
        }
    }

    pub fn with_token(mut self, version: ContractVersion, token_id: TokenId, snapshot: TokenSnapshot) -> Self {
        self.snapshots.insert(PositionKey::new(version, token_id), snapshot);
        let total = self.totals.entry(version).or_default();
        *total = (*total).max(token_id + 1);
        self
    }

    pub fn with_owned(mut self, version: ContractVersion, owner: Address, ids: Vec<TokenId>) -> Self {
        self.owned.insert((version, owner), ids);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn page(ids: &[TokenId], offset: usize, limit: usize) -> Vec<TokenId> {
        ids.iter().skip(offset).take(limit).copied().collect()
    }

    fn write(&self, label: String) -> Result<B256, WriteError> {
        if let Some(error) = &self.write_error {
            return Err(error.clone());
        }
        self.writes.lock().push(label);
        Ok(B256::repeat_byte(0xab))
    }
}

/// Snapshot with the given range and maturity, 1e18 per account.
pub fn snapshot(range_start: u64, range_end: u64, maturity_ts: u64) -> TokenSnapshot {
    TokenSnapshot {
        range_start,
        range_end,
        maturity_ts,
        term_days: 100,
        reward_per_account: U256::from(1_000_000_000_000_000_000u64),
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn versions(&self) -> Vec<ContractVersion> {
        self.versions.clone()
    }

    fn box_address(&self, version: ContractVersion) -> Option<Address> {
        self.versions
            .contains(&version)
            .then(|| Address::repeat_byte(0xb0 + version.tag()))
    }

    async fn total_supply(&self, version: ContractVersion) -> Result<u64, ChainError> {
        if !self.versions.contains(&version) {
            return Err(ChainError::VersionUnavailable(version));
        }
        Ok(self.totals.get(&version).copied().unwrap_or_default())
    }

    async fn enumerate_owned(
        &self,
        version: ContractVersion,
        owner: Address,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TokenId>, ChainError> {
        self.pages.lock().push((version, offset, limit));
        if self.broken_versions.contains(&version) {
            return Err(ChainError::rpc("getOwnedTokenIdList", "node unavailable"));
        }
        let ids = self.owned.get(&(version, owner)).cloned().unwrap_or_default();
        Ok(Self::page(&ids, offset, limit))
    }

    async fn enumerate_referred(
        &self,
        referrer: Address,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TokenId>, ChainError> {
        self.referred_calls.fetch_add(1, Ordering::SeqCst);
        let ids = self.referred.lock().get(&referrer).cloned().unwrap_or_default();
        Ok(Self::page(&ids, offset, limit))
    }

    async fn enumerate_force_candidates(&self, offset: usize, limit: usize) -> Result<Vec<TokenId>, ChainError> {
        Ok(Self::page(&self.force_candidates, offset, limit))
    }

    async fn fetch_record(&self, version: ContractVersion, token_id: TokenId) -> Result<TokenSnapshot, ChainError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let should_fail = self
            .fail_next_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ChainError::rpc("tokenMap", "timeout"));
        }

        self.snapshots
            .get(&PositionKey::new(version, token_id))
            .cloned()
            .ok_or_else(|| ChainError::rpc("tokenMap", "execution reverted"))
    }

    async fn evaluate_reward_curve(&self, rank: u64, term_days: u64) -> Result<U256, ChainError> {
        self.curve_calls.lock().push((rank, term_days));
        if self.curve_fails {
            return Err(ChainError::rpc("calculateMintRewardNew", "execution reverted"));
        }
        Ok(self.curve_reward)
    }

    async fn fetch_fee_schedule(&self, version: ContractVersion) -> Result<FeeSchedule, ChainError> {
        self.fee_calls.fetch_add(1, Ordering::SeqCst);
        self.fee_schedules
            .get(&version)
            .copied()
            .ok_or(ChainError::VersionUnavailable(version))
    }

    async fn fetch_referral_account(&self, _account: Address) -> Result<ReferralAccount, ChainError> {
        self.referral_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.referral.clone())
    }

    async fn fetch_pool_reserves(&self, _pool: Address) -> Result<PoolReserves, ChainError> {
        self.reserves
            .clone()
            .ok_or_else(|| ChainError::rpc("getReserves", "no pair"))
    }

    async fn token_balance(&self, _token: Address, holder: Address) -> Result<U256, ChainError> {
        self.balances
            .get(&holder)
            .copied()
            .ok_or_else(|| ChainError::rpc("balanceOf", "execution reverted"))
    }

    async fn quote_exact_output(
        &self,
        _quoter: Address,
        _token_in: Address,
        _token_out: Address,
        _amount_out: U256,
        _fee: u32,
    ) -> Result<U256, ChainError> {
        self.swap_quote
            .ok_or_else(|| ChainError::rpc("quoteExactOutputSingle", "SPL"))
    }

    async fn mint(
        &self,
        unit_count: u64,
        term_days: u64,
        referrer: Address,
        _options: WriteOptions,
    ) -> Result<B256, WriteError> {
        self.write(format!("mint {} {} {}", unit_count, term_days, referrer))
    }

    async fn claim(
        &self,
        version: ContractVersion,
        token_id: TokenId,
        term_days: u64,
        _options: WriteOptions,
    ) -> Result<B256, WriteError> {
        self.write(format!("claim {} {} {}", version, token_id, term_days))
    }

    async fn force_renew(&self, token_id: TokenId, term_days: u64, _options: WriteOptions) -> Result<B256, WriteError> {
        self.write(format!("force {} {}", token_id, term_days))
    }

    async fn claim_referral_reward(&self, _options: WriteOptions) -> Result<B256, WriteError> {
        self.write("getReward".to_string())
    }
}
