//! Explicit per-account session context.
//!
//! A [`SessionContext`] owns everything one account's session on one chain
//! needs: the gateway, ranking client, price oracle, record cache, and the
//! fee schedules and referral state captured at start. Nothing is global;
//! two sessions never share state.

use alloy::primitives::{Address, B256, U256};
use anyhow::Result;
use boxkeeper_api::RankingClient;
use boxkeeper_chain::{
    ChainError, ChainGateway, ContractVersion, PriceOracle, PriceQuote, ReferralAccount, RetryingCaller, TokenId,
    WriteError, WriteOptions, FEE_TIERS,
};
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::{ChainConfig, EngineConfig};
use crate::position_cache::PositionCache;
use crate::position_index::{PositionIndex, PositionListing, SearchError, Valuation};
use crate::referral_store::ReferralStore;
use crate::reward::{self, penalty_curve_from_config, FeeSchedules, PenaltyCurve};

/// Referral standing of the session account and the boxes it referred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferralState {
    pub account: ReferralAccount,
    /// Upgradeable ids minted with the account as referrer
    pub referred_token_ids: BTreeSet<TokenId>,
}

/// State captured at session start and replaced by [`SessionContext::resync`].
#[derive(Debug, Clone)]
struct SessionState {
    rank: u64,
    schedules: Arc<FeeSchedules>,
    referral: Option<ReferralState>,
}

/// Chain-wide statistics.
#[derive(Debug, Clone)]
pub struct ChainStats {
    pub chain_id: u64,
    /// `None` when the supply could not be read
    pub total_supply: BTreeMap<ContractVersion, Option<u64>>,
    pub box_addresses: BTreeMap<ContractVersion, Address>,
    pub xen: Option<Address>,
    /// Sum of the reference-token balances of the configured pools
    pub total_locked_value: U256,
}

pub struct SessionContext {
    engine: EngineConfig,
    gateway: Arc<dyn ChainGateway>,
    ranking: RankingClient,
    oracle: PriceOracle,
    retry: RetryingCaller,
    index: PositionIndex,
    penalty: Box<dyn PenaltyCurve>,
    account: Option<Address>,
    referral_codes: Option<Arc<ReferralStore>>,
    xen: Option<Address>,
    tvl: Option<(Address, Vec<Address>)>,
    state: RwLock<SessionState>,
}

impl SessionContext {
    pub fn new(engine: EngineConfig, gateway: Arc<dyn ChainGateway>, ranking: RankingClient, oracle: PriceOracle) -> Self {
        let retry = RetryingCaller::new(engine.retry.attempts, engine.retry.interval());
        let cache = PositionCache::new(gateway.clone(), retry, engine.fetch.max_concurrent_fetches);
        let index = PositionIndex::new(gateway.clone(), cache, retry, engine.fetch.page_size);
        let penalty = penalty_curve_from_config(&engine.penalty);
        let state = SessionState {
            rank: engine.mint.default_rank,
            schedules: Arc::new(FeeSchedules::new()),
            referral: None,
        };

        Self {
            engine,
            gateway,
            ranking,
            oracle,
            retry,
            index,
            penalty,
            account: None,
            referral_codes: None,
            xen: None,
            tvl: None,
            state: RwLock::new(state),
        }
    }

    /// Session for `chain` with its configured pricing, XEN address and TVL pools.
    pub fn from_config(engine: EngineConfig, chain: &ChainConfig, gateway: Arc<dyn ChainGateway>) -> Result<Self> {
        let ranking = RankingClient::with_base_url(engine.ranking.url.clone());
        let oracle = chain.price_oracle()?;
        let deployment = chain.deployment()?;
        let tvl = chain.tvl_pools()?;

        let mut session = Self::new(engine, gateway, ranking, oracle).with_xen(deployment.xen);
        if let Some((reference, pools)) = tvl {
            session = session.with_tvl(reference, pools);
        }
        Ok(session)
    }

    /// Connected account; its referral state is loaded at start.
    pub fn with_account(mut self, account: Address) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_referral_store(mut self, store: Arc<ReferralStore>) -> Self {
        self.referral_codes = Some(store);
        self
    }

    pub fn with_xen(mut self, xen: Address) -> Self {
        self.xen = Some(xen);
        self
    }

    pub fn with_tvl(mut self, reference_token: Address, pools: Vec<Address>) -> Self {
        self.tvl = Some((reference_token, pools));
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.gateway.chain_id()
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn cache(&self) -> &PositionCache {
        self.index.cache()
    }

    /// Rank for the default term, as fetched at start.
    pub fn rank(&self) -> u64 {
        self.state.read().rank
    }

    pub fn fee_schedules(&self) -> Arc<FeeSchedules> {
        self.state.read().schedules.clone()
    }

    /// Referral state as of the last start or re-sync.
    pub fn referral_state(&self) -> Option<ReferralState> {
        self.state.read().referral.clone()
    }

    /// Fetch the rank, fee schedules and referral state.
    ///
    /// Never fails: an unreachable ranking service falls back to the
    /// default rank, and missing schedules or referral state only leave
    /// the affected values blank.
    #[instrument(skip(self), fields(chain_id = self.chain_id()))]
    pub async fn start(&self) {
        let rank = self.fetch_rank().await;
        self.state.write().rank = rank;
        self.resync().await;

        let state = self.state.read();
        info!(
            rank = state.rank,
            schedules = state.schedules.len(),
            referral = state.referral.is_some(),
            "Session started"
        );
    }

    async fn fetch_rank(&self) -> u64 {
        let chain_id = self.chain_id();
        let term = self.engine.mint.default_term_days;
        let default_rank = self.engine.mint.default_rank;

        let result = self
            .retry
            .call("fetch_rank", || async move {
                self.ranking
                    .fetch_rank(chain_id, term)
                    .await
                    .map_err(|e| ChainError::rpc("fetch_rank", e))
            })
            .await;

        match result {
            Ok(rank) => rank,
            Err(e) => {
                warn!(chain_id, default_rank, error = %e, "Ranking unavailable, using default rank");
                default_rank
            }
        }
    }

    /// Re-fetch fee schedules and referral state. Cached records are kept.
    #[instrument(skip(self), fields(chain_id = self.chain_id()))]
    pub async fn resync(&self) {
        let versions = self.gateway.versions();
        let fetches = versions.iter().map(|&version| async move {
            let result = self
                .retry
                .call("fetch_fee_schedule", || self.gateway.fetch_fee_schedule(version))
                .await;
            (version, result)
        });

        let mut schedules = FeeSchedules::new();
        for (version, result) in join_all(fetches).await {
            match result {
                Ok(schedule) => {
                    debug!(version = %version, tiers = ?schedule.tiers(), "Fee schedule");
                    schedules.insert(version, schedule);
                }
                Err(e) => warn!(version = %version, error = %e, "Fee schedule unavailable"),
            }
        }

        let referral = match self.account {
            Some(account) if versions.contains(&ContractVersion::Upgradeable) => {
                match self.fetch_referral(account).await {
                    Ok(referral) => Some(referral),
                    Err(e) => {
                        warn!(account = %account, error = %e, "Referral state unavailable");
                        None
                    }
                }
            }
            _ => None,
        };

        let mut state = self.state.write();
        state.schedules = Arc::new(schedules);
        state.referral = referral;
    }

    async fn fetch_referral(&self, account: Address) -> Result<ReferralState, ChainError> {
        let fetch_standing = self
            .retry
            .call("fetch_referral_account", || self.gateway.fetch_referral_account(account));
        let (standing, referred_token_ids) = futures::try_join!(fetch_standing, self.index.referred_ids(account))?;
        debug!(account = %account, referred = referred_token_ids.len(), "Referral state");
        Ok(ReferralState {
            account: standing,
            referred_token_ids,
        })
    }

    /// Reference units per reward unit; recomputed on every call.
    pub async fn price_quote(&self) -> PriceQuote {
        self.oracle.quote(self.gateway.as_ref()).await
    }

    /// Expected gross reward of minting `unit_count` accounts for `term_days`.
    ///
    /// The rank is scaled from the default term to `term_days`. Returns zero
    /// when the reward curve cannot be evaluated.
    pub async fn estimate_mint_reward(&self, unit_count: u64, term_days: u64) -> U256 {
        let rank = reward::scaled_rank(self.rank(), term_days, self.engine.mint.default_term_days);
        let result = self
            .retry
            .call("evaluate_reward_curve", || self.gateway.evaluate_reward_curve(rank, term_days))
            .await;

        let estimate = result
            .map_err(|e| e.to_string())
            .and_then(|per_account| reward::gross_reward(per_account, unit_count).map_err(|e| e.to_string()));

        match estimate {
            Ok(estimate) => {
                debug!(unit_count, term_days, rank, estimate = %estimate, "Mint estimate");
                estimate
            }
            Err(e) => {
                warn!(term_days, rank, error = %e, "Mint estimate unavailable");
                U256::ZERO
            }
        }
    }

    async fn valuation_inputs(&self) -> (Arc<FeeSchedules>, PriceQuote, u64) {
        let schedules = self.fee_schedules();
        let quote = self.price_quote().await;
        (schedules, quote, unix_now())
    }

    /// Boxes held by `owner` on every deployed generation.
    pub async fn owned(&self, owner: Address) -> PositionListing {
        let (schedules, quote, now) = self.valuation_inputs().await;
        let valuation = self.valuation(&schedules, quote, now);
        self.index.owned(owner, valuation).await
    }

    pub async fn claimable(&self, owner: Address) -> PositionListing {
        let (schedules, quote, now) = self.valuation_inputs().await;
        let valuation = self.valuation(&schedules, quote, now);
        self.index.claimable(owner, valuation).await
    }

    /// Matured upgradeable boxes `owner` may force-renew.
    pub async fn force_eligible(&self, owner: Address) -> PositionListing {
        let (schedules, quote, now) = self.valuation_inputs().await;
        let valuation = self.valuation(&schedules, quote, now);
        self.index.force_eligible(owner, valuation).await
    }

    /// Matured upgradeable boxes of every owner.
    pub async fn force_candidates(&self) -> Result<PositionListing, ChainError> {
        let (schedules, quote, now) = self.valuation_inputs().await;
        let valuation = self.valuation(&schedules, quote, now);
        self.index.force_candidates(valuation).await
    }

    /// Boxes referred by `referrer`, priced with the contract's referrer share.
    ///
    /// The session account's referred ids come from the state loaded at
    /// start or re-sync; any other referrer is read on the spot.
    pub async fn referral(&self, referrer: Address) -> Result<PositionListing, ChainError> {
        let loaded = self
            .referral_state()
            .filter(|_| self.account == Some(referrer));
        let state = match loaded {
            Some(state) => state,
            None => self.fetch_referral(referrer).await?,
        };

        let (schedules, quote, now) = self.valuation_inputs().await;
        let valuation = self.valuation(&schedules, quote, now);
        self.index
            .referral(
                referrer,
                &state.referred_token_ids,
                state.account.refer_fee_percent,
                valuation,
            )
            .await
    }

    pub async fn search(&self, input: &str) -> Result<PositionListing, SearchError> {
        let (schedules, quote, now) = self.valuation_inputs().await;
        let valuation = self.valuation(&schedules, quote, now);
        self.index.search(input, valuation).await
    }

    fn valuation<'a>(&'a self, schedules: &'a FeeSchedules, quote: PriceQuote, now: u64) -> Valuation<'a> {
        Valuation {
            schedules,
            penalty: self.penalty.as_ref(),
            quote,
            now,
        }
    }

    /// Supply, deployment addresses and total locked value.
    #[instrument(skip(self), fields(chain_id = self.chain_id()))]
    pub async fn stats(&self) -> ChainStats {
        let mut total_supply = BTreeMap::new();
        let mut box_addresses = BTreeMap::new();
        for version in self.gateway.versions() {
            let supply = self
                .retry
                .call("total_supply", || self.gateway.total_supply(version))
                .await
                .map_err(|e| warn!(version = %version, error = %e, "Total supply unavailable"))
                .ok();
            total_supply.insert(version, supply);
            if let Some(address) = self.gateway.box_address(version) {
                box_addresses.insert(version, address);
            }
        }

        ChainStats {
            chain_id: self.chain_id(),
            total_supply,
            box_addresses,
            xen: self.xen,
            total_locked_value: self.total_locked_value().await,
        }
    }

    async fn total_locked_value(&self) -> U256 {
        let Some((reference, pools)) = &self.tvl else {
            return U256::ZERO;
        };

        let balances = pools.iter().map(|&pool| async move {
            self.retry
                .call("token_balance", || self.gateway.token_balance(*reference, pool))
                .await
                .unwrap_or_else(|e| {
                    warn!(pool = %pool, error = %e, "Pool balance unavailable");
                    U256::ZERO
                })
        });

        join_all(balances)
            .await
            .into_iter()
            .fold(U256::ZERO, |sum, balance| sum.saturating_add(balance))
    }

    /// Referrer used for a mint: explicit, else the captured code, else none.
    pub fn mint_referrer(&self, explicit: Option<Address>) -> Address {
        explicit
            .or_else(|| {
                self.referral_codes
                    .as_ref()
                    .and_then(|store| store.get(self.chain_id()))
            })
            .unwrap_or(Address::ZERO)
    }

    pub async fn mint(
        &self,
        unit_count: u64,
        term_days: u64,
        referrer: Option<Address>,
        options: WriteOptions,
    ) -> Result<B256, WriteError> {
        if !FEE_TIERS.contains(&unit_count) {
            return Err(WriteError::UnsupportedBatch(unit_count));
        }
        let referrer = self.mint_referrer(referrer);
        let tx_hash = self.gateway.mint(unit_count, term_days, referrer, options).await?;
        info!(unit_count, term_days, referrer = %referrer, tx_hash = %tx_hash, "Mint submitted");
        Ok(tx_hash)
    }

    pub async fn claim(
        &self,
        version: ContractVersion,
        token_id: TokenId,
        term_days: u64,
        options: WriteOptions,
    ) -> Result<B256, WriteError> {
        let tx_hash = self.gateway.claim(version, token_id, term_days, options).await?;
        info!(version = %version, token_id, term_days, tx_hash = %tx_hash, "Claim submitted");
        Ok(tx_hash)
    }

    pub async fn force_renew(&self, token_id: TokenId, term_days: u64, options: WriteOptions) -> Result<B256, WriteError> {
        let tx_hash = self.gateway.force_renew(token_id, term_days, options).await?;
        info!(token_id, term_days, tx_hash = %tx_hash, "Force renewal submitted");
        Ok(tx_hash)
    }

    pub async fn claim_referral_reward(&self, options: WriteOptions) -> Result<B256, WriteError> {
        let tx_hash = self.gateway.claim_referral_reward(options).await?;
        info!(tx_hash = %tx_hash, "Referral reward claim submitted");
        Ok(tx_hash)
    }
}

fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{snapshot, MockGateway};
    use boxkeeper_api::testing::serve_once;
    use boxkeeper_chain::{FeeSchedule, PoolReserves, PositionKey, ReserveRatio};
    use std::sync::atomic::Ordering;

    const V0: ContractVersion = ContractVersion::Legacy;
    const V1: ContractVersion = ContractVersion::Upgradeable;

    fn fast_engine() -> EngineConfig {
        let mut engine = EngineConfig::default();
        engine.retry.interval_ms = 1;
        engine
    }

    fn offline_ranking() -> RankingClient {
        RankingClient::with_base_url("http://127.0.0.1:1")
    }

    fn oracle() -> PriceOracle {
        PriceOracle::new(Box::new(ReserveRatio::new(
            Address::repeat_byte(0x50),
            Address::repeat_byte(0xee),
        )))
    }

    fn session(gateway: Arc<MockGateway>) -> SessionContext {
        SessionContext::new(fast_engine(), gateway, offline_ranking(), oracle())
    }

    fn mock_with_fees() -> MockGateway {
        let mut mock = MockGateway::mainnet();
        mock.fee_schedules.insert(V0, FeeSchedule::uniform(100));
        mock.fee_schedules.insert(V1, FeeSchedule::new(100, 150, 200, 250));
        mock
    }

    #[tokio::test]
    async fn test_ranking_failure_uses_default_rank() {
        let base = serve_once("500 Internal Server Error", "{}").await.unwrap();
        let gateway = Arc::new(mock_with_fees());
        let session = SessionContext::new(fast_engine(), gateway, RankingClient::with_base_url(base), oracle());

        session.start().await;
        assert_eq!(session.rank(), 1_000_000);
        assert_eq!(session.fee_schedules().len(), 2);
    }

    #[tokio::test]
    async fn test_start_uses_fetched_rank() {
        let base = serve_once("200 OK", r#"{"rank": 4200}"#).await.unwrap();
        let gateway = Arc::new(mock_with_fees());
        let session = SessionContext::new(fast_engine(), gateway, RankingClient::with_base_url(base), oracle());

        session.start().await;
        assert_eq!(session.rank(), 4200);
    }

    #[tokio::test]
    async fn test_empty_reward_reserve_is_unavailable() {
        let mut mock = MockGateway::mainnet();
        mock.reserves = Some(PoolReserves {
            reserve0: U256::from(200u64),
            reserve1: U256::ZERO,
            token0: Address::repeat_byte(0xee),
        });
        let session = session(Arc::new(mock));

        let quote = session.price_quote().await;
        assert!(!quote.is_available());
        assert_eq!(quote, PriceQuote::UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_mint_estimate_scales_rank_with_term() {
        let mut mock = MockGateway::mainnet();
        mock.curve_reward = U256::from(3_000u64);
        let gateway = Arc::new(mock);
        let session = session(gateway.clone());

        // default rank 1_000_000 over the 365-day default term
        let estimate = session.estimate_mint_reward(20, 730).await;
        assert_eq!(estimate, U256::from(60_000u64));
        assert_eq!(*gateway.curve_calls.lock(), vec![(2_000_000, 730)]);
    }

    #[tokio::test]
    async fn test_mint_estimate_failure_is_zero() {
        let mock = MockGateway {
            curve_fails: true,
            ..MockGateway::mainnet()
        };
        let gateway = Arc::new(mock);
        let session = session(gateway.clone());

        assert_eq!(session.estimate_mint_reward(10, 100).await, U256::ZERO);
        assert_eq!(gateway.curve_calls.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_mint_estimate_overflow_is_zero() {
        let mut mock = MockGateway::mainnet();
        mock.curve_reward = U256::MAX;
        let session = session(Arc::new(mock));

        assert_eq!(session.estimate_mint_reward(20, 365).await, U256::ZERO);
    }

    #[tokio::test]
    async fn test_resync_refreshes_schedules_not_records() {
        let now = unix_now();
        let owner = Address::repeat_byte(0x11);
        let gateway = Arc::new(
            mock_with_fees()
                .with_token(V1, 0, snapshot(0, 10, now - 10))
                .with_owned(V1, owner, vec![0]),
        );
        let session = session(gateway.clone()).with_account(owner);

        session.start().await;
        assert_eq!(gateway.fee_calls.load(Ordering::SeqCst), 2);
        assert_eq!(gateway.referral_calls.load(Ordering::SeqCst), 1);

        session.owned(owner).await;
        session.resync().await;
        session.owned(owner).await;

        assert_eq!(gateway.fee_calls.load(Ordering::SeqCst), 4);
        assert_eq!(gateway.referral_calls.load(Ordering::SeqCst), 2);
        assert_eq!(gateway.fetches(), 1);
    }

    #[tokio::test]
    async fn test_claimable_through_session() {
        let now = unix_now();
        let owner = Address::repeat_byte(0x11);
        let gateway = Arc::new(
            mock_with_fees()
                .with_token(V0, 1, snapshot(0, 10, now - 100))
                .with_token(V1, 2, snapshot(0, 10, now + 86_400))
                .with_owned(V0, owner, vec![1])
                .with_owned(V1, owner, vec![2]),
        );
        let session = session(gateway);
        session.start().await;

        let listing = session.claimable(owner).await;
        assert_eq!(listing.entries.len(), 1);
        let view = &listing.entries[0];
        assert_eq!(view.key.version, V0);
        assert_eq!(view.penalty_percent, 0);
        assert_eq!(
            view.net_claimable,
            Some(U256::from(9_900_000_000_000_000_000u128))
        );
    }

    #[tokio::test]
    async fn test_referral_uses_contract_share() {
        let now = unix_now();
        let referrer = Address::repeat_byte(0x22);
        let mut mock = mock_with_fees().with_token(V1, 0, snapshot(0, 10, now - 100));
        mock.referred.get_mut().insert(referrer, vec![0]);
        mock.referral = ReferralAccount {
            is_eligible: true,
            refer_fee_percent: 50,
            unclaimed_reward: U256::ZERO,
        };
        let session = session(Arc::new(mock)).with_account(referrer);
        session.start().await;

        let listing = session.referral(referrer).await.unwrap();
        // 10e18 * 100 / 10000 * 50 / 100
        assert_eq!(
            listing.entries[0].referral_share,
            Some(U256::from(50_000_000_000_000_000u64))
        );
    }

    #[tokio::test]
    async fn test_referred_ids_load_only_on_resync() {
        let now = unix_now();
        let referrer = Address::repeat_byte(0x22);
        let mut mock = mock_with_fees()
            .with_token(V1, 0, snapshot(0, 10, now - 100))
            .with_token(V1, 1, snapshot(10, 20, now - 100));
        mock.referred.get_mut().insert(referrer, vec![0]);
        let gateway = Arc::new(mock);
        let session = session(gateway.clone()).with_account(referrer);
        session.start().await;

        let state = session.referral_state().unwrap();
        assert_eq!(state.referred_token_ids, BTreeSet::from([0]));
        assert_eq!(gateway.referred_calls.load(Ordering::SeqCst), 1);

        gateway.referred.lock().insert(referrer, vec![0, 1]);
        session.referral(referrer).await.unwrap();
        let listing = session.referral(referrer).await.unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(gateway.referred_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.referral_calls.load(Ordering::SeqCst), 1);

        session.resync().await;
        assert_eq!(gateway.referred_calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.referral(referrer).await.unwrap().entries.len(), 2);
    }

    #[tokio::test]
    async fn test_force_eligible_through_session() {
        let now = unix_now();
        let owner = Address::repeat_byte(0x11);
        let stranger = Address::repeat_byte(0x99);
        let mut mock = mock_with_fees()
            .with_token(V1, 1, snapshot(0, 10, now - 100))
            .with_token(V1, 2, snapshot(10, 20, now - 100))
            .with_owned(V1, owner, vec![1])
            .with_owned(V1, stranger, vec![2]);
        mock.force_candidates = vec![2];
        let session = session(Arc::new(mock));
        session.start().await;

        let listing = session.force_eligible(owner).await;
        assert_eq!(listing.keys(), vec![PositionKey::new(V1, 1)]);

        let candidates = session.force_candidates().await.unwrap();
        assert_eq!(candidates.keys(), vec![PositionKey::new(V1, 2)]);
    }

    #[tokio::test]
    async fn test_stats_sum_pool_balances() {
        let mut mock = MockGateway::mainnet();
        mock.totals.insert(V0, 12);
        mock.totals.insert(V1, 34);
        mock.balances.insert(Address::repeat_byte(0x01), U256::from(5u64));
        mock.balances.insert(Address::repeat_byte(0x02), U256::from(7u64));
        let session = session(Arc::new(mock))
            .with_xen(Address::repeat_byte(0x0e))
            .with_tvl(
                Address::repeat_byte(0xee),
                vec![
                    Address::repeat_byte(0x01),
                    Address::repeat_byte(0x02),
                    Address::repeat_byte(0x03),
                ],
            );

        let stats = session.stats().await;
        assert_eq!(stats.total_supply[&V0], Some(12));
        assert_eq!(stats.total_supply[&V1], Some(34));
        assert_eq!(stats.box_addresses.len(), 2);
        assert_eq!(stats.xen, Some(Address::repeat_byte(0x0e)));
        assert_eq!(stats.total_locked_value, U256::from(12u64));
    }

    #[tokio::test]
    async fn test_mint_referrer_resolution() {
        let path = std::env::temp_dir().join(format!("boxkeeper-session-referral-{}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let store = Arc::new(ReferralStore::open(&path).unwrap());
        let code = Address::repeat_byte(0x33);
        let explicit = Address::repeat_byte(0x44);

        let gateway = Arc::new(MockGateway::mainnet());
        let bare = session(gateway.clone());
        assert_eq!(bare.mint_referrer(None), Address::ZERO);

        store.capture(1, code).unwrap();
        let session = session(gateway.clone()).with_referral_store(store);
        assert_eq!(session.mint_referrer(None), code);
        assert_eq!(session.mint_referrer(Some(explicit)), explicit);

        session.mint(10, 100, None, WriteOptions::default()).await.unwrap();
        assert_eq!(gateway.writes.lock()[0], format!("mint 10 100 {}", code));

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_mint_rejects_unsupported_batch() {
        let gateway = Arc::new(MockGateway::mainnet());
        let session = session(gateway.clone());

        assert_eq!(
            session.mint(30, 100, None, WriteOptions::default()).await,
            Err(WriteError::UnsupportedBatch(30))
        );
        assert!(gateway.writes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_write_errors_surface_unchanged() {
        let mock = MockGateway {
            write_error: Some(WriteError::ContractReverted("not mature".to_string())),
            ..MockGateway::mainnet()
        };
        let session = session(Arc::new(mock));

        assert_eq!(
            session.claim(V1, 3, 100, WriteOptions::default()).await,
            Err(WriteError::ContractReverted("not mature".to_string()))
        );
        assert_eq!(
            session.force_renew(3, 100, WriteOptions::default()).await,
            Err(WriteError::ContractReverted("not mature".to_string()))
        );
    }
}
