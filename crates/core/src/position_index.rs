//! Position views: owned, claimable, force-eligible, referral and search.
//!
//! Every view enumerates token ids through the gateway (paginated, retried),
//! resolves records through the [`PositionCache`] and prices them with the
//! reward calculator. A failing item or version never fails the whole view.

use alloy::primitives::Address;
use boxkeeper_chain::{
    ChainError, ChainGateway, ContractVersion, PositionKey, PriceQuote, RetryingCaller, TokenId,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::position::{PositionStatus, PositionView, TokenRecord};
use crate::position_cache::PositionCache;
use crate::reward::{self, FeeSchedules, PenaltyCurve, RewardError};

/// Default enumeration page size.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Search input that is neither an address nor a token id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("not an address or token id: {0:?}")]
    InvalidQuery(String),
}

/// Parsed search input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchQuery {
    Owner(Address),
    Token(TokenId),
}

impl SearchQuery {
    /// `0x` + 40 hex digits is an owner; a decimal integer is a token id.
    pub fn parse(input: &str) -> Result<Self, SearchError> {
        let input = input.trim();
        if input.len() == 42 && input.starts_with("0x") {
            return input
                .parse::<Address>()
                .map(Self::Owner)
                .map_err(|_| SearchError::InvalidQuery(input.to_string()));
        }
        input
            .parse::<TokenId>()
            .map(Self::Token)
            .map_err(|_| SearchError::InvalidQuery(input.to_string()))
    }
}

/// Inputs that price a view at one instant.
#[derive(Clone, Copy)]
pub struct Valuation<'a> {
    pub schedules: &'a FeeSchedules,
    pub penalty: &'a dyn PenaltyCurve,
    pub quote: PriceQuote,
    /// Unix seconds
    pub now: u64,
}

/// Rows of a view plus the versions whose enumeration failed.
#[derive(Debug, Clone, Default)]
pub struct PositionListing {
    pub entries: Vec<PositionView>,
    pub unavailable: Vec<ContractVersion>,
}

impl PositionListing {
    pub fn keys(&self) -> Vec<PositionKey> {
        self.entries.iter().map(|e| e.key).collect()
    }

    fn filter(mut self, keep: impl Fn(&PositionView) -> bool) -> Self {
        self.entries.retain(|e| keep(e));
        self
    }
}

/// Builds position views for one chain session.
pub struct PositionIndex {
    gateway: Arc<dyn ChainGateway>,
    cache: PositionCache,
    retry: RetryingCaller,
    page_size: usize,
}

impl PositionIndex {
    pub fn new(gateway: Arc<dyn ChainGateway>, cache: PositionCache, retry: RetryingCaller, page_size: usize) -> Self {
        Self {
            gateway,
            cache,
            retry,
            page_size: page_size.max(1),
        }
    }

    pub fn cache(&self) -> &PositionCache {
        &self.cache
    }

    /// Total supply, or `None` when it cannot be read.
    async fn known_total(&self, version: ContractVersion) -> Option<u64> {
        match self
            .retry
            .call("total_supply", || self.gateway.total_supply(version))
            .await
        {
            Ok(total) => Some(total),
            Err(e) => {
                debug!(version = %version, error = %e, "Total supply unknown");
                None
            }
        }
    }

    /// Drain a paginated listing until a short page or the known total.
    async fn collect_pages<F, Fut>(&self, operation: &str, total: Option<u64>, mut page: F) -> Result<Vec<TokenId>, ChainError>
    where
        F: FnMut(usize, usize) -> Fut,
        Fut: std::future::Future<Output = Result<Vec<TokenId>, ChainError>>,
    {
        let mut ids = BTreeSet::new();
        let mut offset = 0usize;

        loop {
            let batch = self
                .retry
                .call(operation, || page(offset, self.page_size))
                .await?;
            let fetched = batch.len();
            ids.extend(batch);
            offset += fetched;

            let exhausted = total.is_some_and(|t| offset as u64 >= t);
            if fetched < self.page_size || exhausted {
                break;
            }
        }

        Ok(ids.into_iter().collect())
    }

    /// Token ids `owner` holds on `version`, ascending and deduplicated.
    pub async fn owned_ids(&self, version: ContractVersion, owner: Address) -> Result<Vec<TokenId>, ChainError> {
        let total = self.known_total(version).await;
        if total == Some(0) {
            return Ok(Vec::new());
        }
        let gateway = &self.gateway;
        self.collect_pages("enumerate_owned", total, |offset, limit| {
            gateway.enumerate_owned(version, owner, offset, limit)
        })
        .await
    }

    /// Owned keys across every deployed version.
    async fn owned_keys(&self, owner: Address) -> (Vec<PositionKey>, Vec<ContractVersion>) {
        let mut keys = Vec::new();
        let mut unavailable = Vec::new();

        for version in self.gateway.versions() {
            match self.owned_ids(version, owner).await {
                Ok(ids) => keys.extend(ids.into_iter().map(|id| PositionKey::new(version, id))),
                Err(e) => {
                    warn!(version = %version, owner = %owner, error = %e, "Ownership listing unavailable");
                    unavailable.push(version);
                }
            }
        }

        (keys, unavailable)
    }

    /// Every box `owner` holds, both generations, tagged by version.
    #[instrument(skip(self, valuation))]
    pub async fn owned(&self, owner: Address, valuation: Valuation<'_>) -> PositionListing {
        let (keys, unavailable) = self.owned_keys(owner).await;
        let entries = self.views(&keys, valuation, None).await;
        debug!(owner = %owner, count = entries.len(), "Owned view");
        PositionListing { entries, unavailable }
    }

    /// Owned boxes at or past maturity.
    pub async fn claimable(&self, owner: Address, valuation: Valuation<'_>) -> PositionListing {
        self.owned(owner, valuation)
            .await
            .filter(|e| e.status == PositionStatus::Matured)
    }

    /// Matured upgradeable boxes `owner` holds, offered for renewal
    /// instead of a claim.
    #[instrument(skip(self, valuation))]
    pub async fn force_eligible(&self, owner: Address, valuation: Valuation<'_>) -> PositionListing {
        let version = ContractVersion::Upgradeable;
        let (keys, unavailable) = match self.owned_ids(version, owner).await {
            Ok(ids) => (ids.into_iter().map(|id| PositionKey::new(version, id)).collect(), Vec::new()),
            Err(e) => {
                warn!(owner = %owner, error = %e, "Ownership listing unavailable");
                (Vec::new(), vec![version])
            }
        };

        let entries = self.views(&keys, valuation, None).await;
        PositionListing { entries, unavailable }.filter(|e| e.status == PositionStatus::Matured)
    }

    /// Matured upgradeable boxes of any owner, from the helper's
    /// force-renewal listing.
    #[instrument(skip(self, valuation))]
    pub async fn force_candidates(&self, valuation: Valuation<'_>) -> Result<PositionListing, ChainError> {
        let version = ContractVersion::Upgradeable;
        let total = self.known_total(version).await;
        let gateway = &self.gateway;
        let ids = self
            .collect_pages("enumerate_force_candidates", total, |offset, limit| {
                gateway.enumerate_force_candidates(offset, limit)
            })
            .await?;

        let keys: Vec<_> = ids.into_iter().map(|id| PositionKey::new(version, id)).collect();
        let entries = self.views(&keys, valuation, None).await;
        Ok(PositionListing {
            entries,
            unavailable: Vec::new(),
        }
        .filter(|e| e.status == PositionStatus::Matured))
    }

    /// Upgradeable token ids minted with `referrer` as referrer.
    pub async fn referred_ids(&self, referrer: Address) -> Result<BTreeSet<TokenId>, ChainError> {
        let total = self.known_total(ContractVersion::Upgradeable).await;
        if total == Some(0) {
            return Ok(BTreeSet::new());
        }
        let gateway = &self.gateway;
        let ids = self
            .collect_pages("enumerate_referred", total, |offset, limit| {
                gateway.enumerate_referred(referrer, offset, limit)
            })
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// `referred` minus the referrer's own boxes, with the referrer's share
    /// of each fee.
    #[instrument(skip(self, referred, valuation), fields(referred = referred.len()))]
    pub async fn referral(
        &self,
        referrer: Address,
        referred: &BTreeSet<TokenId>,
        refer_fee_percent: u16,
        valuation: Valuation<'_>,
    ) -> Result<PositionListing, ChainError> {
        let version = ContractVersion::Upgradeable;
        let own: BTreeSet<TokenId> = self.owned_ids(version, referrer).await?.into_iter().collect();
        let keys: Vec<_> = referred
            .difference(&own)
            .map(|&id| PositionKey::new(version, id))
            .collect();

        let entries = self.views(&keys, valuation, Some(refer_fee_percent)).await;
        Ok(PositionListing {
            entries,
            unavailable: Vec::new(),
        })
    }

    /// Owner address: behaves like [`owned`](Self::owned) for that address.
    /// Token id: a single upgradeable box if the id is below total supply.
    #[instrument(skip(self, valuation))]
    pub async fn search(&self, input: &str, valuation: Valuation<'_>) -> Result<PositionListing, SearchError> {
        match SearchQuery::parse(input)? {
            SearchQuery::Owner(owner) => Ok(self.owned(owner, valuation).await),
            SearchQuery::Token(token_id) => {
                let version = ContractVersion::Upgradeable;
                let total = self.known_total(version).await;
                let in_range = total.is_some_and(|t| token_id < t);
                let keys = if in_range {
                    vec![PositionKey::new(version, token_id)]
                } else {
                    Vec::new()
                };
                let entries = self.views(&keys, valuation, None).await;
                Ok(PositionListing {
                    entries,
                    unavailable: if total.is_none() { vec![version] } else { Vec::new() },
                })
            }
        }
    }

    /// Resolve and price `keys`. Records with an empty range (unminted
    /// tokens) are dropped.
    async fn views(
        &self,
        keys: &[PositionKey],
        valuation: Valuation<'_>,
        refer_fee_percent: Option<u16>,
    ) -> Vec<PositionView> {
        self.cache
            .prefetch(keys)
            .await
            .into_iter()
            .filter(|(_, record)| record.as_ref().map_or(true, |r| r.range_end != 0))
            .map(|(key, record)| match record {
                Some(record) => value_record(&record, valuation, refer_fee_percent),
                None => PositionView::unresolved(key),
            })
            .collect()
    }
}

/// Price one record at `valuation.now`.
pub fn value_record(record: &TokenRecord, valuation: Valuation<'_>, refer_fee_percent: Option<u16>) -> PositionView {
    let units = record.unit_count();
    let status = record.status(valuation.now);

    let net = reward::net_claimable(record.gross_reward, units, valuation.schedules, record.version)
        .map_err(|e: RewardError| warn!(key = %record.key(), error = %e, "No net value"))
        .ok();

    let penalty_percent = if record.is_resolved() {
        valuation.penalty.penalty_percent(record.maturity_ts, valuation.now)
    } else {
        0
    };
    let net_after_penalty = net.map(|n| reward::net_after_penalty(n, penalty_percent));
    let reference_value = net_after_penalty.and_then(|n| valuation.quote.convert(n));

    let referral_share = refer_fee_percent.and_then(|percent| {
        reward::referral_share(record.gross_reward, units, valuation.schedules, record.version, percent).ok()
    });

    PositionView {
        key: record.key(),
        status,
        record: Some(record.clone()),
        net_claimable: net,
        net_after_penalty,
        penalty_percent,
        reference_value,
        referral_share,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reward::CappedLinearPenalty;
    use crate::testing::{snapshot, MockGateway};
    use alloy::primitives::U256;
    use boxkeeper_chain::FeeSchedule;
    use std::time::Duration;

    const V0: ContractVersion = ContractVersion::Legacy;
    const V1: ContractVersion = ContractVersion::Upgradeable;
    const NOW: u64 = 1_700_000_000;

    fn owner() -> Address {
        Address::repeat_byte(0x11)
    }

    fn index(gateway: Arc<MockGateway>) -> PositionIndex {
        let retry = RetryingCaller::new(2, Duration::from_millis(1));
        let cache = PositionCache::new(gateway.clone(), retry, 10);
        PositionIndex::new(gateway, cache, retry, DEFAULT_PAGE_SIZE)
    }

    fn schedules() -> FeeSchedules {
        let mut schedules = FeeSchedules::new();
        schedules.insert(V0, FeeSchedule::uniform(100));
        schedules.insert(V1, FeeSchedule::new(100, 150, 200, 250));
        schedules
    }

    fn valuation<'a>(schedules: &'a FeeSchedules, penalty: &'a CappedLinearPenalty) -> Valuation<'a> {
        Valuation {
            schedules,
            penalty,
            quote: PriceQuote::UNAVAILABLE,
            now: NOW,
        }
    }

    #[tokio::test]
    async fn test_empty_first_page_stops() {
        let mut mock = MockGateway::mainnet();
        mock.totals.insert(V1, 500);
        let gateway = Arc::new(mock);
        let index = index(gateway.clone());

        let ids = index.owned_ids(V1, owner()).await.unwrap();
        assert!(ids.is_empty());
        assert_eq!(*gateway.pages.lock(), vec![(V1, 0, 50)]);
    }

    #[tokio::test]
    async fn test_pages_until_short_page() {
        let mut mock = MockGateway::mainnet().with_owned(V1, owner(), (0..120).collect());
        mock.totals.insert(V1, 1_000);
        let gateway = Arc::new(mock);
        let index = index(gateway.clone());

        let ids = index.owned_ids(V1, owner()).await.unwrap();
        assert_eq!(ids.len(), 120);
        let offsets: Vec<_> = gateway.pages.lock().iter().map(|(_, o, _)| *o).collect();
        assert_eq!(offsets, vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn test_pages_stop_at_known_total() {
        let mut mock = MockGateway::mainnet().with_owned(V1, owner(), (0..100).collect());
        mock.totals.insert(V1, 100);
        let gateway = Arc::new(mock);
        let index = index(gateway.clone());

        let ids = index.owned_ids(V1, owner()).await.unwrap();
        assert_eq!(ids.len(), 100);
        assert_eq!(gateway.pages.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_owned_unions_versions_and_dedupes() {
        let gateway = Arc::new(
            MockGateway::mainnet()
                .with_token(V0, 4, snapshot(0, 10, NOW - 10))
                .with_token(V1, 4, snapshot(10, 30, NOW + 10))
                .with_owned(V0, owner(), vec![4, 4])
                .with_owned(V1, owner(), vec![4]),
        );
        let schedules = schedules();
        let penalty = CappedLinearPenalty::default();

        let listing = index(gateway).owned(owner(), valuation(&schedules, &penalty)).await;
        assert_eq!(
            listing.keys(),
            vec![PositionKey::new(V0, 4), PositionKey::new(V1, 4)]
        );
        assert_eq!(listing.entries[0].status, PositionStatus::Matured);
        assert_eq!(listing.entries[1].status, PositionStatus::Locked);
    }

    #[tokio::test]
    async fn test_broken_version_is_isolated() {
        let mut mock = MockGateway::mainnet()
            .with_token(V1, 1, snapshot(0, 10, NOW - 10))
            .with_owned(V1, owner(), vec![1]);
        mock.totals.insert(V0, 50);
        mock.broken_versions.insert(V0);
        let gateway = Arc::new(mock);
        let schedules = schedules();
        let penalty = CappedLinearPenalty::default();

        let listing = index(gateway).owned(owner(), valuation(&schedules, &penalty)).await;
        assert_eq!(listing.unavailable, vec![V0]);
        assert_eq!(listing.keys(), vec![PositionKey::new(V1, 1)]);
    }

    #[tokio::test]
    async fn test_claimable_requires_resolved_maturity() {
        let gateway = Arc::new(
            MockGateway::mainnet()
                .with_token(V1, 0, snapshot(0, 10, NOW - 1))
                .with_token(V1, 1, snapshot(10, 20, 0))
                .with_token(V1, 2, snapshot(20, 30, NOW + 1))
                .with_owned(V1, owner(), vec![0, 1, 2, 3]),
        );
        let schedules = schedules();
        let penalty = CappedLinearPenalty::default();

        let listing = index(gateway).claimable(owner(), valuation(&schedules, &penalty)).await;
        assert_eq!(listing.keys(), vec![PositionKey::new(V1, 0)]);

        let view = &listing.entries[0];
        // 10 units of 1e18 at 100 bps
        assert_eq!(
            view.net_claimable,
            Some(U256::from(9_900_000_000_000_000_000u128))
        );
        assert_eq!(view.reference_value, None);
    }

    #[tokio::test]
    async fn test_unsupported_tier_has_no_net() {
        let gateway = Arc::new(
            MockGateway::mainnet()
                .with_token(V1, 0, snapshot(0, 30, NOW - 1))
                .with_owned(V1, owner(), vec![0]),
        );
        let schedules = schedules();
        let penalty = CappedLinearPenalty::default();

        let listing = index(gateway).owned(owner(), valuation(&schedules, &penalty)).await;
        let view = &listing.entries[0];
        assert!(view.record.is_some());
        assert_eq!(view.net_claimable, None);
        assert_eq!(view.net_after_penalty, None);
    }

    #[tokio::test]
    async fn test_force_eligible_is_owned_and_matured() {
        let stranger = Address::repeat_byte(0x99);
        let mut mock = MockGateway::mainnet()
            .with_token(V0, 0, snapshot(0, 10, NOW - 100))
            .with_token(V1, 1, snapshot(0, 10, NOW - 86_400 * 3))
            .with_token(V1, 2, snapshot(10, 20, NOW - 86_400))
            .with_token(V1, 3, snapshot(20, 30, NOW + 100))
            .with_owned(V0, owner(), vec![0])
            .with_owned(V1, owner(), vec![1, 3])
            .with_owned(V1, stranger, vec![2]);
        mock.force_candidates = vec![1, 2];
        let gateway = Arc::new(mock);
        let schedules = schedules();
        let penalty = CappedLinearPenalty::default();

        let listing = index(gateway)
            .force_eligible(owner(), valuation(&schedules, &penalty))
            .await;
        assert_eq!(listing.keys(), vec![PositionKey::new(V1, 1)]);
        assert_eq!(listing.entries[0].penalty_percent, 3);
        assert!(listing.unavailable.is_empty());
    }

    #[tokio::test]
    async fn test_force_eligible_reports_broken_listing() {
        let mut mock = MockGateway::mainnet().with_token(V1, 1, snapshot(0, 10, NOW - 1));
        mock.broken_versions.insert(V1);
        let schedules = schedules();
        let penalty = CappedLinearPenalty::default();

        let listing = index(Arc::new(mock))
            .force_eligible(owner(), valuation(&schedules, &penalty))
            .await;
        assert!(listing.entries.is_empty());
        assert_eq!(listing.unavailable, vec![V1]);
    }

    #[tokio::test]
    async fn test_force_candidates_filter_maturity() {
        let mut mock = MockGateway::mainnet()
            .with_token(V1, 5, snapshot(0, 10, NOW - 86_400 * 3))
            .with_token(V1, 6, snapshot(10, 20, NOW + 100));
        mock.force_candidates = vec![5, 6];
        let gateway = Arc::new(mock);
        let schedules = schedules();
        let penalty = CappedLinearPenalty::default();

        let listing = index(gateway)
            .force_candidates(valuation(&schedules, &penalty))
            .await
            .unwrap();
        assert_eq!(listing.keys(), vec![PositionKey::new(V1, 5)]);
    }

    #[tokio::test]
    async fn test_referral_excludes_own_boxes() {
        let referrer = Address::repeat_byte(0x22);
        let mut mock = MockGateway::mainnet()
            .with_token(V1, 1, snapshot(0, 100, NOW - 1))
            .with_token(V1, 2, snapshot(100, 110, NOW - 1))
            .with_owned(V1, referrer, vec![2]);
        mock.referred.get_mut().insert(referrer, vec![1, 2, 2]);
        let gateway = Arc::new(mock);
        let index = index(gateway);
        let schedules = schedules();
        let penalty = CappedLinearPenalty::default();

        let referred = index.referred_ids(referrer).await.unwrap();
        assert_eq!(referred, BTreeSet::from([1, 2]));

        let listing = index
            .referral(referrer, &referred, 20, valuation(&schedules, &penalty))
            .await
            .unwrap();
        assert_eq!(listing.keys(), vec![PositionKey::new(V1, 1)]);
        // 100e18 * 250 / 10000 * 20 / 100 = 0.5e18
        assert_eq!(
            listing.entries[0].referral_share,
            Some(U256::from(500_000_000_000_000_000u64))
        );
    }

    #[tokio::test]
    async fn test_search_by_id_is_bounded_by_supply() {
        let gateway = Arc::new(MockGateway::mainnet().with_token(V1, 3, snapshot(0, 10, NOW)));
        let index = index(gateway);
        let schedules = schedules();
        let penalty = CappedLinearPenalty::default();

        let hit = index.search("3", valuation(&schedules, &penalty)).await.unwrap();
        assert_eq!(hit.keys(), vec![PositionKey::new(V1, 3)]);

        let miss = index.search("4", valuation(&schedules, &penalty)).await.unwrap();
        assert!(miss.entries.is_empty());

        assert!(matches!(
            index.search("hello", valuation(&schedules, &penalty)).await,
            Err(SearchError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_search_by_address_matches_owned() {
        let gateway = Arc::new(
            MockGateway::mainnet()
                .with_token(V1, 0, snapshot(0, 10, NOW))
                .with_owned(V1, owner(), vec![0]),
        );
        let schedules = schedules();
        let penalty = CappedLinearPenalty::default();
        let query = format!("{:?}", owner());

        let listing = index(gateway).search(&query, valuation(&schedules, &penalty)).await.unwrap();
        assert_eq!(listing.keys(), vec![PositionKey::new(V1, 0)]);
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(SearchQuery::parse(" 12 "), Ok(SearchQuery::Token(12)));
        assert!(matches!(
            SearchQuery::parse("0x1111111111111111111111111111111111111111"),
            Ok(SearchQuery::Owner(_))
        ));
        assert!(SearchQuery::parse("0x11").is_err());
        assert!(SearchQuery::parse("-1").is_err());
    }

    #[test]
    fn test_value_record_with_price() {
        let record = TokenRecord {
            version: V1,
            token_id: 0,
            range_start: 0,
            range_end: 10,
            maturity_ts: NOW - 86_400 * 2,
            term_days: 100,
            gross_reward: U256::from(10_000u64),
        };
        let schedules = schedules();
        let penalty = CappedLinearPenalty::default();
        let valuation = Valuation {
            quote: PriceQuote(U256::from(500_000_000_000_000_000u64)),
            ..valuation(&schedules, &penalty)
        };

        let view = value_record(&record, valuation, None);
        assert_eq!(view.net_claimable, Some(U256::from(9_900u64)));
        assert_eq!(view.penalty_percent, 2);
        assert_eq!(view.net_after_penalty, Some(U256::from(9_702u64)));
        assert_eq!(view.reference_value, Some(U256::from(4_851u64)));
    }
}
