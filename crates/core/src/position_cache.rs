//! Fetch-once cache of token records.
//!
//! Each (version, token id) is fetched at most once per session: a stored
//! record is never refreshed, and concurrent requests for a missing key
//! share a single in-flight fetch. Detail fetches are bounded by a counting
//! semaphore; enumeration and fee/price reads are not.

use boxkeeper_chain::{ChainGateway, ContractVersion, PositionKey, RetryingCaller, TokenId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::position::TokenRecord;

type SharedFetch = Shared<BoxFuture<'static, Option<Arc<TokenRecord>>>>;

/// Default number of concurrent record fetches.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 10;

struct CacheInner {
    gateway: Arc<dyn ChainGateway>,
    retry: RetryingCaller,
    records: DashMap<PositionKey, Arc<TokenRecord>>,
    in_flight: DashMap<PositionKey, SharedFetch>,
    permits: Semaphore,
}

impl CacheInner {
    async fn fetch(self: Arc<Self>, key: PositionKey) -> Option<Arc<TokenRecord>> {
        let result = match self.permits.acquire().await {
            Ok(_permit) => {
                self.retry
                    .call("fetch_record", || self.gateway.fetch_record(key.version, key.token_id))
                    .await
            }
            Err(e) => Err(boxkeeper_chain::ChainError::rpc("fetch_record", e)),
        };

        let record = result
            .map_err(|e| e.to_string())
            .and_then(|snapshot| {
                TokenRecord::from_snapshot(key.version, key.token_id, &snapshot).map_err(|e| e.to_string())
            });

        let outcome = match record {
            Ok(record) => {
                let record = Arc::new(record);
                debug!(
                    key = %key,
                    units = record.unit_count(),
                    maturity_ts = record.maturity_ts,
                    gross = %record.gross_reward,
                    "Record cached"
                );
                self.records.insert(key, record.clone());
                Some(record)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Record unavailable");
                None
            }
        };

        self.in_flight.remove(&key);
        outcome
    }
}

/// Session-scoped record cache. Cheap to clone.
#[derive(Clone)]
pub struct PositionCache {
    inner: Arc<CacheInner>,
}

impl PositionCache {
    pub fn new(gateway: Arc<dyn ChainGateway>, retry: RetryingCaller, max_concurrent_fetches: usize) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                gateway,
                retry,
                records: DashMap::new(),
                in_flight: DashMap::new(),
                permits: Semaphore::new(max_concurrent_fetches.max(1)),
            }),
        }
    }

    /// Cached record, without fetching.
    pub fn get(&self, version: ContractVersion, token_id: TokenId) -> Option<Arc<TokenRecord>> {
        self.inner
            .records
            .get(&PositionKey::new(version, token_id))
            .map(|entry| entry.value().clone())
    }

    /// Cached record, fetching it first if absent.
    ///
    /// Returns `None` when the fetch failed after retries; the key stays
    /// absent and a later call tries again.
    pub async fn ensure(&self, version: ContractVersion, token_id: TokenId) -> Option<Arc<TokenRecord>> {
        let key = PositionKey::new(version, token_id);
        if let Some(record) = self.inner.records.get(&key) {
            return Some(record.value().clone());
        }

        let fetch = match self.inner.in_flight.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                // A fetch may have completed between the lookup above and
                // taking the entry.
                if let Some(record) = self.inner.records.get(&key) {
                    return Some(record.value().clone());
                }
                let fetch = self.inner.clone().fetch(key).boxed().shared();
                entry.insert(fetch.clone());
                fetch
            }
        };

        fetch.await
    }

    /// Ensure every key, concurrently (bounded by the fetch semaphore).
    pub async fn prefetch(&self, keys: &[PositionKey]) -> Vec<(PositionKey, Option<Arc<TokenRecord>>)> {
        let fetches = keys.iter().map(|key| async move {
            let record = self.ensure(key.version, key.token_id).await;
            (*key, record)
        });
        join_all(fetches).await
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    pub fn gateway(&self) -> &Arc<dyn ChainGateway> {
        &self.inner.gateway
    }
}
