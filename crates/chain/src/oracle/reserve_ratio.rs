//! Spot price from a constant-product pair's reserves.

use alloy::primitives::Address;
use async_trait::async_trait;
use tracing::debug;

use super::types::{reserve_ratio_price, PriceQuote};
use super::PriceStrategy;
use crate::error::ChainError;
use crate::gateway::ChainGateway;

/// Reads one reference/reward pair and divides the reserves.
#[derive(Debug, Clone)]
pub struct ReserveRatio {
    pub pool: Address,
    pub reference_token: Address,
}

impl ReserveRatio {
    pub fn new(pool: Address, reference_token: Address) -> Self {
        Self { pool, reference_token }
    }
}

#[async_trait]
impl PriceStrategy for ReserveRatio {
    fn name(&self) -> &'static str {
        "reserve_ratio"
    }

    async fn quote(&self, gateway: &dyn ChainGateway) -> Result<PriceQuote, ChainError> {
        let reserves = gateway.fetch_pool_reserves(self.pool).await?;
        let (reference, reward) = reserves.oriented(self.reference_token);
        debug!(pool = %self.pool, reference = %reference, reward = %reward, "Pool reserves");
        Ok(reserve_ratio_price(reference, reward))
    }
}
