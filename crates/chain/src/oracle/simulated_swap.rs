//! Price from a read-only exact-output swap quote.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tracing::debug;

use super::types::PriceQuote;
use super::PriceStrategy;
use crate::error::ChainError;
use crate::gateway::ChainGateway;
use crate::u256_math::WAD;

/// Asks a QuoterV2 how much reference token buys exactly one reward token.
#[derive(Debug, Clone)]
pub struct SimulatedSwap {
    pub quoter: Address,
    pub reference_token: Address,
    pub reward_token: Address,
    /// Pool fee tier (e.g. 3000 = 0.3%)
    pub fee: u32,
}

impl SimulatedSwap {
    /// Quoted output amount: one whole reward token.
    pub const AMOUNT_OUT: U256 = WAD;

    pub fn new(quoter: Address, reference_token: Address, reward_token: Address, fee: u32) -> Self {
        Self {
            quoter,
            reference_token,
            reward_token,
            fee,
        }
    }
}

#[async_trait]
impl PriceStrategy for SimulatedSwap {
    fn name(&self) -> &'static str {
        "simulated_swap"
    }

    async fn quote(&self, gateway: &dyn ChainGateway) -> Result<PriceQuote, ChainError> {
        let amount_in = gateway
            .quote_exact_output(
                self.quoter,
                self.reference_token,
                self.reward_token,
                Self::AMOUNT_OUT,
                self.fee,
            )
            .await?;
        debug!(quoter = %self.quoter, fee = self.fee, amount_in = %amount_in, "Swap quote");
        Ok(PriceQuote(amount_in))
    }
}
