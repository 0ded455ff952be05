//! Reference-currency pricing of the reward token.
//!
//! Two strategies are supported, selected per chain:
//!
//! - [`ReserveRatio`]: spot price from a constant-product pair
//! - [`SimulatedSwap`]: implied input of an exact-output QuoterV2 quote
//!
//! [`PriceOracle`] wraps the configured strategy and never fails: any remote
//! error collapses to [`PriceQuote::UNAVAILABLE`].
//!
//! # Example
//!
//! ```rust,ignore
//! use boxkeeper_chain::oracle::{PriceOracle, ReserveRatio};
//!
//! let oracle = PriceOracle::new(Box::new(ReserveRatio::new(pair, weth)));
//! let quote = oracle.quote(&gateway).await;
//! if let Some(value) = quote.convert(reward) {
//!     info!(value = %value, "Reward value");
//! }
//! ```

mod reserve_ratio;
mod simulated_swap;
mod types;

pub use reserve_ratio::ReserveRatio;
pub use simulated_swap::SimulatedSwap;
pub use types::{reserve_ratio_price, PriceQuote};

use async_trait::async_trait;
use std::fmt::Debug;
use tracing::{debug, warn};

use crate::error::ChainError;
use crate::gateway::ChainGateway;

/// One way of deriving a [`PriceQuote`] from chain state.
#[async_trait]
pub trait PriceStrategy: Send + Sync + Debug {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    async fn quote(&self, gateway: &dyn ChainGateway) -> Result<PriceQuote, ChainError>;
}

/// Infallible front for a [`PriceStrategy`].
#[derive(Debug)]
pub struct PriceOracle {
    strategy: Box<dyn PriceStrategy>,
}

impl PriceOracle {
    pub fn new(strategy: Box<dyn PriceStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Current quote, or [`PriceQuote::UNAVAILABLE`] on any failure.
    pub async fn quote(&self, gateway: &dyn ChainGateway) -> PriceQuote {
        match self.strategy.quote(gateway).await {
            Ok(quote) => {
                debug!(strategy = self.strategy.name(), quote = %quote, "Price quote");
                quote
            }
            Err(e) => {
                let error = ChainError::PriceUnavailable(e.to_string());
                warn!(strategy = self.strategy.name(), error = %error, "Using unavailable price");
                PriceQuote::UNAVAILABLE
            }
        }
    }
}
