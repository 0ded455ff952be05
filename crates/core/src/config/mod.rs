//! Configuration for the box keeper engine.
//!
//! This module provides:
//! - Engine tuning (concurrency, retries, paging, mint defaults, penalty)
//! - Chain configuration (RPC, box deployment, pricing, TVL pools)
//! - Configuration registry for runtime loading

mod chain;
mod engine;
mod registry;

pub use chain::{ChainConfig, ChainDetails, ContractsConfig, PriceConfig, RpcConfig, TvlConfig};
pub use engine::{EngineConfig, FetchConfig, MintConfig, PenaltyConfig, PenaltyCurveKind, RankingConfig, RetryConfig};
pub use registry::{load_from_env, ConfigRegistry};
