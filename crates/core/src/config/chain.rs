//! Per-chain configuration: RPC, box deployment, pricing and TVL pools.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use boxkeeper_chain::{BoxDeployment, PriceOracle, ReserveRatio, SimulatedSwap};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Chain configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain details
    pub chain: ChainDetails,
    /// Box contract addresses
    pub contracts: ContractsConfig,
    /// Reward token pricing
    pub price: PriceConfig,
    /// Pools summed into the total-locked-value statistic
    #[serde(default)]
    pub tvl: Option<TvlConfig>,
}

/// Chain details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainDetails {
    /// Chain ID
    pub chain_id: u64,
    /// Human-readable name
    pub name: String,
    /// Native token symbol (e.g., "ETH", "BNB", "MATIC")
    pub native_token: String,
    /// Reward token symbol
    #[serde(default = "default_reward_token")]
    pub reward_token: String,
    /// Explorer URL for transaction links
    #[serde(default)]
    pub explorer_url: Option<String>,
    /// RPC configuration
    pub rpc: RpcConfig,
}

fn default_reward_token() -> String {
    "XEN".to_string()
}

impl ChainDetails {
    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), tx_hash))
    }
}

/// RPC endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Primary HTTP RPC endpoint
    pub http: String,
}

/// Box contract addresses (hex strings, `${VAR}` allowed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// V0 box; only deployed on Ethereum mainnet
    #[serde(default)]
    pub legacy_box: Option<String>,
    /// V1 box
    pub upgradeable_box: String,
    /// Read-only helper
    pub helper: String,
    /// XEN token
    pub xen: String,
}

/// Pricing strategy for the reward token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PriceConfig {
    /// Spot price from a constant-product pair
    ReserveRatio { pool: String, reference_token: String },
    /// Exact-output quote through a QuoterV2
    SimulatedSwap {
        quoter: String,
        reference_token: String,
        reward_token: String,
        #[serde(default = "default_swap_fee")]
        fee: u32,
    },
}

fn default_swap_fee() -> u32 {
    3000
}

/// Total-locked-value statistic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvlConfig {
    /// Token whose pool balances are summed (wrapped native token)
    pub reference_token: String,
    /// Pool addresses
    #[serde(default)]
    pub pools: Vec<String>,
}

impl ChainConfig {
    /// Load chain config from a TOML file and expand `${VAR}` references.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading chain config {}", path.display()))?;
        let mut config: ChainConfig =
            toml::from_str(&content).with_context(|| format!("parsing chain config {}", path.display()))?;
        config.expand_env_vars();
        Ok(config)
    }

    /// Expand environment variables in config values.
    pub fn expand_env_vars(&mut self) {
        self.chain.rpc.http = expand_env(&self.chain.rpc.http);

        let contracts = &mut self.contracts;
        if let Some(ref mut legacy) = contracts.legacy_box {
            *legacy = expand_env(legacy);
        }
        contracts.upgradeable_box = expand_env(&contracts.upgradeable_box);
        contracts.helper = expand_env(&contracts.helper);
        contracts.xen = expand_env(&contracts.xen);

        match &mut self.price {
            PriceConfig::ReserveRatio { pool, reference_token } => {
                *pool = expand_env(pool);
                *reference_token = expand_env(reference_token);
            }
            PriceConfig::SimulatedSwap {
                quoter,
                reference_token,
                reward_token,
                ..
            } => {
                *quoter = expand_env(quoter);
                *reference_token = expand_env(reference_token);
                *reward_token = expand_env(reward_token);
            }
        }

        if let Some(ref mut tvl) = self.tvl {
            tvl.reference_token = expand_env(&tvl.reference_token);
            for pool in tvl.pools.iter_mut() {
                *pool = expand_env(pool);
            }
        }
    }

    pub fn rpc_url(&self) -> Result<Url> {
        self.chain
            .rpc
            .http
            .parse()
            .with_context(|| format!("invalid RPC URL for chain {}", self.chain.chain_id))
    }

    /// Resolved box deployment.
    pub fn deployment(&self) -> Result<BoxDeployment> {
        let contracts = &self.contracts;
        let legacy_box = match contracts.legacy_box.as_deref() {
            // Unset `${VAR}` placeholders mean the chain has no legacy box
            Some(value) if !value.trim().is_empty() && !value.contains("${") => {
                Some(parse_address("contracts.legacy_box", value)?)
            }
            _ => None,
        };

        Ok(BoxDeployment {
            legacy_box,
            upgradeable_box: parse_address("contracts.upgradeable_box", &contracts.upgradeable_box)?,
            helper: parse_address("contracts.helper", &contracts.helper)?,
            xen: parse_address("contracts.xen", &contracts.xen)?,
        })
    }

    /// Price oracle for the configured strategy.
    pub fn price_oracle(&self) -> Result<PriceOracle> {
        let oracle = match &self.price {
            PriceConfig::ReserveRatio { pool, reference_token } => PriceOracle::new(Box::new(ReserveRatio::new(
                parse_address("price.pool", pool)?,
                parse_address("price.reference_token", reference_token)?,
            ))),
            PriceConfig::SimulatedSwap {
                quoter,
                reference_token,
                reward_token,
                fee,
            } => PriceOracle::new(Box::new(SimulatedSwap::new(
                parse_address("price.quoter", quoter)?,
                parse_address("price.reference_token", reference_token)?,
                parse_address("price.reward_token", reward_token)?,
                *fee,
            ))),
        };
        Ok(oracle)
    }

    /// (reference token, pools) for the locked-value statistic.
    pub fn tvl_pools(&self) -> Result<Option<(Address, Vec<Address>)>> {
        let Some(tvl) = &self.tvl else {
            return Ok(None);
        };
        let reference = parse_address("tvl.reference_token", &tvl.reference_token)?;
        let pools = tvl
            .pools
            .iter()
            .map(|p| parse_address("tvl.pools", p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some((reference, pools)))
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .with_context(|| format!("{} is not an address: {:?}", field, value))
}

/// Expand ${VAR_NAME} patterns with environment variable values.
fn expand_env(s: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return s.to_string();
    };
    let mut result = s.to_string();

    for cap in re.captures_iter(s) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            let var_name = var_match.as_str();
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(full_match.as_str(), &value);
            }
        }
    }

    result
}
