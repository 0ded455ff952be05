//! Engine tuning with serde defaults.
//!
//! Every field has a default, so an empty `engine.toml` (or none at all)
//! yields the stock behaviour.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Runtime parameters of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Record fetching and enumeration
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Read retries
    #[serde(default)]
    pub retry: RetryConfig,

    /// Mint estimate inputs
    #[serde(default)]
    pub mint: MintConfig,

    /// Ranking service
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Late-claim penalty curve
    #[serde(default)]
    pub penalty: PenaltyConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
            mint: MintConfig::default(),
            ranking: RankingConfig::default(),
            penalty: PenaltyConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Record fetch limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum concurrent per-token detail fetches
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Token ids requested per enumeration page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_max_concurrent_fetches() -> usize {
    crate::position_cache::DEFAULT_MAX_CONCURRENT_FETCHES
}
fn default_page_size() -> usize {
    crate::position_index::DEFAULT_PAGE_SIZE
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            page_size: default_page_size(),
        }
    }
}

/// Fixed-interval retry for chain reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,

    #[serde(default = "default_retry_interval_ms")]
    pub interval_ms: u64,
}

fn default_retry_attempts() -> u32 {
    boxkeeper_chain::DEFAULT_MAX_ATTEMPTS
}
fn default_retry_interval_ms() -> u64 {
    boxkeeper_chain::DEFAULT_RETRY_INTERVAL.as_millis() as u64
}

impl RetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            interval_ms: default_retry_interval_ms(),
        }
    }
}

/// Inputs of the mint reward estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintConfig {
    /// Term the ranking service is queried for
    #[serde(default = "default_term_days")]
    pub default_term_days: u64,

    /// Rank used when the ranking service is unavailable
    #[serde(default = "default_rank")]
    pub default_rank: u64,
}

fn default_term_days() -> u64 {
    365
}
fn default_rank() -> u64 {
    boxkeeper_api::DEFAULT_RANK
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            default_term_days: default_term_days(),
            default_rank: default_rank(),
        }
    }
}

/// Ranking service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_ranking_url")]
    pub url: String,
}

fn default_ranking_url() -> String {
    boxkeeper_api::DEFAULT_RANKING_URL.to_string()
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            url: default_ranking_url(),
        }
    }
}

/// Shape of the late-claim penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyCurveKind {
    /// Fixed percentage per day late, capped
    #[default]
    CappedLinear,
    /// XEN withdrawal-window schedule
    WithdrawalWindow,
}

/// Late-claim penalty parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyConfig {
    #[serde(default)]
    pub curve: PenaltyCurveKind,

    /// Seconds after maturity before the penalty starts
    #[serde(default)]
    pub grace_secs: u64,

    /// Percentage points added per full day late
    #[serde(default = "default_percent_per_day")]
    pub percent_per_day: u8,

    /// Upper bound of the penalty
    #[serde(default = "default_max_percent")]
    pub max_percent: u8,
}

fn default_percent_per_day() -> u8 {
    1
}
fn default_max_percent() -> u8 {
    99
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            curve: PenaltyCurveKind::default(),
            grace_secs: 0,
            percent_per_day: default_percent_per_day(),
            max_percent: default_max_percent(),
        }
    }
}
