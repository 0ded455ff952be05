//! Ranking service client.
//!
//! The service reports the global mint rank for a chain and term, which
//! feeds the mint reward estimate. It is best effort: callers fall back to
//! a default rank whenever it cannot answer.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Public ranking endpoint.
pub const DEFAULT_RANKING_URL: &str = "https://xenbox.33357.xyz/api";

/// Rank used when the service is unavailable.
pub const DEFAULT_RANK: u64 = 1_000_000;

/// Ways the ranking service can be unavailable.
#[derive(Debug, Error)]
pub enum RankingError {
    #[error("ranking service returned HTTP {0}")]
    Status(u16),

    #[error("ranking request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected ranking payload: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct RankResponse {
    #[serde(default)]
    rank: Option<serde_json::Value>,
}

impl RankResponse {
    /// Rank as a positive integer. Accepts numbers and numeric strings.
    fn rank(&self) -> Option<u64> {
        let rank = match self.rank.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
            serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }?;
        (rank > 0).then_some(rank)
    }
}

/// HTTP client for `GET {base}/rank/{chain_id}/{term}`.
#[derive(Debug, Clone)]
pub struct RankingClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for RankingClient {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_RANKING_URL)
    }
}

impl RankingClient {
    /// Create a client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Current rank for `term_days` on `chain_id`.
    #[instrument(skip(self))]
    pub async fn fetch_rank(&self, chain_id: u64, term_days: u64) -> Result<u64, RankingError> {
        let url = format!("{}/rank/{}/{}", self.base_url, chain_id, term_days);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RankingError::Status(status.as_u16()));
        }

        let body: RankResponse = response.json().await?;
        let rank = body
            .rank()
            .ok_or_else(|| RankingError::Decode(format!("missing or zero rank: {:?}", body.rank)))?;

        debug!(chain_id, term_days, rank, "Fetched rank");
        Ok(rank)
    }
}
