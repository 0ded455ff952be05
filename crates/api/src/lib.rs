//! Box keeper API clients for external services.
//!
//! This crate provides HTTP clients for:
//! - Ranking service: global mint rank per chain and term

mod ranking;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use ranking::{RankingClient, RankingError, DEFAULT_RANK, DEFAULT_RANKING_URL};
