//! Error taxonomy for chain reads and writes.
//!
//! Reads fail with [`ChainError`] and are retried by the caller; writes fail
//! with [`WriteError`] and are surfaced to the initiator untouched.

use crate::types::ContractVersion;
use thiserror::Error;

/// Failure of a read-only chain call.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// RPC or decode failure that may succeed on another attempt.
    #[error("transient RPC failure in {operation}: {message}")]
    TransientRpc {
        operation: &'static str,
        message: String,
    },

    /// Every attempt of a retried call failed.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    ExhaustedRetries {
        operation: String,
        attempts: u32,
        last: Box<ChainError>,
    },

    /// The requested contract generation is not deployed on this chain.
    #[error("contract version {0} is not available on this chain")]
    VersionUnavailable(ContractVersion),

    /// The chain returned a value the engine cannot represent.
    #[error("invalid response from {operation}: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },

    /// No usable price for the reward token.
    #[error("price unavailable: {0}")]
    PriceUnavailable(String),
}

impl ChainError {
    pub fn rpc(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::TransientRpc {
            operation,
            message: err.to_string(),
        }
    }

    pub fn invalid(operation: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation,
            message: message.into(),
        }
    }
}

/// Failure of a state-mutating call. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("user rejected the transaction")]
    UserRejectedTransaction,

    #[error("insufficient funds for gas or value")]
    InsufficientFunds,

    #[error("contract reverted: {0}")]
    ContractReverted(String),

    #[error("no signer configured for this session")]
    NoSigner,

    #[error("contract version {0} does not support this operation")]
    VersionUnavailable(ContractVersion),

    #[error("transaction submission failed: {0}")]
    Submission(String),

    /// Mint batch size outside the fee tiers.
    #[error("cannot mint a batch of {0} accounts")]
    UnsupportedBatch(u64),
}

impl WriteError {
    /// Classify a wallet/RPC error message into a write failure.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();

        if lower.contains("user rejected")
            || lower.contains("user denied")
            || lower.contains("code: 4001")
            || lower.contains("code 4001")
        {
            return Self::UserRejectedTransaction;
        }

        if lower.contains("insufficient funds") {
            return Self::InsufficientFunds;
        }

        if let Some(idx) = lower.find("execution reverted") {
            let rest = &message[idx + "execution reverted".len()..];
            let reason = rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
            let reason = reason.trim_end_matches(|c: char| c == '"' || c.is_whitespace());
            return Self::ContractReverted(if reason.is_empty() {
                "no reason".to_string()
            } else {
                reason.to_string()
            });
        }

        Self::Submission(message.to_string())
    }
}
