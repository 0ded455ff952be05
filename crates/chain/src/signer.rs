//! Transaction signer and sender for box writes.
//! Uses Alloy providers for type-safe RPC interactions.
//!
//! A write resolves as soon as the node accepts the transaction; the hash is
//! returned without waiting for a receipt. Failures are classified into
//! [`WriteError`] and never retried.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use reqwest::Url;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::WriteError;
use crate::types::WriteOptions;

/// Signs and submits transactions from a single local key.
pub struct TransactionSender {
    /// RPC URL for sending transactions
    rpc_url: Url,
    /// Signer wallet
    wallet: EthereumWallet,
    /// Signer address
    pub address: Address,
    /// Chain ID
    chain_id: u64,
}

impl std::fmt::Debug for TransactionSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSender")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

impl TransactionSender {
    /// Create a sender from a hex private key (with or without 0x prefix).
    pub fn new(private_key: &str, rpc_url: Url, chain_id: u64) -> anyhow::Result<Self> {
        let key_str = private_key.trim().trim_start_matches("0x");
        let signer: PrivateKeySigner = key_str.parse()?;
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        info!(address = %address, chain_id, "Transaction sender initialized");

        Ok(Self {
            rpc_url,
            wallet,
            address,
            chain_id,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Submit a call to `to` and return its hash once accepted.
    ///
    /// Nonce and gas limit are filled by the provider. `options.gas_price`
    /// forces a legacy gas price.
    pub async fn send(&self, to: Address, calldata: Bytes, options: WriteOptions) -> Result<B256, WriteError> {
        let start = Instant::now();

        debug!(
            to = %to,
            calldata_len = calldata.len(),
            gas_price = ?options.gas_price,
            "Preparing transaction"
        );

        let mut tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(to)
            .with_input(calldata)
            .with_chain_id(self.chain_id);
        if let Some(gas_price) = options.gas_price {
            tx = tx.with_gas_price(gas_price);
        }

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.rpc_url.clone());

        match provider.send_transaction(tx).await {
            Ok(pending) => {
                let tx_hash = *pending.tx_hash();
                info!(
                    tx_hash = %tx_hash,
                    to = %to,
                    submit_ms = start.elapsed().as_millis(),
                    "Transaction submitted"
                );
                Ok(tx_hash)
            }
            Err(e) => {
                let error = WriteError::classify(&e.to_string());
                warn!(to = %to, error = %error, "Transaction submission failed");
                Err(error)
            }
        }
    }
}
