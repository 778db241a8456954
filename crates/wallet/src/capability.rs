//! Capability handles derived from a session.
//!
//! A [`WalletReader`] needs only a provider and serves `view` calls. A
//! [`WalletSigner`] is bound to `(provider, address, chain_id)` and is
//! re-derived by the session whenever the active account or chain changes,
//! so a stale binding is never handed to new calls.

use std::{fmt, sync::Arc, time::Duration};

use alloy_primitives::{Address, Bytes, ChainId, TxHash};
use serde_json::Value;

use crate::provider::{
    EthereumRequest, ProviderError, TransactionReceipt, TransactionRequest, WalletProvider,
};

/// JSON-RPC parse-error code, used when a provider response does not decode
/// into the expected shape.
const CODE_PARSE_ERROR: i64 = -32700;

fn malformed(what: &str, err: impl fmt::Display) -> ProviderError {
    ProviderError::new(CODE_PARSE_ERROR, format!("malformed {what} response: {err}"))
}

/// Read capability: contract `view` calls and receipt lookups. Usable without
/// an active account.
#[derive(Debug, Clone)]
pub struct WalletReader {
    provider: Arc<dyn WalletProvider>,
}

impl WalletReader {
    pub(crate) fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self { provider }
    }

    /// Execute a read-only call against the latest block.
    pub async fn call(&self, tx: TransactionRequest) -> Result<Bytes, ProviderError> {
        let value = self.provider.request(EthereumRequest::Call(tx, "latest".into())).await?;
        decode_json::<Bytes>("eth_call", value)
    }

    /// Fetch the receipt for `hash`, or `None` while the transaction is still
    /// pending.
    pub async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        let value = self.provider.request(EthereumRequest::GetTransactionReceipt([hash])).await?;
        if value.is_null() {
            return Ok(None);
        }
        decode_json("eth_getTransactionReceipt", value).map(Some)
    }

    /// Poll until `hash` is included in a block.
    ///
    /// No timeout is imposed here; callers that need one wrap the future
    /// themselves.
    pub async fn wait_for_inclusion(
        &self,
        hash: TxHash,
        poll_interval: Duration,
    ) -> Result<TransactionReceipt, ProviderError> {
        loop {
            if let Some(receipt) = self.transaction_receipt(hash).await? {
                tracing::debug!(target: "redpocket::wallet", %hash, "transaction included");
                return Ok(receipt);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// Signing capability bound to a specific account on a specific chain.
///
/// The wallet signs and submits in one step via `eth_sendTransaction`; there
/// is no raw-hash signing path here.
#[derive(Debug, Clone)]
pub struct WalletSigner {
    provider: Arc<dyn WalletProvider>,
    address: Address,
    chain_id: ChainId,
}

impl WalletSigner {
    pub(crate) fn new(provider: Arc<dyn WalletProvider>, address: Address, chain_id: ChainId) -> Self {
        Self { provider, address, chain_id }
    }

    /// The account this capability signs for.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The chain this capability is bound to.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// A read capability sharing this signer's provider, for post-submission
    /// receipt polling.
    pub fn reader(&self) -> WalletReader {
        WalletReader::new(self.provider.clone())
    }

    /// Sign and submit `tx` from the bound account. The `from` field is
    /// stamped with the bound address unconditionally.
    pub async fn send_transaction(
        &self,
        mut tx: TransactionRequest,
    ) -> Result<TxHash, ProviderError> {
        tx.from = Some(self.address);
        let value = self.provider.request(EthereumRequest::SendTransaction([tx])).await?;
        decode_json("eth_sendTransaction", value)
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(
    what: &str,
    value: Value,
) -> Result<T, ProviderError> {
    serde_json::from_value(value).map_err(|err| malformed(what, err))
}
