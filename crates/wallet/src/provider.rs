//! EIP-1193 provider abstraction.
//!
//! The host environment injects a wallet provider exposing a request/response
//! RPC method plus an event interface for `accountsChanged` and
//! `chainChanged`. This module models exactly the surface the session manager
//! consumes, as a trait so tests can substitute a scripted provider.
//!
//! Reference: <https://eips.ethereum.org/EIPS/eip-1193>

use std::{fmt, sync::Arc};

use alloy_primitives::{Address, Bytes, ChainId, TxHash, U64, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// EIP-1193 error code for a user-rejected request (consent or signature
/// prompt declined in the wallet UI).
pub const CODE_USER_REJECTED: i64 = 4001;

/// EIP-1193 / MetaMask error code for `wallet_switchEthereumChain` targeting a
/// chain the wallet has not been configured with.
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;

/// Error returned by a provider `request` call.
///
/// Mirrors the `ProviderRpcError` shape of EIP-1193: a numeric code plus a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Whether the user declined the request in the wallet UI.
    pub fn is_user_rejected(&self) -> bool {
        self.code == CODE_USER_REJECTED
    }

    /// Whether the wallet does not know the requested chain.
    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == CODE_UNRECOGNIZED_CHAIN
    }
}

/// Minimal EIP-1193 transaction object, as passed to `eth_sendTransaction`
/// and `eth_call`. Quantities serialize as 0x-prefixed hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
}

/// Minimal transaction receipt, as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<U64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    /// Post-Byzantium receipts carry a status word; `0x0` means the
    /// transaction reverted.
    pub fn is_success(&self) -> bool {
        self.status.is_none_or(|status| status == U64::from(1u64))
    }
}

/// Params object for `wallet_switchEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchChainParams {
    /// Target chain id as a 0x-prefixed hex string.
    #[serde(rename = "chainId")]
    pub chain_id: String,
}

impl SwitchChainParams {
    pub fn new(chain_id: ChainId) -> Self {
        Self { chain_id: format!("0x{chain_id:x}") }
    }
}

/// The provider RPC surface the session core consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum EthereumRequest {
    /// Request account authorization. Triggers a user-consent prompt.
    #[serde(rename = "eth_requestAccounts")]
    RequestAccounts,

    /// List already-authorized accounts. No consent prompt; used for
    /// reconnect-on-load.
    #[serde(rename = "eth_accounts")]
    Accounts,

    /// Currently configured chain id, hex-encoded.
    #[serde(rename = "eth_chainId")]
    ChainId,

    /// Ask the wallet to switch its active chain.
    #[serde(rename = "wallet_switchEthereumChain")]
    SwitchChain([SwitchChainParams; 1]),

    /// Read-only contract call at the given block tag.
    #[serde(rename = "eth_call")]
    Call(TransactionRequest, String),

    /// Sign and submit a transaction in one step.
    #[serde(rename = "eth_sendTransaction")]
    SendTransaction([TransactionRequest; 1]),

    /// Fetch the receipt for a submitted transaction, if mined.
    #[serde(rename = "eth_getTransactionReceipt")]
    GetTransactionReceipt([TxHash; 1]),
}

impl EthereumRequest {
    /// The JSON-RPC method name this request serializes to.
    pub fn method(&self) -> &'static str {
        match self {
            Self::RequestAccounts => "eth_requestAccounts",
            Self::Accounts => "eth_accounts",
            Self::ChainId => "eth_chainId",
            Self::SwitchChain(_) => "wallet_switchEthereumChain",
            Self::Call(..) => "eth_call",
            Self::SendTransaction(_) => "eth_sendTransaction",
            Self::GetTransactionReceipt(_) => "eth_getTransactionReceipt",
        }
    }
}

/// Which provider event a listener is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AccountsChanged,
    ChainChanged,
}

/// Raw event payload as delivered by the provider.
///
/// Payloads are kept loosely typed here; the session manager validates and
/// narrows them into typed state at the boundary, on receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// New authorized account list, provider order. Empty means the user
    /// disconnected the site.
    AccountsChanged(Vec<String>),
    /// New chain id as a 0x-prefixed hex string.
    ChainChanged(String),
}

impl WalletEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AccountsChanged(_) => EventKind::AccountsChanged,
            Self::ChainChanged(_) => EventKind::ChainChanged,
        }
    }
}

/// Callback registered for a provider event.
pub type EventListener = Arc<dyn Fn(&WalletEvent) + Send + Sync>;

/// Handle identifying a registered listener, for `remove_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// An injected EIP-1193 wallet provider.
///
/// Implementations must dispatch events serially in delivery order and must
/// tolerate `remove_listener` being called from within a listener (teardown
/// triggered by `accountsChanged([])` happens exactly there).
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Submit a JSON-RPC request and await its result.
    async fn request(&self, request: EthereumRequest) -> Result<Value, ProviderError>;

    /// Register a listener for the given event. Returns a handle for removal.
    fn on(&self, kind: EventKind, listener: EventListener) -> ListenerId;

    /// Remove a previously registered listener. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);
}

impl fmt::Debug for dyn WalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletProvider")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_eip1193_shape() {
        let req = serde_json::to_value(EthereumRequest::RequestAccounts).unwrap();
        assert_eq!(req, serde_json::json!({ "method": "eth_requestAccounts" }));

        let req = serde_json::to_value(EthereumRequest::SwitchChain([SwitchChainParams::new(97)]))
            .unwrap();
        assert_eq!(
            req,
            serde_json::json!({
                "method": "wallet_switchEthereumChain",
                "params": [{ "chainId": "0x61" }],
            })
        );
    }

    #[test]
    fn transaction_request_hex_quantities() {
        let tx = TransactionRequest {
            value: Some(U256::from(1000u64)),
            ..Default::default()
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json, serde_json::json!({ "value": "0x3e8" }));
    }

    #[test]
    fn receipt_status_zero_is_failure() {
        let receipt = TransactionReceipt {
            transaction_hash: TxHash::ZERO,
            block_number: Some(U64::from(1u64)),
            status: Some(U64::ZERO),
        };
        assert!(!receipt.is_success());
    }
}
