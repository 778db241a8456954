use alloy_primitives::{Address, ChainId};

use crate::provider::ProviderError;

/// Errors from [`WalletSession::connect`](crate::session::WalletSession::connect)
/// and [`resume`](crate::session::WalletSession::resume).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// No injected wallet provider is present. Not retried; the user has to
    /// install or enable a wallet extension.
    #[error("no wallet provider detected")]
    ProviderUnavailable,
    /// The user declined the connection prompt, or the provider authorized no
    /// accounts.
    #[error("wallet connection request was rejected")]
    UserRejected,
    /// The provider returned data that does not parse into the expected
    /// shape (addresses, hex chain id).
    #[error("malformed provider response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Errors from [`WalletSession::switch_chain`](crate::session::WalletSession::switch_chain).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwitchError {
    #[error("no wallet provider detected")]
    ProviderUnavailable,
    /// The wallet has no configuration for the target chain (provider code
    /// 4902). The user has to add the chain first; not retried.
    #[error("chain {0} is not configured in the wallet")]
    UnknownChain(ChainId),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Errors from [`WalletSession::select_account`](crate::session::WalletSession::select_account).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    /// The requested address is not among the currently authorized accounts.
    #[error("account {0} is not authorized")]
    UnknownAccount(Address),
}
