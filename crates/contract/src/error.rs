use alloy_primitives::TxHash;
use redpocket_wallet::ProviderError;

use crate::units::AmountError;

/// Errors from facade read operations.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// No read capability yet; the wallet session was never established.
    /// Callers react to session state changes rather than blocking here.
    #[error("wallet session is not ready")]
    NotReady,
    #[error(transparent)]
    Rpc(#[from] ProviderError),
    #[error("failed to decode contract response: {0}")]
    Abi(#[from] alloy_sol_types::Error),
}

/// Errors from facade write operations.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// A write was attempted with no active signer. Checked before any
    /// provider call is issued.
    #[error("a connected signer is required for this operation")]
    SignerRequired,
    /// The user declined the transaction prompt in the wallet UI.
    #[error("transaction rejected in the wallet: {0}")]
    Rejected(String),
    /// The transaction was included but its execution reverted.
    #[error("transaction {0} reverted")]
    Reverted(TxHash),
    #[error(transparent)]
    InvalidAmount(#[from] AmountError),
    #[error(transparent)]
    Rpc(ProviderError),
}

/// Errors from [`RedPocket::from_env`](crate::RedPocket::from_env).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("REDPOCKET_ADDRESS is not set")]
    MissingAddress,
    #[error("invalid REDPOCKET_ADDRESS: {0}")]
    InvalidAddress(String),
}
