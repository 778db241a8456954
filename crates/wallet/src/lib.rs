//! # Wallet session management for the RedPocket dapp
//!
//! This crate owns the connection lifecycle against an injected
//! [EIP-1193](https://eips.ethereum.org/EIPS/eip-1193) wallet provider:
//! connect, disconnect, account selection, chain switching, and
//! reconciliation with provider-pushed `accountsChanged`/`chainChanged`
//! events.
//!
//! ## Architecture
//!
//! - [`provider`] models the consumed provider surface (request enum, event
//!   interface, error codes) as a trait, so tests can inject a scripted
//!   provider.
//! - [`session`] is the single source of truth for "what address, on what
//!   chain, can we sign". All mutation goes through its methods and event
//!   handlers.
//! - [`capability`] holds the handles a session derives: a read capability
//!   usable as soon as a provider is known, and a signing capability bound to
//!   `(provider, account, chain)` that is invalidated and recreated on every
//!   account or chain change.
//! - [`notify`] is the fire-and-forget sink failures and confirmations are
//!   surfaced through.

pub mod capability;
pub mod error;
pub mod notify;
pub mod provider;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use capability::{WalletReader, WalletSigner};
pub use error::{ConnectError, SelectError, SwitchError};
pub use notify::{Notifier, TracingNotifier};
pub use provider::{
    CODE_UNRECOGNIZED_CHAIN, CODE_USER_REJECTED, EthereumRequest, EventKind, EventListener,
    ListenerId, ProviderError, TransactionReceipt, TransactionRequest, WalletEvent, WalletProvider,
};
pub use session::{Session, WalletSession};
