//! # Signer-gated RedPocket contract facade
//!
//! Wraps the deployed RedPocket contract behind a fixed, enumerated set of
//! read and write operations. Reads need only a connected provider; writes
//! are structurally gated on the wallet session's signing capability, so a
//! write can never execute without a valid signer and a read never
//! unnecessarily requires one.
//!
//! The facade reads the [`WalletSession`](redpocket_wallet::WalletSession)
//! fresh on every call instead of holding its own copy of account or chain
//! state; a write is therefore always signed with the currently active
//! account.

pub mod abi;
pub mod error;
pub mod red_pocket;
pub mod units;

pub use abi::IRedPocket;
pub use error::{ConfigError, ReadError, WriteError};
pub use red_pocket::{ADDRESS_ENV, DEFAULT_POLL_INTERVAL, RedPocket, Summary};
pub use units::{AmountError, ETHER_DECIMALS, format_amount, parse_amount};
