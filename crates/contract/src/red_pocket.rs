//! Signer-gated facade over the RedPocket contract.
//!
//! Reads go through the session's read capability and work without an
//! account. Writes resolve the signing capability fresh from the session on
//! every invocation, fail fast with [`WriteError::SignerRequired`] before any
//! provider I/O when it is absent, and only report success after on-chain
//! inclusion. The facade holds no account/chain state of its own.

use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_sol_types::SolCall;
use redpocket_wallet::{Notifier, TransactionRequest, WalletSession};

use crate::{
    abi::IRedPocket,
    error::{ConfigError, ReadError, WriteError},
    units,
};

/// Environment variable holding the deployed contract address.
pub const ADDRESS_ENV: &str = "REDPOCKET_ADDRESS";

/// How often pending transactions are polled for inclusion by default.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Aggregate view of the pocket, assembled by [`RedPocket::summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// The account that funded the pocket.
    pub provider: Address,
    pub total_amount: U256,
    pub count: U256,
    pub claimed_count: U256,
    pub is_equal: bool,
    pub balance: U256,
    pub remaining_count: U256,
}

/// Facade over one deployed RedPocket contract.
#[derive(Clone)]
pub struct RedPocket {
    address: Address,
    session: WalletSession,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
}

impl RedPocket {
    pub fn new(address: Address, session: WalletSession, notifier: Arc<dyn Notifier>) -> Self {
        Self { address, session, notifier, poll_interval: DEFAULT_POLL_INTERVAL }
    }

    /// Read the contract address from `REDPOCKET_ADDRESS`.
    pub fn from_env(session: WalletSession, notifier: Arc<dyn Notifier>) -> Result<Self, ConfigError> {
        let raw = std::env::var(ADDRESS_ENV).map_err(|_| ConfigError::MissingAddress)?;
        let address =
            raw.parse().map_err(|err| ConfigError::InvalidAddress(format!("{raw}: {err}")))?;
        Ok(Self::new(address, session, notifier))
    }

    /// Override the receipt poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The deployed contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    // --- reads ---

    /// The account that funded the pocket.
    pub async fn pocket_provider(&self) -> Result<Address, ReadError> {
        self.read(IRedPocket::providerCall {}, "red pocket provider").await
    }

    pub async fn total_amount(&self) -> Result<U256, ReadError> {
        self.read(IRedPocket::totalAmountCall {}, "total amount").await
    }

    pub async fn count(&self) -> Result<U256, ReadError> {
        self.read(IRedPocket::countCall {}, "pocket count").await
    }

    pub async fn claimed_count(&self) -> Result<U256, ReadError> {
        self.read(IRedPocket::claimedCountCall {}, "claimed count").await
    }

    pub async fn is_equal(&self) -> Result<bool, ReadError> {
        self.read(IRedPocket::isEqualCall {}, "split mode").await
    }

    pub async fn balance(&self) -> Result<U256, ReadError> {
        self.read(IRedPocket::getBalanceCall {}, "pocket balance").await
    }

    pub async fn remaining_count(&self) -> Result<U256, ReadError> {
        self.read(IRedPocket::getRemainingCountCall {}, "remaining count").await
    }

    /// Amount already claimed by `claimer`, zero if none.
    pub async fn claimed_amount(&self, claimer: Address) -> Result<U256, ReadError> {
        self.read(IRedPocket::redPocketMapCall { claimer }, "claimed amount").await
    }

    /// Fan out all parameter reads concurrently and assemble one result.
    /// A single failure aborts the aggregate and surfaces one notification.
    pub async fn summary(&self) -> Result<Summary, ReadError> {
        let joined = tokio::try_join!(
            self.read_raw(IRedPocket::providerCall {}),
            self.read_raw(IRedPocket::totalAmountCall {}),
            self.read_raw(IRedPocket::countCall {}),
            self.read_raw(IRedPocket::claimedCountCall {}),
            self.read_raw(IRedPocket::isEqualCall {}),
            self.read_raw(IRedPocket::getBalanceCall {}),
            self.read_raw(IRedPocket::getRemainingCountCall {}),
        );
        match joined {
            Ok((provider, total_amount, count, claimed_count, is_equal, balance, remaining_count)) => {
                Ok(Summary {
                    provider,
                    total_amount,
                    count,
                    claimed_count,
                    is_equal,
                    balance,
                    remaining_count,
                })
            }
            Err(err) => {
                self.notifier.error(&format!("failed to read red pocket summary: {err}"));
                Err(err)
            }
        }
    }

    // --- writes ---

    /// Fund the pocket. `amount` is a decimal ether string, e.g. `"0.01"`.
    pub async fn deposit(&self, amount: &str) -> Result<TxHash, WriteError> {
        let value = match units::parse_amount(amount, units::ETHER_DECIMALS) {
            Ok(value) => value,
            Err(err) => {
                self.notifier.error(&format!("invalid deposit amount {amount:?}: {err}"));
                return Err(err.into());
            }
        };
        self.write("deposit", IRedPocket::depositCall {}.abi_encode(), Some(value)).await
    }

    /// Claim a share of the pocket.
    pub async fn grab(&self) -> Result<TxHash, WriteError> {
        self.write("grab red pocket", IRedPocket::grabRedPocketCall {}.abi_encode(), None).await
    }

    /// Return the remaining balance to the pocket's funder.
    pub async fn refund(&self) -> Result<TxHash, WriteError> {
        self.write("refund", IRedPocket::refundCall {}.abi_encode(), None).await
    }

    /// Halt the pocket and sweep its balance.
    pub async fn emergency_stop(&self) -> Result<TxHash, WriteError> {
        self.write("emergency stop", IRedPocket::emergencyStopCall {}.abi_encode(), None).await
    }

    // --- plumbing ---

    async fn read<C: SolCall>(&self, call: C, what: &str) -> Result<C::Return, ReadError> {
        match self.read_raw(call).await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.notifier.error(&format!("failed to read {what}: {err}"));
                Err(err)
            }
        }
    }

    async fn read_raw<C: SolCall>(&self, call: C) -> Result<C::Return, ReadError> {
        let Some(reader) = self.session.reader() else {
            return Err(ReadError::NotReady);
        };
        let tx = TransactionRequest {
            to: Some(self.address),
            input: Some(call.abi_encode().into()),
            ..Default::default()
        };
        let data = reader.call(tx).await?;
        Ok(C::abi_decode_returns(&data)?)
    }

    /// The write path: resolve the signer from the current session, submit,
    /// await inclusion, then report. Exactly one notification per outcome.
    async fn write(
        &self,
        operation: &'static str,
        call_data: Vec<u8>,
        value: Option<U256>,
    ) -> Result<TxHash, WriteError> {
        let Some(signer) = self.session.signer() else {
            self.notifier.error(&format!("connect a wallet to {operation}"));
            return Err(WriteError::SignerRequired);
        };

        let tx = TransactionRequest {
            to: Some(self.address),
            input: Some(Bytes::from(call_data)),
            value,
            ..Default::default()
        };
        let hash = match signer.send_transaction(tx).await {
            Ok(hash) => hash,
            Err(err) if err.is_user_rejected() => {
                self.notifier.error(&format!("{operation} rejected in the wallet"));
                return Err(WriteError::Rejected(err.message));
            }
            Err(err) => {
                self.notifier.error(&format!("{operation} failed: {}", err.message));
                return Err(WriteError::Rpc(err));
            }
        };
        tracing::debug!(target: "redpocket::contract", %hash, operation, "transaction submitted");

        let receipt = match signer.reader().wait_for_inclusion(hash, self.poll_interval).await {
            Ok(receipt) => receipt,
            Err(err) => {
                self.notifier
                    .error(&format!("{operation} failed awaiting inclusion: {}", err.message));
                return Err(WriteError::Rpc(err));
            }
        };
        if !receipt.is_success() {
            self.notifier.error(&format!("{operation} reverted on chain"));
            return Err(WriteError::Reverted(hash));
        }

        self.notifier.success(&format!("{operation} confirmed"));
        Ok(hash)
    }
}
