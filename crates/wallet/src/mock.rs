//! Scripted in-memory provider for tests.
//!
//! Responses are configured up front; every `request` is recorded so tests
//! can assert which provider calls were (or were not) issued. Event dispatch
//! clones the listener list first, so a listener may remove itself (the
//! teardown-from-`accountsChanged([])` path) without deadlocking.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use alloy_primitives::{Bytes, ChainId, TxHash};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::provider::{
    EthereumRequest, EventKind, EventListener, ListenerId, ProviderError, TransactionReceipt,
    WalletEvent, WalletProvider,
};

#[derive(Default)]
pub struct MockProvider {
    accounts: Mutex<Vec<String>>,
    chain_id: Mutex<ChainId>,
    /// Per-method scripted failures, keyed by JSON-RPC method name.
    failures: Mutex<HashMap<&'static str, ProviderError>>,
    /// `eth_call` returns, matched by calldata prefix (selector).
    call_returns: Mutex<Vec<(Bytes, Bytes)>>,
    send_hash: Mutex<Option<TxHash>>,
    receipts: Mutex<HashMap<TxHash, TransactionReceipt>>,
    /// Number of receipt lookups that answer "pending" before receipts are
    /// served, to exercise the inclusion poll loop.
    pending_polls: Mutex<u32>,
    requests: Mutex<Vec<EthereumRequest>>,
    listeners: Mutex<Vec<(ListenerId, EventKind, EventListener)>>,
    next_listener: Mutex<u64>,
    added: AtomicUsize,
    removed: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { chain_id: Mutex::new(1), ..Self::default() })
    }

    /// Provider pre-authorized with `accounts` on `chain_id`.
    pub fn with_accounts(chain_id: ChainId, accounts: &[&str]) -> Arc<Self> {
        let provider = Self::new();
        provider.set_chain_id(chain_id);
        provider.set_accounts(accounts);
        provider
    }

    pub fn set_accounts(&self, accounts: &[&str]) {
        *self.accounts.lock() = accounts.iter().map(|account| (*account).to_string()).collect();
    }

    pub fn set_chain_id(&self, chain_id: ChainId) {
        *self.chain_id.lock() = chain_id;
    }

    /// Make every request for `method` fail with the given EIP-1193 error.
    pub fn fail_method(&self, method: &'static str, code: i64, message: &str) {
        self.failures.lock().insert(method, ProviderError::new(code, message));
    }

    /// Script the return data for `eth_call`s whose calldata starts with
    /// `selector`.
    pub fn script_call(&self, selector: impl Into<Bytes>, returndata: impl Into<Bytes>) {
        self.call_returns.lock().push((selector.into(), returndata.into()));
    }

    /// Script the hash returned by the next `eth_sendTransaction`.
    pub fn script_send(&self, hash: TxHash) {
        *self.send_hash.lock() = Some(hash);
    }

    /// Make the receipt for the given transaction available.
    pub fn insert_receipt(&self, receipt: TransactionReceipt) {
        self.receipts.lock().insert(receipt.transaction_hash, receipt);
    }

    /// Answer the next `polls` receipt lookups with "pending".
    pub fn delay_receipt(&self, polls: u32) {
        *self.pending_polls.lock() = polls;
    }

    /// All requests issued so far, in order.
    pub fn requests(&self) -> Vec<EthereumRequest> {
        self.requests.lock().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn listeners_added(&self) -> usize {
        self.added.load(Ordering::SeqCst)
    }

    pub fn listeners_removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn emit_accounts_changed(&self, accounts: &[&str]) {
        self.dispatch(WalletEvent::AccountsChanged(
            accounts.iter().map(|account| (*account).to_string()).collect(),
        ));
    }

    pub fn emit_chain_changed(&self, chain_id_hex: &str) {
        self.dispatch(WalletEvent::ChainChanged(chain_id_hex.to_string()));
    }

    fn dispatch(&self, event: WalletEvent) {
        // Serial delivery; the lock is not held across listener invocations.
        let listeners: Vec<EventListener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request(&self, request: EthereumRequest) -> Result<Value, ProviderError> {
        self.requests.lock().push(request.clone());
        if let Some(err) = self.failures.lock().get(request.method()) {
            return Err(err.clone());
        }

        match request {
            EthereumRequest::RequestAccounts | EthereumRequest::Accounts => {
                Ok(json!(self.accounts.lock().clone()))
            }
            EthereumRequest::ChainId => Ok(json!(format!("0x{:x}", *self.chain_id.lock()))),
            EthereumRequest::SwitchChain(_) => Ok(Value::Null),
            EthereumRequest::Call(tx, _) => {
                let input = tx.input.unwrap_or_default();
                let returns = self.call_returns.lock();
                returns
                    .iter()
                    .find(|(selector, _)| input.starts_with(selector))
                    .map(|(_, returndata)| json!(returndata))
                    .ok_or_else(|| {
                        ProviderError::new(-32000, "execution reverted: unscripted call")
                    })
            }
            EthereumRequest::SendTransaction(_) => {
                let hash = (*self.send_hash.lock()).unwrap_or_else(|| TxHash::with_last_byte(0xaa));
                Ok(json!(hash))
            }
            EthereumRequest::GetTransactionReceipt([hash]) => {
                {
                    let mut pending = self.pending_polls.lock();
                    if *pending > 0 {
                        *pending -= 1;
                        return Ok(Value::Null);
                    }
                }
                match self.receipts.lock().get(&hash) {
                    Some(receipt) => Ok(json!(receipt)),
                    None => Ok(Value::Null),
                }
            }
        }
    }

    fn on(&self, kind: EventKind, listener: EventListener) -> ListenerId {
        let mut next = self.next_listener.lock();
        let id = ListenerId(*next);
        *next += 1;
        self.listeners.lock().push((id, kind, listener));
        self.added.fetch_add(1, Ordering::SeqCst);
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _, _)| *listener_id != id);
        if listeners.len() != before {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
