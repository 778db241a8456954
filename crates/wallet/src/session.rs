//! Wallet session lifecycle.
//!
//! [`WalletSession`] is the single source of truth for "what address, on what
//! chain, can we sign". It owns connect/disconnect, account selection and
//! chain switching, and reconciles local state with provider-pushed
//! `accountsChanged`/`chainChanged` events. Capabilities handed out by a
//! session are re-derived on every account or chain change; callers resolve
//! them fresh per call and never cache them.

use std::sync::Arc;

use alloy_primitives::{Address, ChainId};
use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    capability::{WalletReader, WalletSigner},
    error::{ConnectError, SelectError, SwitchError},
    notify::Notifier,
    provider::{EthereumRequest, EventKind, SwitchChainParams, WalletEvent, WalletProvider},
};

/// Snapshot of the session state.
///
/// `active_account` is `None` or an element of `accounts`; both capabilities
/// are rebound whenever the active account or chain changes.
#[derive(Debug, Clone, Default)]
pub struct Session {
    accounts: Vec<Address>,
    active_account: Option<Address>,
    chain_id: Option<ChainId>,
    reader: Option<WalletReader>,
    signer: Option<WalletSigner>,
}

impl Session {
    /// Authorized accounts in provider-reported order.
    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// The account writes are signed with, when connected.
    pub fn active_account(&self) -> Option<Address> {
        self.active_account
    }

    /// The chain the provider is currently configured for.
    pub fn chain_id(&self) -> Option<ChainId> {
        self.chain_id
    }

    /// Current read capability, if a provider is known.
    pub fn reader(&self) -> Option<WalletReader> {
        self.reader.clone()
    }

    /// Current signing capability, bound to the active account and chain.
    pub fn signer(&self) -> Option<WalletSigner> {
        self.signer.clone()
    }

    /// Connected means an active account with both capabilities derived.
    pub fn connected(&self) -> bool {
        self.active_account.is_some() && self.reader.is_some() && self.signer.is_some()
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    /// Rebind both capabilities to the current `(active_account, chain_id)`.
    fn derive_capabilities(&mut self, provider: &Arc<dyn WalletProvider>) {
        self.reader = Some(WalletReader::new(provider.clone()));
        self.signer = match (self.active_account, self.chain_id) {
            (Some(address), Some(chain_id)) => {
                Some(WalletSigner::new(provider.clone(), address, chain_id))
            }
            _ => None,
        };
    }
}

/// Both provider listeners, registered exactly once per connected session and
/// removed together on teardown.
struct Subscription {
    accounts: crate::provider::ListenerId,
    chain: crate::provider::ListenerId,
}

struct State {
    session: Session,
    subscription: Option<Subscription>,
}

struct Inner {
    provider: Option<Arc<dyn WalletProvider>>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<State>,
}

/// The session manager. Cheap to clone; all clones share one session.
///
/// Exactly one instance exists per running application and is injected into
/// everything that needs account/chain/signer state.
#[derive(Clone)]
pub struct WalletSession {
    inner: Arc<Inner>,
}

impl WalletSession {
    /// Create a manager over the injected provider. `provider` is `None` when
    /// the host environment has no wallet installed; every provider-facing
    /// operation then fails with a provider-unavailable error.
    pub fn new(provider: Option<Arc<dyn WalletProvider>>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                notifier,
                state: Mutex::new(State { session: Session::default(), subscription: None }),
            }),
        }
    }

    /// Current session state.
    pub fn snapshot(&self) -> Session {
        self.inner.state.lock().session.clone()
    }

    /// Fresh read capability, resolved from the current state.
    pub fn reader(&self) -> Option<WalletReader> {
        self.inner.state.lock().session.reader()
    }

    /// Fresh signing capability, resolved from the current state. Never cache
    /// the result across calls; a just-changed account or chain must always be
    /// honored.
    pub fn signer(&self) -> Option<WalletSigner> {
        self.inner.state.lock().session.signer()
    }

    pub fn connected(&self) -> bool {
        self.inner.state.lock().session.connected()
    }

    /// Connect to the wallet: request account authorization (a user-consent
    /// prompt), resolve the active chain, derive capabilities and subscribe to
    /// provider events. Calling while already connected is a no-op returning
    /// the existing session.
    pub async fn connect(&self) -> Result<Session, ConnectError> {
        let Some(provider) = self.inner.provider.clone() else {
            self.inner
                .notifier
                .error("no browser wallet detected; install a wallet extension and reload");
            return Err(ConnectError::ProviderUnavailable);
        };

        {
            let state = self.inner.state.lock();
            if state.session.connected() && state.subscription.is_some() {
                return Ok(state.session.clone());
            }
        }

        match self.establish(&provider, EthereumRequest::RequestAccounts).await {
            Ok(Some(session)) => Ok(session),
            // eth_requestAccounts returned an empty list: treated as a decline.
            Ok(None) => {
                self.inner.notifier.error("wallet connection request was rejected");
                Err(ConnectError::UserRejected)
            }
            Err(err) => {
                self.inner.notifier.error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Reconnect on load using `eth_accounts` (no consent prompt). Returns
    /// `Ok(None)` and leaves the session disconnected when the provider
    /// reports no already-authorized accounts.
    pub async fn resume(&self) -> Result<Option<Session>, ConnectError> {
        let Some(provider) = self.inner.provider.clone() else {
            self.inner
                .notifier
                .error("no browser wallet detected; install a wallet extension and reload");
            return Err(ConnectError::ProviderUnavailable);
        };

        self.establish(&provider, EthereumRequest::Accounts).await.map_err(|err| {
            self.inner.notifier.error(&err.to_string());
            err
        })
    }

    async fn establish(
        &self,
        provider: &Arc<dyn WalletProvider>,
        request: EthereumRequest,
    ) -> Result<Option<Session>, ConnectError> {
        let raw = provider.request(request).await.map_err(|err| {
            if err.is_user_rejected() {
                ConnectError::UserRejected
            } else {
                ConnectError::Provider(err)
            }
        })?;
        let accounts = parse_accounts(raw)?;
        if accounts.is_empty() {
            return Ok(None);
        }

        let chain_id = query_chain_id(provider).await?;

        let session = {
            let mut state = self.inner.state.lock();
            let session = &mut state.session;
            session.active_account = Some(accounts[0]);
            session.accounts = accounts;
            session.chain_id = Some(chain_id);
            session.derive_capabilities(provider);
            session.clone()
        };
        self.subscribe(provider);

        tracing::debug!(
            target: "redpocket::wallet",
            account = %session.active_account.unwrap_or_default(),
            chain_id,
            accounts = session.accounts.len(),
            "wallet session established"
        );
        Ok(Some(session))
    }

    /// Tear the session down: clear all state and remove both event
    /// listeners. Idempotent, and safe to call from within an event handler.
    pub fn disconnect(&self) {
        let subscription = {
            let mut state = self.inner.state.lock();
            state.session.clear();
            state.subscription.take()
        };
        if let Some(subscription) = subscription {
            if let Some(provider) = &self.inner.provider {
                provider.remove_listener(subscription.accounts);
                provider.remove_listener(subscription.chain);
            }
            tracing::debug!(target: "redpocket::wallet", "wallet session torn down");
        }
    }

    /// Ask the wallet to switch chains. On success the provider emits
    /// `chainChanged`, which is authoritative; this method deliberately does
    /// not touch `chain_id` itself.
    pub async fn switch_chain(&self, target: ChainId) -> Result<(), SwitchError> {
        let Some(provider) = self.inner.provider.clone() else {
            self.inner
                .notifier
                .error("no browser wallet detected; install a wallet extension and reload");
            return Err(SwitchError::ProviderUnavailable);
        };

        let request = EthereumRequest::SwitchChain([SwitchChainParams::new(target)]);
        match provider.request(request).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_unrecognized_chain() => {
                self.inner.notifier.error(&format!(
                    "chain {target} is not configured in the wallet; add it there first"
                ));
                Err(SwitchError::UnknownChain(target))
            }
            Err(err) => {
                self.inner.notifier.error(&format!("chain switch failed: {}", err.message));
                Err(SwitchError::Provider(err))
            }
        }
    }

    /// Reassign the active account among the already-authorized ones. Local
    /// only: no provider round-trip beyond rebinding the capabilities.
    pub fn select_account(&self, address: Address) -> Result<(), SelectError> {
        let selected = {
            let mut state = self.inner.state.lock();
            if state.session.accounts.contains(&address) {
                state.session.active_account = Some(address);
                if let Some(provider) = &self.inner.provider {
                    state.session.derive_capabilities(provider);
                }
                true
            } else {
                false
            }
        };
        if selected {
            tracing::debug!(target: "redpocket::wallet", account = %address, "active account selected");
            Ok(())
        } else {
            self.inner.notifier.error(&format!("account {address} is not authorized"));
            Err(SelectError::UnknownAccount(address))
        }
    }

    fn subscribe(&self, provider: &Arc<dyn WalletProvider>) {
        let mut state = self.inner.state.lock();
        if state.subscription.is_some() {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let accounts = provider.on(EventKind::AccountsChanged, {
            let weak = weak.clone();
            Arc::new(move |event| {
                if let (Some(inner), WalletEvent::AccountsChanged(accounts)) =
                    (weak.upgrade(), event)
                {
                    Self { inner }.on_accounts_changed(accounts);
                }
            })
        });
        let chain = provider.on(
            EventKind::ChainChanged,
            Arc::new(move |event| {
                if let (Some(inner), WalletEvent::ChainChanged(hex)) = (weak.upgrade(), event) {
                    Self { inner }.on_chain_changed(hex);
                }
            }),
        );
        state.subscription = Some(Subscription { accounts, chain });
    }

    /// Provider re-reported the authorized account list. An empty list is a
    /// full disconnect; otherwise the provider's first entry becomes active,
    /// whether or not it matches the previously active address.
    fn on_accounts_changed(&self, raw: &[String]) {
        if raw.is_empty() {
            tracing::debug!(target: "redpocket::wallet", "provider revoked all accounts");
            self.disconnect();
            return;
        }

        let mut accounts = Vec::with_capacity(raw.len());
        for entry in raw {
            match entry.parse::<Address>() {
                Ok(address) => accounts.push(address),
                Err(err) => tracing::warn!(
                    target: "redpocket::wallet",
                    account = %entry,
                    %err,
                    "ignoring unparseable account from accountsChanged"
                ),
            }
        }
        if accounts.is_empty() {
            self.disconnect();
            return;
        }

        let Some(provider) = &self.inner.provider else { return };
        let mut state = self.inner.state.lock();
        state.session.active_account = Some(accounts[0]);
        state.session.accounts = accounts;
        state.session.derive_capabilities(provider);
    }

    /// Provider switched chains. The signing capability is chain-bound, so it
    /// is rebound here; a no-op when no session was established yet.
    fn on_chain_changed(&self, hex: &str) {
        let chain_id = match parse_chain_id_hex(hex) {
            Ok(chain_id) => chain_id,
            Err(err) => {
                tracing::warn!(
                    target: "redpocket::wallet",
                    chain = hex,
                    %err,
                    "ignoring unparseable chainChanged payload"
                );
                return;
            }
        };

        let updated = {
            let mut state = self.inner.state.lock();
            if state.session.active_account.is_none() {
                false
            } else {
                state.session.chain_id = Some(chain_id);
                if let Some(provider) = &self.inner.provider {
                    state.session.derive_capabilities(provider);
                }
                true
            }
        };
        if updated {
            self.inner.notifier.success(&format!("connected to chain {chain_id}"));
        }
    }
}

/// Narrow a raw `eth_accounts`/`eth_requestAccounts` response into addresses.
/// Unvalidated provider data never flows past this point.
fn parse_accounts(value: Value) -> Result<Vec<Address>, ConnectError> {
    let raw: Vec<String> = serde_json::from_value(value)
        .map_err(|err| ConnectError::InvalidResponse(err.to_string()))?;
    raw.iter()
        .map(|entry| {
            entry
                .parse()
                .map_err(|err| ConnectError::InvalidResponse(format!("address {entry}: {err}")))
        })
        .collect()
}

async fn query_chain_id(provider: &Arc<dyn WalletProvider>) -> Result<ChainId, ConnectError> {
    let value = provider.request(EthereumRequest::ChainId).await?;
    let hex: String = serde_json::from_value(value)
        .map_err(|err| ConnectError::InvalidResponse(err.to_string()))?;
    parse_chain_id_hex(&hex)
        .map_err(|err| ConnectError::InvalidResponse(format!("chain id {hex}: {err}")))
}

/// Parse a 0x-prefixed hex chain id as delivered by `eth_chainId` and
/// `chainChanged`.
fn parse_chain_id_hex(hex: &str) -> Result<ChainId, std::num::ParseIntError> {
    ChainId::from_str_radix(hex.strip_prefix("0x").unwrap_or(hex), 16)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;
    use crate::{
        error::{ConnectError, SelectError, SwitchError},
        mock::MockProvider,
        notify::RecordingNotifier,
        provider::{CODE_UNRECOGNIZED_CHAIN, CODE_USER_REJECTED},
    };

    const ALICE: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const BOB: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
    const ALICE_HEX: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const BOB_HEX: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    fn session_over(
        provider: &std::sync::Arc<MockProvider>,
    ) -> (WalletSession, std::sync::Arc<RecordingNotifier>) {
        let notifier = RecordingNotifier::new();
        let session = WalletSession::new(
            Some(provider.clone() as Arc<dyn WalletProvider>),
            notifier.clone(),
        );
        (session, notifier)
    }

    #[tokio::test]
    async fn connect_populates_session_from_provider() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX, BOB_HEX]);
        let (session, _) = session_over(&provider);

        let snapshot = session.connect().await.unwrap();
        assert_eq!(snapshot.active_account(), Some(ALICE));
        assert_eq!(snapshot.accounts(), &[ALICE, BOB]);
        assert_eq!(snapshot.chain_id(), Some(97));
        assert!(snapshot.connected());

        let signer = session.signer().unwrap();
        assert_eq!(signer.address(), ALICE);
        assert_eq!(signer.chain_id(), 97);
    }

    #[tokio::test]
    async fn connect_without_provider_fails_and_notifies_once() {
        let notifier = RecordingNotifier::new();
        let session = WalletSession::new(None, notifier.clone());

        let err = session.connect().await.unwrap_err();
        assert_eq!(err, ConnectError::ProviderUnavailable);
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn connect_declined_in_wallet_ui() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX]);
        provider.fail_method("eth_requestAccounts", CODE_USER_REJECTED, "User rejected the request.");
        let (session, notifier) = session_over(&provider);

        let err = session.connect().await.unwrap_err();
        assert_eq!(err, ConnectError::UserRejected);
        assert!(!session.connected());
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn connect_with_empty_authorization_is_a_rejection() {
        let provider = MockProvider::with_accounts(97, &[]);
        let (session, notifier) = session_over(&provider);

        let err = session.connect().await.unwrap_err();
        assert_eq!(err, ConnectError::UserRejected);
        assert_eq!(notifier.errors().len(), 1);
        // The event listeners must not have been registered for a failed connect.
        assert_eq!(provider.listener_count(), 0);
    }

    #[tokio::test]
    async fn connect_is_a_noop_while_connected() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX]);
        let (session, _) = session_over(&provider);

        session.connect().await.unwrap();
        let again = session.connect().await.unwrap();

        assert_eq!(again.active_account(), Some(ALICE));
        // Exactly one subscribe for both listeners, no doubling.
        assert_eq!(provider.listeners_added(), 2);
        assert_eq!(provider.listener_count(), 2);
    }

    #[tokio::test]
    async fn reconnect_reflects_only_the_latest_provider_state() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX, BOB_HEX]);
        let (session, _) = session_over(&provider);

        session.connect().await.unwrap();
        session.disconnect();

        provider.set_accounts(&[BOB_HEX]);
        provider.set_chain_id(1337);
        let snapshot = session.connect().await.unwrap();

        // No leakage from the prior session.
        assert_eq!(snapshot.accounts(), &[BOB]);
        assert_eq!(snapshot.active_account(), Some(BOB));
        assert_eq!(snapshot.chain_id(), Some(1337));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_removes_listeners_once() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX]);
        let (session, _) = session_over(&provider);

        session.connect().await.unwrap();
        session.disconnect();
        session.disconnect();

        let snapshot = session.snapshot();
        assert!(snapshot.accounts().is_empty());
        assert_eq!(snapshot.active_account(), None);
        assert_eq!(snapshot.chain_id(), None);
        assert!(snapshot.signer().is_none());
        assert!(!snapshot.connected());

        assert_eq!(provider.listeners_added(), 2);
        assert_eq!(provider.listeners_removed(), 2);
        assert_eq!(provider.listener_count(), 0);
    }

    #[tokio::test]
    async fn accounts_changed_follows_provider_ordering() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX, BOB_HEX]);
        let (session, _) = session_over(&provider);
        session.connect().await.unwrap();

        // The provider reordered: its first entry becomes active even though
        // the previously active address is still authorized.
        provider.emit_accounts_changed(&[BOB_HEX, ALICE_HEX]);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.active_account(), Some(BOB));
        assert_eq!(snapshot.accounts(), &[BOB, ALICE]);
        assert_eq!(snapshot.signer().unwrap().address(), BOB);
    }

    #[tokio::test]
    async fn accounts_changed_empty_tears_the_session_down() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX, BOB_HEX]);
        let (session, _) = session_over(&provider);
        session.connect().await.unwrap();

        provider.emit_accounts_changed(&[ALICE_HEX, BOB_HEX]);
        provider.emit_accounts_changed(&[]);

        // Final state is fully disconnected, listeners gone.
        assert!(!session.connected());
        assert!(session.snapshot().accounts().is_empty());
        assert_eq!(provider.listener_count(), 0);
        assert_eq!(provider.listeners_removed(), 2);
    }

    #[tokio::test]
    async fn chain_changed_rebinds_the_signer() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX]);
        let (session, notifier) = session_over(&provider);
        session.connect().await.unwrap();

        provider.emit_chain_changed("0x539");

        let snapshot = session.snapshot();
        assert_eq!(snapshot.chain_id(), Some(1337));
        let signer = snapshot.signer().unwrap();
        assert_eq!(signer.address(), ALICE);
        assert_eq!(signer.chain_id(), 1337);
        assert_eq!(notifier.successes(), vec!["connected to chain 1337".to_string()]);
    }

    #[tokio::test]
    async fn chain_changed_before_connect_is_a_noop() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX]);
        let (session, notifier) = session_over(&provider);

        // Delivered before connect() completed: must not raise or mutate.
        session.on_chain_changed("0x539");

        assert_eq!(session.snapshot().chain_id(), None);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn switch_chain_success_defers_to_the_event() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX]);
        let (session, _) = session_over(&provider);
        session.connect().await.unwrap();

        session.switch_chain(1337).await.unwrap();
        // The method itself does not mutate the chain; the event does.
        assert_eq!(session.snapshot().chain_id(), Some(97));

        provider.emit_chain_changed("0x539");
        assert_eq!(session.snapshot().chain_id(), Some(1337));
    }

    #[tokio::test]
    async fn switch_chain_unconfigured_chain_is_reported() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX]);
        provider.fail_method(
            "wallet_switchEthereumChain",
            CODE_UNRECOGNIZED_CHAIN,
            "Unrecognized chain ID",
        );
        let (session, notifier) = session_over(&provider);
        session.connect().await.unwrap();

        let err = session.switch_chain(1337).await.unwrap_err();
        assert_eq!(err, SwitchError::UnknownChain(1337));
        assert_eq!(session.snapshot().chain_id(), Some(97));

        let errors = notifier.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("not configured"));
    }

    #[tokio::test]
    async fn select_account_rebinds_locally() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX, BOB_HEX]);
        let (session, _) = session_over(&provider);
        session.connect().await.unwrap();
        let requests_before = provider.requests().len();

        session.select_account(BOB).unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.active_account(), Some(BOB));
        assert_eq!(snapshot.signer().unwrap().address(), BOB);
        // Local-only: no provider round-trip.
        assert_eq!(provider.requests().len(), requests_before);
    }

    #[tokio::test]
    async fn select_account_rejects_unauthorized_addresses() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX]);
        let (session, notifier) = session_over(&provider);
        session.connect().await.unwrap();

        let err = session.select_account(BOB).unwrap_err();
        assert_eq!(err, SelectError::UnknownAccount(BOB));
        assert_eq!(session.snapshot().active_account(), Some(ALICE));
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn resume_restores_an_authorized_session_without_a_prompt() {
        let provider = MockProvider::with_accounts(97, &[ALICE_HEX]);
        let (session, _) = session_over(&provider);

        let snapshot = session.resume().await.unwrap().unwrap();
        assert_eq!(snapshot.active_account(), Some(ALICE));
        assert!(session.connected());

        let methods: Vec<_> = provider.requests().iter().map(|req| req.method()).collect();
        assert!(methods.contains(&"eth_accounts"));
        assert!(!methods.contains(&"eth_requestAccounts"));
    }

    #[tokio::test]
    async fn resume_with_no_authorized_accounts_stays_disconnected() {
        let provider = MockProvider::with_accounts(97, &[]);
        let (session, notifier) = session_over(&provider);

        assert!(session.resume().await.unwrap().is_none());
        assert!(!session.connected());
        assert_eq!(provider.listener_count(), 0);
        assert!(notifier.messages().is_empty());
    }
}
