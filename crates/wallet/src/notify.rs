//! Fire-and-forget notification sink.
//!
//! Every failed connect/switch/read/write surfaces exactly one message here;
//! successful writes surface exactly one message after on-chain inclusion.
//! The sink itself is UI-owned (a toast, a status line); the default routes
//! through `tracing`.

/// UI notification sink for success/error surfacing.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default sink: structured log events via `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!(target: "redpocket::notify", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "redpocket::notify", "{message}");
    }
}

/// Sink that records messages, for asserting the one-notification rules.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: parking_lot::Mutex<Vec<(bool, String)>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingNotifier {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }

    /// All messages in delivery order, `true` marking successes.
    pub fn messages(&self) -> Vec<(bool, String)> {
        self.messages.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(ok, _)| !ok)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn successes(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(ok, _)| *ok)
            .map(|(_, msg)| msg.clone())
            .collect()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.messages.lock().push((true, message.to_string()));
    }

    fn error(&self, message: &str) {
        self.messages.lock().push((false, message.to_string()));
    }
}
