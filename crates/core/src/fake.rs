//! Fake backend client for unit testing supervision and the HTTP surface
//! without a browser.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::client::BackendClient;
use crate::error::{Result, WwebError};
use crate::types::{ChatId, SendOptions};

/// Snapshot of the calls a [`FakeBackend`] has observed.
#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub initialize: usize,
    pub destroy: usize,
    /// `(chat_id, text, suppress_read_receipt)` per send.
    pub sends: Vec<(String, String, bool)>,
}

/// Scriptable in-memory [`BackendClient`].
///
/// Records every call and lets tests inject failures per operation.
pub struct FakeBackend {
    calls: parking_lot::Mutex<Calls>,
    fail_initialize: AtomicBool,
    hang_destroy: AtomicBool,
    send_error: parking_lot::Mutex<Option<String>>,
    unregistered: parking_lot::Mutex<HashSet<String>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: parking_lot::Mutex::new(Calls::default()),
            fail_initialize: AtomicBool::new(false),
            hang_destroy: AtomicBool::new(false),
            send_error: parking_lot::Mutex::new(None),
            unregistered: parking_lot::Mutex::new(HashSet::new()),
        })
    }

    /// Snapshot of observed calls.
    pub fn calls(&self) -> Calls {
        self.calls.lock().clone()
    }

    /// Make subsequent `initialize` calls fail.
    pub fn fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `destroy` calls hang forever.
    pub fn hang_destroy(&self, hang: bool) {
        self.hang_destroy.store(hang, Ordering::SeqCst);
    }

    /// Make the next sends fail with `message`.
    pub fn set_send_error(&self, message: impl Into<String>) {
        *self.send_error.lock() = Some(message.into());
    }

    /// Clear any injected send failure.
    pub fn clear_send_error(&self) {
        *self.send_error.lock() = None;
    }

    /// Treat `chat_id` as not registered on the backend.
    pub fn mark_unregistered(&self, chat_id: &str) {
        self.unregistered.lock().insert(chat_id.to_string());
    }
}

#[async_trait]
impl BackendClient for FakeBackend {
    async fn initialize(&self) -> Result<()> {
        self.calls.lock().initialize += 1;
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(WwebError::Backend("initialize failed".to_string()));
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.calls.lock().destroy += 1;
        if self.hang_destroy.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn is_registered_user(&self, chat_id: &ChatId) -> Result<bool> {
        if let Some(message) = self.send_error.lock().clone() {
            return Err(WwebError::Backend(message));
        }
        Ok(!self.unregistered.lock().contains(chat_id.as_str()))
    }

    async fn send_message(&self, chat_id: &ChatId, text: &str, options: SendOptions) -> Result<()> {
        if let Some(message) = self.send_error.lock().clone() {
            return Err(WwebError::Backend(message));
        }
        self.calls.lock().sends.push((
            chat_id.as_str().to_string(),
            text.to_string(),
            options.suppress_read_receipt,
        ));
        Ok(())
    }

    async fn get_state(&self) -> Result<String> {
        Ok("CONNECTED".to_string())
    }
}
