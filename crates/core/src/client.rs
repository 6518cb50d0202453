//! Backend client boundary.
//!
//! The messaging backend is reached through a browser-automation-driven
//! client library. The supervisor and the HTTP surface only ever talk to it
//! through this trait, so tests can substitute [`FakeBackend`] and the
//! gateway can plug in the real driver-backed client.
//!
//! [`FakeBackend`]: crate::fake::FakeBackend

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatId, SendOptions};

/// Operations exposed by the backend messaging client.
///
/// `initialize` and `destroy` are the reinitialization cycle's halves:
/// `destroy` is best-effort and may hang (callers bound it with a timeout),
/// `initialize` may fail with an auth timeout or an automation-layer error.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Connects the client and starts a new or restored session.
    async fn initialize(&self) -> Result<()>;

    /// Tears the client down. Best-effort; may hang on a wedged browser.
    async fn destroy(&self) -> Result<()>;

    /// Whether `chat_id` belongs to a registered user on the backend.
    async fn is_registered_user(&self, chat_id: &ChatId) -> Result<bool>;

    /// Sends a text message to `chat_id`.
    async fn send_message(&self, chat_id: &ChatId, text: &str, options: SendOptions) -> Result<()>;

    /// Diagnostic state string from the backend, for logging only.
    async fn get_state(&self) -> Result<String>;
}
