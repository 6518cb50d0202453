//! Shared value types for the session supervisor and its callers.

use serde::Serialize;

/// Readiness of the single backend session, as tracked by the supervisor.
///
/// `Ready` is the only state in which outbound sends are admissible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    /// A pairing credential has been issued but not yet scanned.
    AwaitingPairing,
    /// Credentials were accepted; the backend is still loading.
    Authenticated,
    Ready,
    Disconnected,
    Reinitializing,
}

impl SessionState {
    pub fn is_ready(self) -> bool {
        matches!(self, SessionState::Ready)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::AwaitingPairing => "awaiting_pairing",
            SessionState::Authenticated => "authenticated",
            SessionState::Ready => "ready",
            SessionState::Disconnected => "disconnected",
            SessionState::Reinitializing => "reinitializing",
        };
        f.write_str(name)
    }
}

/// Chat identifier in the backend's `<number>@c.us` format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatId(String);

impl ChatId {
    const SUFFIX: &'static str = "@c.us";

    /// Normalizes a raw recipient into chat-identifier form.
    ///
    /// Already-suffixed input passes through unchanged, so normalization is
    /// idempotent.
    pub fn normalize(raw: &str) -> Self {
        if raw.contains(Self::SUFFIX) {
            Self(raw.to_string())
        } else {
            Self(format!("{raw}{}", Self::SUFFIX))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-send options forwarded to the backend client.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Suppress the read receipt the backend would otherwise mark on send.
    pub suppress_read_receipt: bool,
}
