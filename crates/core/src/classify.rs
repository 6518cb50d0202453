//! Failure classification for backend error signals.
//!
//! The automation layer under the backend client fails often and mostly
//! harmlessly. Classification decides whether a raw error message warrants a
//! scheduled reinitialization or must be surfaced as-is. It is a pure
//! substring match against a fixed table; deterministic and total.

/// Outcome of classifying one failure signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A known transient automation-layer glitch; recover via reinit.
    Retryable,
    /// The pairing step itself stalled. Recovered the same way as
    /// `Retryable` but logged distinctly.
    AuthTimeout,
    /// Unrecognized. The caller must not attempt recovery, only log it;
    /// the process keeps running either way.
    Fatal,
}

/// Substring tables for known failure signatures.
///
/// The signatures (and which of them count as retryable) vary between
/// deployments of the same automation stack, so the table is configuration
/// with defaults rather than a fixed contract.
#[derive(Debug, Clone)]
pub struct ClassifierTable {
    retryable: Vec<String>,
    auth_timeout: Vec<String>,
}

/// Transient conditions observed from the automation engine: invalidated
/// execution contexts, malformed protocol replies, detached pages/frames,
/// and empty-resource responses.
const RETRYABLE_SIGNATURES: &[&str] = &[
    "Execution context was destroyed",
    "Protocol error (Network.getResponseBody)",
    "Protocol error (Runtime.callFunctionOn)",
    "ProtocolError",
    "Target closed",
    "Session closed",
    "detached Frame",
    "net::ERR_EMPTY_RESPONSE",
];

const AUTH_TIMEOUT_SIGNATURES: &[&str] = &["auth timeout", "authentication timeout"];

/// Subset of signatures that mean the session itself was invalidated while a
/// request was in flight, as opposed to a background glitch.
const SESSION_INVALIDATED_SIGNATURES: &[&str] = &[
    "Execution context was destroyed",
    "Protocol error (Runtime.callFunctionOn)",
];

impl Default for ClassifierTable {
    fn default() -> Self {
        Self {
            retryable: RETRYABLE_SIGNATURES.iter().map(|s| s.to_string()).collect(),
            auth_timeout: AUTH_TIMEOUT_SIGNATURES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ClassifierTable {
    pub fn new(retryable: Vec<String>, auth_timeout: Vec<String>) -> Self {
        Self { retryable, auth_timeout }
    }

    /// Classifies one raw failure message. Auth-timeout markers win over the
    /// generic retryable table so they keep their distinct log line.
    pub fn classify(&self, signal: &str) -> Classification {
        if self.auth_timeout.iter().any(|sig| signal.contains(sig.as_str())) {
            return Classification::AuthTimeout;
        }
        if self.retryable.iter().any(|sig| signal.contains(sig.as_str())) {
            return Classification::Retryable;
        }
        Classification::Fatal
    }
}

/// Whether a send-path failure indicates the session/page was destroyed under
/// the request. Callers flip readiness and schedule a reinit on `true`.
pub fn session_invalidated(signal: &str) -> bool {
    SESSION_INVALIDATED_SIGNATURES.iter().any(|sig| signal.contains(sig))
}
