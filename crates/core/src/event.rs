//! Lifecycle events emitted by the backend client.
//!
//! The backend library reports its lifecycle through callbacks; here they are
//! modeled as an inbound channel consumed by the supervisor's event loop so a
//! single task observes them in order.

/// One lifecycle event from the backend client or its automation layer.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A new pairing credential was issued; carries the raw pairing string.
    PairingCode(String),
    /// Credentials were accepted; the session is not yet usable.
    Authenticated,
    /// The session is fully loaded and can send messages.
    Ready,
    /// The pairing step was rejected.
    AuthFailure,
    /// The backend lost its session; carries the backend's reason string.
    Disconnected(String),
    /// An error signal surfaced outside any request/response exchange.
    ///
    /// These would be uncaught errors in the backend library's own process
    /// model; the supervisor routes them through the failure classifier
    /// instead of letting them take anything down.
    Failure(String),
}
