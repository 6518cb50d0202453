//! Session lifecycle supervision for a single WhatsApp Web automation
//! backend.
//!
//! The crate keeps exactly one backend session alive: it tracks readiness,
//! surfaces the pairing credential while a new session is being established,
//! classifies failures from the automation layer as retryable or not, and
//! drives a debounced, backoff-aware destroy-then-reinitialize cycle so that
//! backend instability never takes the embedding process down.

pub mod classify;
pub mod client;
pub mod error;
pub mod event;
pub mod fake;
pub mod qr;
pub mod supervisor;
pub mod types;

pub use classify::{Classification, ClassifierTable, session_invalidated};
pub use client::BackendClient;
pub use error::{Result, WwebError};
pub use event::ClientEvent;
pub use fake::FakeBackend;
pub use qr::PairingCredential;
pub use supervisor::{ReinitPolicy, Supervisor, SupervisorConfig, SupervisorHandle};
pub use types::{ChatId, SendOptions, SessionState};
