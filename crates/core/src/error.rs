use thiserror::Error;

pub type Result<T> = std::result::Result<T, WwebError>;

#[derive(Debug, Error)]
pub enum WwebError {
    /// Error reported by the backend client for a requested operation.
    #[error("{0}")]
    Backend(String),

    /// Failure in the driver process or its wire protocol.
    #[error("driver error: {0}")]
    Driver(String),

    /// A bounded wait elapsed before the operation settled.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// The pairing credential could not be rendered to an image.
    #[error("pairing credential rendering failed: {0}")]
    QrRender(String),

    /// The supervisor task is no longer running.
    #[error("session supervisor is not running")]
    SupervisorGone,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
