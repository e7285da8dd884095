//! Error types for the push-to-talk bridge

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the capture, speech and bus components
#[derive(Debug, Error)]
pub enum Error {
    /// Capture or output device unavailable
    #[error("audio device error: {0}")]
    Device(String),

    /// A capture or recognition session is already running
    #[error("already active: {0}")]
    AlreadyActive(String),

    /// Recognition or synthesis backend failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Broker unreachable
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
