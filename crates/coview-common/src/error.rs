//! Common error types for Coview.

use thiserror::Error;

/// Result type alias using Coview's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Coview operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Sync protocol violation (bad payload, oversized frame, invalid state)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Broadcast channel failure (send/subscribe)
    #[error("channel error: {0}")]
    Channel(String),

    /// Media transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Operation attempted before the media transport signalled ready
    #[error("transport not ready: {0}")]
    NotReady(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a serialization error from any displayable type.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a protocol error from any displayable type.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create a channel error from any displayable type.
    pub fn channel(msg: impl std::fmt::Display) -> Self {
        Self::Channel(msg.to_string())
    }

    /// Create a transport error from any displayable type.
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Create a not-ready error from any displayable type.
    pub fn not_ready(msg: impl std::fmt::Display) -> Self {
        Self::NotReady(msg.to_string())
    }

    /// Create an internal error from any displayable type.
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }
}
