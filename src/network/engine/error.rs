// src/network/engine/error.rs
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication failed for '{0}'")]
    AuthenticationFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Destination '{0}' is offline or unknown")]
    Unreachable(String),

    #[error("Send error: {0}")]
    SendError(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
