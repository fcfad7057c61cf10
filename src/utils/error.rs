// src/utils/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid credentials for object '{0}'")]
    Unauthorized(String),

    #[error("Object '{0}' is not connected")]
    NotConnected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Destination '{0}' is unreachable")]
    Unreachable(String),

    #[error("No response to request {0} within the timeout")]
    Timeout(u64),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
