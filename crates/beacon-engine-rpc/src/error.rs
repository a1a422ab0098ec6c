use std::time::Duration;

use thiserror::Error;

/// Failure classes a remote call can end in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or unusable JWT secret
    Auth,
    /// Network failure, timeout, cancellation or non-2xx HTTP status
    Transport,
    /// The remote answered with a JSON-RPC error object
    Protocol,
    /// The response was well-formed JSON-RPC but its result had the wrong shape
    Data,
}

#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled by shutdown")]
    Cancelled,

    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("Remote error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("Malformed response: {0}")]
    Data(String),
}

impl RpcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcError::Auth(_) => ErrorKind::Auth,
            RpcError::Transport(_)
            | RpcError::Timeout(_)
            | RpcError::Cancelled
            | RpcError::HttpStatus(_) => ErrorKind::Transport,
            RpcError::Protocol { .. } => ErrorKind::Protocol,
            RpcError::Data(_) => ErrorKind::Data,
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => RpcError::HttpStatus(status.as_u16()),
            None => RpcError::Transport(err.to_string()),
        }
    }
}

impl From<beacon_engine_core::CoreError> for RpcError {
    fn from(err: beacon_engine_core::CoreError) -> Self {
        RpcError::Data(err.to_string())
    }
}
