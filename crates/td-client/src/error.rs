//! Client and handshake errors.

use crate::config::ConfigError;
use std::time::Duration;
use td_engine::EngineError;
use td_types::{TdError, WireError};
use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No reply arrived in time. The pending slot has been removed.
    #[error("request {type_name} timed out after {timeout:?}")]
    Timeout { type_name: String, timeout: Duration },

    /// The engine answered with an `error` reply.
    #[error("engine error {code}: {message}")]
    Engine { code: i32, message: String },

    /// The token generator produced a token that is still pending.
    #[error("correlation token {0} is already pending")]
    DuplicateToken(String),

    /// A request could not be encoded or a reply could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] WireError),

    /// The client is stopping or stopped.
    #[error("client stopped")]
    Stopped,

    /// The operation cannot go through `execute`.
    #[error("{0} cannot be executed synchronously")]
    NotSynchronous(&'static str),

    /// The engine adapter refused the call.
    #[error("engine adapter: {0}")]
    Adapter(#[source] EngineError),

    /// The client configuration is invalid.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// The authorization handshake failed during start.
    #[error("authorization failed: {0}")]
    Authorization(#[source] Box<AuthError>),
}

impl From<TdError> for ClientError {
    fn from(error: TdError) -> Self {
        Self::Engine {
            code: error.code,
            message: error.message,
        }
    }
}

impl From<EngineError> for ClientError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Destroyed => Self::Stopped,
            EngineError::Wire(wire) => Self::Decode(wire),
            other => Self::Adapter(other),
        }
    }
}

impl From<AuthError> for ClientError {
    fn from(error: AuthError) -> Self {
        Self::Authorization(Box::new(error))
    }
}

/// Errors from the authorization handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A handshake request failed.
    #[error("{0}")]
    Client(#[from] ClientError),

    /// The handoff slot for a credential was closed before a value arrived.
    #[error("{0} input closed")]
    SlotClosed(&'static str),

    /// The strategy cannot handle this state.
    #[error("unsupported authorization state: {0}")]
    UnsupportedState(String),

    /// The engine closed before authorization completed.
    #[error("engine closed during authorization")]
    Closed,

    /// Terminal input or output failed.
    #[error("terminal i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for client operations.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;
