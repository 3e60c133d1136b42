//! Engine adapter errors.

use td_types::WireError;
use thiserror::Error;

/// Errors from the engine adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine handle has been destroyed.
    #[error("engine has been destroyed")]
    Destroyed,

    /// The engine could not parse a synchronous request.
    #[error("engine rejected request {type_name}: request can't be parsed")]
    Rejected { type_name: String },

    /// The request text contains an interior NUL byte.
    #[error("request {type_name} contains a NUL byte")]
    InvalidRequest { type_name: String },

    /// The request could not be encoded, or a message could not be decoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}
