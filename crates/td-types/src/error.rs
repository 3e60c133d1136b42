//! Wire encoding errors.

use thiserror::Error;

/// Errors raised while encoding or decoding engine messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// The payload is not valid JSON or does not match the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The message has no readable `@type` tag.
    #[error("message has no @type tag")]
    MissingType,

    /// A request payload did not serialize to a JSON object.
    #[error("request payload for {type_name} is not a JSON object")]
    NotAnObject { type_name: &'static str },

    /// The reply carried a different type than the caller expected.
    #[error("unexpected reply type: expected {expected}, got {actual}")]
    UnexpectedType {
        expected: &'static str,
        actual: String,
    },
}
