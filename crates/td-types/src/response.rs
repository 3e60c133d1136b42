//! Incoming replies and events in their raw form.

use crate::error::WireError;
use crate::functions::Reply;
use crate::ERROR_TYPE;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error reply from the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code} {message}")]
pub struct TdError {
    /// Numeric error code.
    pub code: i32,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
struct Meta {
    #[serde(rename = "@type")]
    type_name: String,
    #[serde(rename = "@extra", default)]
    extra: Option<Value>,
}

/// A message received from the engine, copied out of the engine's buffer.
///
/// Replies and unsolicited events share this shape; events carry an empty
/// `extra`. The payload stays as raw bytes until [`Response::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Type tag of the payload.
    pub type_name: String,
    /// Correlation token, empty for unsolicited events.
    pub extra: String,
    /// The complete JSON object as received.
    pub data: Bytes,
}

impl Response {
    /// Copy a raw engine message and read its tags.
    pub fn from_slice(raw: &[u8]) -> Result<Self, WireError> {
        let meta: Meta = serde_json::from_slice(raw)?;
        let extra = match meta.extra {
            Some(Value::String(extra)) => extra,
            // Tokens we mint are always strings; anything else is not ours.
            _ => String::new(),
        };

        Ok(Self {
            type_name: meta.type_name,
            extra,
            data: Bytes::copy_from_slice(raw),
        })
    }

    /// Whether this is an error reply.
    pub fn is_error(&self) -> bool {
        self.type_name == ERROR_TYPE
    }

    /// Whether this message answers a request.
    pub fn is_reply(&self) -> bool {
        !self.extra.is_empty()
    }

    /// Decode the payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, WireError> {
        Ok(serde_json::from_slice(&self.data)?)
    }

    /// Decode a reply, checking its tag against the type the caller expects.
    pub fn decode_reply<T: Reply>(&self) -> Result<T, WireError> {
        if !T::accepts(&self.type_name) {
            return Err(WireError::UnexpectedType {
                expected: T::TYPE,
                actual: self.type_name.clone(),
            });
        }
        self.decode()
    }

    /// Split into the payload or the engine's error.
    ///
    /// An error reply that cannot itself be decoded is reported as a wire
    /// error rather than silently treated as success.
    pub fn into_result(self) -> Result<Result<Self, TdError>, WireError> {
        if self.is_error() {
            let error: TdError = self.decode()?;
            return Ok(Err(error));
        }
        Ok(Ok(self))
    }
}
