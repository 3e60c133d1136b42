//! Typed events.
//!
//! Every message the dispatch loop receives is parsed into an [`Event`] and
//! broadcast to listeners. Dispatch is keyed on the `@type` tag; tags without
//! a typed variant become [`Event::Unknown`] so nothing is silently lost, and
//! only messages without a readable tag are rejected.

use crate::authorization::AuthorizationState;
use crate::error::WireError;
use crate::response::TdError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The authorization state changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAuthorizationState {
    pub authorization_state: AuthorizationState,
}

/// Value of an engine option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum OptionValue {
    #[serde(rename = "optionValueBoolean")]
    Boolean { value: bool },
    #[serde(rename = "optionValueEmpty")]
    Empty,
    #[serde(rename = "optionValueInteger")]
    Integer {
        #[serde(with = "crate::int64")]
        value: i64,
    },
    #[serde(rename = "optionValueString")]
    String { value: String },
}

/// An engine option changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOption {
    pub name: String,
    pub value: OptionValue,
}

/// Network connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ConnectionState {
    #[serde(rename = "connectionStateWaitingForNetwork")]
    WaitingForNetwork,
    #[serde(rename = "connectionStateConnectingToProxy")]
    ConnectingToProxy,
    #[serde(rename = "connectionStateConnecting")]
    Connecting,
    #[serde(rename = "connectionStateUpdating")]
    Updating,
    #[serde(rename = "connectionStateReady")]
    Ready,
}

/// The connection state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConnectionState {
    pub state: ConnectionState,
}

/// Plain text reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub text: String,
}

/// A parsed engine message.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    UpdateAuthorizationState(UpdateAuthorizationState),
    UpdateOption(UpdateOption),
    UpdateConnectionState(UpdateConnectionState),
    /// Reply to `getAuthorizationState`.
    AuthorizationState(AuthorizationState),
    /// Empty success reply.
    Ok,
    /// Error reply.
    Error(TdError),
    Text(Text),
    /// A well-formed message whose type has no typed variant.
    Unknown { type_name: String, payload: Value },
}

impl Event {
    /// Parse a raw engine message.
    pub fn from_slice(raw: &[u8]) -> Result<Self, WireError> {
        Self::from_value(serde_json::from_slice(raw)?)
    }

    /// Parse an already decoded JSON object.
    pub fn from_value(value: Value) -> Result<Self, WireError> {
        let type_name = value
            .get("@type")
            .and_then(Value::as_str)
            .ok_or(WireError::MissingType)?
            .to_owned();

        let event = match type_name.as_str() {
            "updateAuthorizationState" => Self::UpdateAuthorizationState(serde_json::from_value(value)?),
            "updateOption" => Self::UpdateOption(serde_json::from_value(value)?),
            "updateConnectionState" => Self::UpdateConnectionState(serde_json::from_value(value)?),
            "ok" => Self::Ok,
            "error" => Self::Error(serde_json::from_value(value)?),
            "text" => Self::Text(serde_json::from_value(value)?),
            tag if tag.starts_with("authorizationState") => {
                Self::AuthorizationState(serde_json::from_value(value)?)
            }
            _ => Self::Unknown {
                type_name,
                payload: value,
            },
        };
        Ok(event)
    }

    /// Wire tag of the message this event was parsed from.
    pub fn type_name(&self) -> &str {
        match self {
            Self::UpdateAuthorizationState(_) => "updateAuthorizationState",
            Self::UpdateOption(_) => "updateOption",
            Self::UpdateConnectionState(_) => "updateConnectionState",
            Self::AuthorizationState(state) => state.type_name(),
            Self::Ok => "ok",
            Self::Error(_) => "error",
            Self::Text(_) => "text",
            Self::Unknown { type_name, .. } => type_name,
        }
    }

    /// The new authorization state, if this event carries one.
    pub fn authorization_state(&self) -> Option<&AuthorizationState> {
        match self {
            Self::UpdateAuthorizationState(update) => Some(&update.authorization_state),
            Self::AuthorizationState(state) => Some(state),
            _ => None,
        }
    }
}
