//! Outgoing requests.

use crate::error::WireError;
use crate::functions::Function;
use serde::Serialize;
use serde_json::{Map, Value};

const TYPE_KEY: &str = "@type";
const EXTRA_KEY: &str = "@extra";

/// A request to the engine.
///
/// Serializes to a single flat object: payload fields plus `@type` and, when
/// set, `@extra`. An empty `extra` means no reply is observable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Operation tag.
    #[serde(rename = "@type")]
    pub type_name: String,

    /// Correlation token.
    #[serde(rename = "@extra", skip_serializing_if = "String::is_empty")]
    pub extra: String,

    /// Payload fields, merged into the same object as the tags.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Request {
    /// Create a request with an empty payload.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            extra: String::new(),
            data: Map::new(),
        }
    }

    /// Add a payload field. Tag keys are ignored.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if name != TYPE_KEY && name != EXTRA_KEY {
            self.data.insert(name, value.into());
        }
        self
    }

    /// Set the correlation token.
    #[must_use]
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    /// Build a request from a typed operation.
    pub fn from_function<F: Function>(function: &F) -> Result<Self, WireError> {
        let data = match serde_json::to_value(function)? {
            Value::Object(mut map) => {
                map.remove(TYPE_KEY);
                map.remove(EXTRA_KEY);
                map
            }
            Value::Null => Map::new(),
            _ => return Err(WireError::NotAnObject { type_name: F::TYPE }),
        };

        Ok(Self {
            type_name: F::TYPE.to_string(),
            extra: String::new(),
            data,
        })
    }

    /// Encode to the engine's JSON text form.
    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}
