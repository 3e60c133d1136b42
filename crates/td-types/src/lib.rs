//! # TD Types
//!
//! Wire shapes for the JSON engine interface.
//!
//! Every message crossing the engine boundary is a flat JSON object carrying
//! an `@type` tag and, for correlated traffic, an `@extra` token:
//!
//! ```text
//! request:  {"@type":"setAuthenticationPhoneNumber","@extra":"7f3c…","phone_number":"+1555…"}
//! reply:    {"@type":"ok","@extra":"7f3c…"}
//! event:    {"@type":"updateAuthorizationState","authorization_state":{…}}
//! ```
//!
//! - [`Request`] merges payload fields with the tags.
//! - [`Response`] keeps the payload as opaque bytes until a second pass
//!   decodes it into a concrete type.
//! - [`Event`] is the closed set of typed messages this build understands,
//!   with an explicit [`Event::Unknown`] case.
//! - [`functions`] holds the typed operations used by the client; the full
//!   per-operation surface is generated elsewhere.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod authorization;
pub mod error;
pub mod event;
pub mod functions;
pub mod int64;
pub mod request;
pub mod response;

pub use authorization::{AuthorizationState, TdlibParameters};
pub use error::WireError;
pub use event::{ConnectionState, Event, OptionValue, Text, UpdateAuthorizationState, UpdateOption};
pub use functions::{Function, OkResponse, Reply};
pub use request::Request;
pub use response::{Response, TdError};

/// Wire tag of the engine's error reply.
pub const ERROR_TYPE: &str = "error";

/// Wire tag of the engine's empty success reply.
pub const OK_TYPE: &str = "ok";
