//! # TD Engine
//!
//! Safe access to a synchronous JSON engine that can only be driven by one
//! thread at a time and reuses its result buffer on every call.
//!
//! - [`Engine`] is the raw seam (`send`, `receive`, `execute`, `destroy`).
//! - [`EngineAdapter`] enforces the turnstile: `receive` and `execute` return
//!   a [`Message`] that holds an exclusive lock until it is dropped.
//! - `TdJson` (feature `tdjson`) links the native library.
//! - `ScriptedEngine` (feature `test-utils`) is an in-process stand-in.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapter;
pub mod engine;
pub mod error;

#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;

#[cfg(feature = "tdjson")]
pub mod tdjson;

pub use adapter::{EngineAdapter, Message, TurnstileGuard};
pub use engine::Engine;
pub use error::EngineError;

#[cfg(any(test, feature = "test-utils"))]
pub use scripted::{AuthFlow, Login, ScriptedEngine};

#[cfg(feature = "tdjson")]
pub use tdjson::TdJson;
