//! # TD Client
//!
//! Multi-consumer async client over a single-threaded JSON engine.
//!
//! ```text
//!  callers ──send()──┐                          ┌──► CorrelationTable ──► caller's slot
//!                    ▼                          │
//!              EngineAdapter ◄──receive()── dispatch loop
//!                                               │
//!  listeners ◄── ListenerRegistry ◄─broadcast───┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let (mut authorizer, mut handle) = ClientAuthorizer::new();
//! handle.supply_parameters(parameters).await?;
//! tokio::spawn(async move { auth::terminal::prompt_stdio(&mut handle).await });
//!
//! let client = Client::builder()
//!     .config(ClientConfig::from_env()?)
//!     .start(TdJson::create().ok_or("no engine")?, &mut authorizer)
//!     .await?;
//!
//! let mut updates = client.listener();
//! while let Some(event) = updates.recv().await { /* ... */ }
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod auth;
pub mod client;
pub mod config;
pub mod correlation;
mod dispatch;
pub mod error;

pub use auth::{authorize, AuthorizationStateHandler, AuthorizerHandle, BotAuthorizer, ClientAuthorizer};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, ConfigError};
pub use correlation::{uuid_v4_tokens, CorrelationTable, TokenGenerator};
pub use error::{AuthError, ClientError};

pub use shared_bus::{Listener, ListenerHandle, OverflowPolicy};
pub use td_engine::{Engine, TurnstileGuard};
pub use td_types::{AuthorizationState, Event, Request, Response, TdlibParameters};
