//! # Shared Bus - Listener Registry
//!
//! Fan-out of parsed engine events to any number of independent listeners.
//!
//! ```text
//! ┌──────────────┐   broadcast()   ┌──────────────────┐   recv()   ┌────────────┐
//! │ Dispatch     │ ──────────────► │ ListenerRegistry │ ─────────► │ Listener N │
//! │ loop         │                 │                  │            └────────────┘
//! └──────────────┘                 └──────────────────┘
//!                                    collect() on demand
//! ```
//!
//! ## Guarantees
//!
//! - Every active listener sees every broadcast event, in broadcast order.
//! - Closing is idempotent and never removes the entry synchronously; closed
//!   listeners are dropped by [`ListenerRegistry::collect`].
//! - A full queue is handled per [`OverflowPolicy`].

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod listener;
pub mod policy;
pub mod registry;

// Re-export main types
pub use listener::{Listener, ListenerError, ListenerHandle, ListenerId};
pub use policy::{OverflowPolicy, PolicyParseError};
pub use registry::{BroadcastReport, ListenerRegistry};

/// Events buffered per listener before the overflow policy applies.
pub const DEFAULT_LISTENER_CAPACITY: usize = 1024;
