//! # Engine Adapter
//!
//! Owns the engine handle and enforces the turnstile.
//!
//! The engine invalidates the buffer behind its last result on the next
//! `receive`/`execute`. The turnstile is an exclusive lock taken at the start
//! of either call and held by the returned [`Message`] until the consumer is
//! done with it, possibly on another thread:
//!
//! ```text
//! receive() ──lock──► engine.receive() ──► Message ──(copy out)──► drop ──unlock──►
//!                                                                        │
//! receive()/execute() ─────────── waits on the turnstile ────────────────┘
//! ```
//!
//! `send` does not take the turnstile; the engine accepts it from any thread.
//! It holds a shared lock on the handle instead, which `destroy` takes
//! exclusively, so no send is still inside the engine when the handle is freed.

use crate::engine::Engine;
use crate::error::EngineError;
use parking_lot::RwLock;
use std::any::Any;
use std::ffi::{c_char, CStr, CString};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;
use std::time::Duration;
use td_types::{Request, Response, WireError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace, warn};

/// Exclusive hold on the turnstile without a message.
///
/// Generated per-operation code that needs to keep other `receive`/`execute`
/// calls out while it copies fields takes one of these; dropping it unlocks.
pub struct TurnstileGuard {
    _guard: OwnedMutexGuard<()>,
}

impl fmt::Debug for TurnstileGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnstileGuard").finish_non_exhaustive()
    }
}

/// A message borrowed from the engine's buffer.
///
/// Holds the turnstile for as long as it lives. Copy what you need
/// ([`Message::to_response`], [`Message::as_bytes`]) and drop it; the next
/// `receive`/`execute` cannot start until then.
pub struct Message {
    data: NonNull<c_char>,
    // Dropped before `_engine`: unlock first, then let go of the handle.
    _turnstile: OwnedMutexGuard<()>,
    _engine: Arc<dyn Any + Send + Sync>,
}

// SAFETY: the buffer is only reachable through `&self` while the turnstile is
// held, so no other engine call can invalidate it, whichever thread we are on.
unsafe impl Send for Message {}

impl Message {
    /// Raw JSON bytes, without the trailing NUL.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `Engine` guarantees a NUL-terminated string valid until the
        // next receive/execute/destroy, all of which wait on our turnstile.
        unsafe { CStr::from_ptr(self.data.as_ptr()) }.to_bytes()
    }

    /// Copy the message into an owned [`Response`].
    pub fn to_response(&self) -> Result<Response, WireError> {
        Response::from_slice(self.as_bytes())
    }

    /// Copy the message out and release the turnstile.
    pub fn into_response(self) -> Result<Response, WireError> {
        self.to_response()
    }

    /// Release the turnstile.
    pub fn release(self) {}
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("data", &String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

/// Turnstile-guarded engine handle.
pub struct EngineAdapter {
    engine: Arc<dyn Engine>,
    turnstile: Arc<Mutex<()>>,
    // `true` once destroyed. Read-locked across every `send`.
    destroyed: RwLock<bool>,
}

impl EngineAdapter {
    /// Wrap an engine.
    pub fn new(engine: impl Engine) -> Self {
        Self::from_shared(Arc::new(engine))
    }

    /// Wrap an engine the caller keeps a handle to.
    pub fn from_shared(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            turnstile: Arc::new(Mutex::new(())),
            destroyed: RwLock::new(false),
        }
    }

    /// Whether the handle has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        *self.destroyed.read()
    }

    /// Fire a request. Safe from any thread; does not take the turnstile.
    pub fn send(&self, request: &Request) -> Result<(), EngineError> {
        let query = encode(request)?;

        let destroyed = self.destroyed.read();
        if *destroyed {
            return Err(EngineError::Destroyed);
        }
        self.engine.send(&query);
        drop(destroyed);

        trace!(
            type_name = %request.type_name,
            extra = %request.extra,
            "Request sent"
        );
        Ok(())
    }

    /// Wait up to `timeout` for the next message.
    ///
    /// Blocks the calling thread, first on the turnstile and then inside the
    /// engine. Must not be called from an async context; the dispatch loop
    /// runs it on a blocking thread. `Ok(None)` means the wait timed out, in
    /// which case the turnstile is already released.
    pub fn receive(&self, timeout: Duration) -> Result<Option<Message>, EngineError> {
        let turnstile = Arc::clone(&self.turnstile).blocking_lock_owned();
        if self.is_destroyed() {
            return Err(EngineError::Destroyed);
        }

        Ok(self
            .engine
            .receive(timeout)
            .map(|data| self.message(data, turnstile)))
    }

    /// Run a synchronous request, waiting for the turnstile asynchronously.
    pub async fn execute(&self, request: &Request) -> Result<Message, EngineError> {
        let query = encode(request)?;
        let turnstile = Arc::clone(&self.turnstile).lock_owned().await;
        self.execute_locked(request, &query, turnstile)
    }

    /// Take the turnstile without touching the engine.
    pub async fn lock(&self) -> TurnstileGuard {
        TurnstileGuard {
            _guard: Arc::clone(&self.turnstile).lock_owned().await,
        }
    }

    /// Destroy the engine once no message is outstanding.
    ///
    /// Waits for the turnstile, so an in-flight `receive` finishes and its
    /// message is released first, then for any `send` still in the engine.
    /// Idempotent.
    pub async fn destroy(&self) {
        let _turnstile = Arc::clone(&self.turnstile).lock_owned().await;
        self.destroy_now();
    }

    /// Destroy the engine without waiting for the turnstile.
    ///
    /// # Safety
    ///
    /// A `receive` or `execute` in flight on another thread, or a [`Message`]
    /// still held by a consumer, may touch freed engine memory afterwards.
    /// The caller accepts that risk.
    pub unsafe fn destroy_unsynchronized(&self) {
        warn!("Destroying engine without waiting for the turnstile");
        self.destroy_now();
    }

    fn destroy_now(&self) {
        let mut destroyed = self.destroyed.write();
        if !*destroyed {
            *destroyed = true;
            self.engine.destroy();
            debug!("Engine destroyed");
        }
    }

    fn execute_locked(
        &self,
        request: &Request,
        query: &CStr,
        turnstile: OwnedMutexGuard<()>,
    ) -> Result<Message, EngineError> {
        if self.is_destroyed() {
            return Err(EngineError::Destroyed);
        }

        match self.engine.execute(query) {
            Some(data) => Ok(self.message(data, turnstile)),
            None => Err(EngineError::Rejected {
                type_name: request.type_name.clone(),
            }),
        }
    }

    fn message(&self, data: NonNull<c_char>, turnstile: OwnedMutexGuard<()>) -> Message {
        let engine: Arc<dyn Any + Send + Sync> = Arc::new(Arc::clone(&self.engine));
        Message {
            data,
            _turnstile: turnstile,
            _engine: engine,
        }
    }
}

impl Drop for EngineAdapter {
    fn drop(&mut self) {
        if self.is_destroyed() {
            return;
        }
        // An outstanding message still holds the turnstile; leak the handle
        // rather than free its buffer under it.
        match self.turnstile.try_lock() {
            Ok(_turnstile) => self.destroy_now(),
            Err(_) => warn!("Engine adapter dropped while a message is outstanding; handle leaked"),
        }
    }
}

impl fmt::Debug for EngineAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineAdapter")
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

fn encode(request: &Request) -> Result<CString, EngineError> {
    CString::new(request.to_json()?).map_err(|_| EngineError::InvalidRequest {
        type_name: request.type_name.clone(),
    })
}
