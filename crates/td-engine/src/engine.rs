//! The raw engine seam.

use std::ffi::{c_char, CStr};
use std::ptr::NonNull;
use std::time::Duration;

/// A synchronous, single-threaded JSON engine.
///
/// This is the shape of `td_json_client_*`: requests go in as NUL-terminated
/// JSON text, messages come out as pointers into a buffer the engine owns.
///
/// Callers outside this crate never use an `Engine` directly; they go through
/// [`EngineAdapter`](crate::EngineAdapter), which serializes `receive` and
/// `execute` behind the turnstile.
///
/// # Safety
///
/// Implementors guarantee that:
///
/// - `send` may be called from any thread, concurrently with any method.
/// - A pointer returned by `receive` or `execute` points to a NUL-terminated
///   string that stays valid and unmodified until the next call to `receive`,
///   `execute` or `destroy` on the same engine, and no longer.
/// - `destroy` is only ever called once; no method is called after it.
pub unsafe trait Engine: Send + Sync + 'static {
    /// Queue a request. Never blocks on a reply.
    fn send(&self, request: &CStr);

    /// Wait up to `timeout` for the next message. `None` on timeout.
    fn receive(&self, timeout: Duration) -> Option<NonNull<c_char>>;

    /// Run a synchronous request. `None` if the engine cannot parse it.
    fn execute(&self, request: &CStr) -> Option<NonNull<c_char>>;

    /// Release the engine handle.
    fn destroy(&self);
}

// SAFETY: forwards to an engine that upholds the contract.
unsafe impl<E: Engine> Engine for std::sync::Arc<E> {
    fn send(&self, request: &CStr) {
        (**self).send(request)
    }

    fn receive(&self, timeout: Duration) -> Option<NonNull<c_char>> {
        (**self).receive(timeout)
    }

    fn execute(&self, request: &CStr) -> Option<NonNull<c_char>> {
        (**self).execute(request)
    }

    fn destroy(&self) {
        (**self).destroy()
    }
}
