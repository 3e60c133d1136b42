//! Binding to the native `td_json_client_*` interface.

use crate::engine::Engine;
use std::ffi::{c_char, c_double, c_void, CStr};
use std::ptr::NonNull;
use std::time::Duration;
use tracing::debug;

#[link(name = "tdjson")]
extern "C" {
    fn td_json_client_create() -> *mut c_void;
    fn td_json_client_send(client: *mut c_void, request: *const c_char);
    fn td_json_client_receive(client: *mut c_void, timeout: c_double) -> *const c_char;
    fn td_json_client_execute(client: *mut c_void, request: *const c_char) -> *const c_char;
    fn td_json_client_destroy(client: *mut c_void);
}

/// A native JSON engine handle.
#[derive(Debug)]
pub struct TdJson {
    client: NonNull<c_void>,
}

// SAFETY: the native client accepts `send` from any thread; `receive`,
// `execute` and `destroy` are serialized by the adapter's turnstile.
unsafe impl Send for TdJson {}
unsafe impl Sync for TdJson {}

impl TdJson {
    /// Create a native client. `None` if the library could not allocate one.
    pub fn create() -> Option<Self> {
        // SAFETY: no preconditions.
        let client = NonNull::new(unsafe { td_json_client_create() })?;
        debug!("Native engine created");
        Some(Self { client })
    }
}

// SAFETY: the native library documents exactly the contract `Engine` requires.
unsafe impl Engine for TdJson {
    fn send(&self, request: &CStr) {
        // SAFETY: valid handle, NUL-terminated request copied by the callee.
        unsafe { td_json_client_send(self.client.as_ptr(), request.as_ptr()) }
    }

    fn receive(&self, timeout: Duration) -> Option<NonNull<c_char>> {
        // SAFETY: valid handle; the result is owned by the native client.
        let result = unsafe { td_json_client_receive(self.client.as_ptr(), timeout.as_secs_f64()) };
        NonNull::new(result.cast_mut())
    }

    fn execute(&self, request: &CStr) -> Option<NonNull<c_char>> {
        // SAFETY: as for `receive`.
        let result = unsafe { td_json_client_execute(self.client.as_ptr(), request.as_ptr()) };
        NonNull::new(result.cast_mut())
    }

    fn destroy(&self) {
        // SAFETY: the adapter calls this at most once.
        unsafe { td_json_client_destroy(self.client.as_ptr()) }
    }
}
