//! # Listener Registry
//!
//! Fan-out of events to independently-lifecycled listeners.
//!
//! ```text
//!                  ┌────────────────────┐
//!  broadcast() ──► │ ListenerRegistry   │ ──► Listener 1 queue ──► recv()
//!                  │  snapshot, push    │ ──► Listener 2 queue ──► recv()
//!                  └────────────────────┘ ──► Listener 3 (closed, skipped)
//!                            │
//!                       collect() drops closed listeners
//! ```
//!
//! The list lock is held only to register, snapshot and collect; pushes
//! happen on the snapshot with the lock released.

use crate::listener::{Delivery, Listener, ListenerHandle, ListenerId, Shared};
use crate::policy::OverflowPolicy;
use crate::DEFAULT_LISTENER_CAPACITY;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Per-broadcast delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Listeners that queued the event.
    pub delivered: usize,
    /// Of those, listeners that evicted an older event to make room.
    pub dropped_oldest: usize,
    /// Listeners disconnected by this broadcast because they were full.
    pub disconnected: usize,
    /// Listeners already closed when the broadcast reached them.
    pub inactive: usize,
}

impl BroadcastReport {
    /// Whether the registry holds closed listeners worth collecting.
    pub fn needs_collection(&self) -> bool {
        self.disconnected > 0 || self.inactive > 0
    }
}

/// Registry of listeners for events of type `T`.
pub struct ListenerRegistry<T> {
    listeners: Mutex<Vec<Arc<Shared<T>>>>,
    next_id: AtomicU64,
    capacity: usize,
    policy: OverflowPolicy,
    events_broadcast: AtomicU64,
}

impl<T: Send + Sync + 'static> ListenerRegistry<T> {
    /// Registry with the default queue capacity and policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(DEFAULT_LISTENER_CAPACITY, OverflowPolicy::default())
    }

    /// Registry whose listeners get `capacity` slots and `policy`.
    #[must_use]
    pub fn with_policy(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            capacity,
            policy,
            events_broadcast: AtomicU64::new(0),
        }
    }

    /// Register a listener with the registry defaults.
    pub fn register(&self) -> Listener<T> {
        self.register_with(self.capacity, self.policy)
    }

    /// Register a listener with its own capacity and policy.
    pub fn register_with(&self, capacity: usize, policy: OverflowPolicy) -> Listener<T> {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::new(Shared::new(id, capacity, policy));
        self.listeners.lock().push(Arc::clone(&shared));

        debug!(listener = %id, capacity, %policy, "Listener registered");
        Listener::new(shared)
    }

    /// Copy of the current list, closed listeners included.
    pub fn snapshot(&self) -> Vec<ListenerHandle<T>> {
        self.listeners
            .lock()
            .iter()
            .map(|shared| ListenerHandle {
                shared: Arc::clone(shared),
            })
            .collect()
    }

    /// Deliver `event` to every active listener, in registration order.
    ///
    /// May block the calling thread when a listener is full and its policy is
    /// `Block` or `BlockFor`; call it from a blocking context.
    pub fn broadcast(&self, event: T) -> BroadcastReport {
        let event = Arc::new(event);
        let listeners = self.listeners.lock().clone();
        self.events_broadcast.fetch_add(1, Ordering::Relaxed);

        let mut report = BroadcastReport::default();
        for listener in &listeners {
            match listener.push(Arc::clone(&event)) {
                Delivery::Delivered => report.delivered += 1,
                Delivery::DroppedOldest => {
                    report.delivered += 1;
                    report.dropped_oldest += 1;
                }
                Delivery::Disconnected => report.disconnected += 1,
                Delivery::Inactive => report.inactive += 1,
            }
        }
        report
    }

    /// Close a listener. Idempotent; it stays registered until collected.
    pub fn close(&self, listener: &ListenerHandle<T>) {
        listener.close();
    }

    /// Drop closed listeners. Returns how many were removed.
    pub fn collect(&self) -> usize {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|listener| listener.is_active());
        let removed = before - listeners.len();
        drop(listeners);

        if removed > 0 {
            debug!(removed, "Collected closed listeners");
        }
        removed
    }

    /// Close every listener and forget them.
    pub fn close_all(&self) {
        let listeners = std::mem::take(&mut *self.listeners.lock());
        for listener in &listeners {
            listener.close();
        }
        debug!(closed = listeners.len(), "All listeners closed");
    }

    /// Registered listeners, closed ones included until collected.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered listeners still accepting events.
    pub fn active_count(&self) -> usize {
        self.listeners.lock().iter().filter(|l| l.is_active()).count()
    }

    /// Total events broadcast.
    pub fn events_broadcast(&self) -> u64 {
        self.events_broadcast.load(Ordering::Relaxed)
    }
}

impl<T: Send + Sync + 'static> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ListenerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.lock().len())
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .finish()
    }
}
