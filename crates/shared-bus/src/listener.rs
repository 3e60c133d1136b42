//! # Listener
//!
//! The receive side of the registry: a bounded, ordered queue per listener.
//!
//! Pushing happens on the broadcaster's thread and may block (see
//! [`OverflowPolicy`]); popping is async. Closing is idempotent, lets the
//! reader drain what is already queued, then yields end-of-stream.

use crate::policy::OverflowPolicy;
use futures::Stream;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Errors from listener operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ListenerError {
    /// The listener was closed and its queue is drained.
    #[error("listener closed")]
    Closed,
}

/// Identity of a listener within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Outcome of pushing one event to one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Queued.
    Delivered,
    /// Queued after evicting the oldest event.
    DroppedOldest,
    /// The queue was full and the listener was closed.
    Disconnected,
    /// The listener was already closed.
    Inactive,
}

struct Queue<T> {
    items: VecDeque<Arc<T>>,
    closed: bool,
}

pub(crate) struct Shared<T> {
    id: ListenerId,
    capacity: usize,
    policy: OverflowPolicy,
    active: AtomicBool,
    queue: Mutex<Queue<T>>,
    not_full: Condvar,
    readable: Notify,
}

impl<T> Shared<T> {
    pub(crate) fn new(id: ListenerId, capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            id,
            capacity: capacity.max(1),
            policy,
            active: AtomicBool::new(true),
            queue: Mutex::new(Queue {
                items: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            not_full: Condvar::new(),
            readable: Notify::new(),
        }
    }

    pub(crate) fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Queue an event, applying the overflow policy. Blocks the calling
    /// thread under `Block` and `BlockFor`.
    pub(crate) fn push(&self, item: Arc<T>) -> Delivery {
        let mut queue = self.queue.lock();
        if queue.closed {
            return Delivery::Inactive;
        }

        let mut delivery = Delivery::Delivered;
        if queue.items.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::Block => {
                    self.not_full
                        .wait_while(&mut queue, |q| !q.closed && q.items.len() >= self.capacity);
                }
                OverflowPolicy::BlockFor(bound) => {
                    let waited = self.not_full.wait_while_for(
                        &mut queue,
                        |q| !q.closed && q.items.len() >= self.capacity,
                        bound,
                    );
                    if waited.timed_out() && !queue.closed {
                        warn!(listener = %self.id, ?bound, "Listener stalled, disconnecting");
                        self.close_locked(&mut queue);
                        return Delivery::Disconnected;
                    }
                }
                OverflowPolicy::DropOldest => {
                    queue.items.pop_front();
                    delivery = Delivery::DroppedOldest;
                }
                OverflowPolicy::Disconnect => {
                    warn!(listener = %self.id, "Listener queue full, disconnecting");
                    self.close_locked(&mut queue);
                    return Delivery::Disconnected;
                }
            }
            if queue.closed {
                return Delivery::Inactive;
            }
        }

        queue.items.push_back(item);
        drop(queue);
        self.readable.notify_one();
        delivery
    }

    pub(crate) fn close(&self) {
        let mut queue = self.queue.lock();
        self.close_locked(&mut queue);
    }

    fn close_locked(&self, queue: &mut Queue<T>) {
        if queue.closed {
            return;
        }
        queue.closed = true;
        self.active.store(false, Ordering::Release);
        self.not_full.notify_all();
        self.readable.notify_waiters();
        // A reader between checks picks this permit up on its next await.
        self.readable.notify_one();
        debug!(listener = %self.id, "Listener closed");
    }

    fn try_pop(&self) -> Result<Option<Arc<T>>, ListenerError> {
        let mut queue = self.queue.lock();
        match queue.items.pop_front() {
            Some(item) => {
                drop(queue);
                self.not_full.notify_one();
                Ok(Some(item))
            }
            None if queue.closed => Err(ListenerError::Closed),
            None => Ok(None),
        }
    }

    fn queued(&self) -> usize {
        self.queue.lock().items.len()
    }
}

/// A subscription to broadcast events.
///
/// Events arrive in broadcast order. Dropping the listener closes it; the
/// registry forgets it on its next collection pass.
pub struct Listener<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Listener<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    /// Identity within the registry.
    pub fn id(&self) -> ListenerId {
        self.shared.id
    }

    /// Whether the listener still accepts events.
    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    /// Events queued and not yet read.
    pub fn queued(&self) -> usize {
        self.shared.queued()
    }

    /// Handle that can close this listener from elsewhere.
    pub fn handle(&self) -> ListenerHandle<T> {
        ListenerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Close the listener. Already queued events can still be read.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the listener is closed and drained.
    pub async fn recv(&mut self) -> Option<Arc<T>> {
        loop {
            let mut notified = pin!(self.shared.readable.notified());
            notified.as_mut().enable();

            match self.shared.try_pop() {
                Ok(Some(item)) => return Some(item),
                Err(ListenerError::Closed) => return None,
                Ok(None) => {}
            }

            notified.await;
        }
    }

    /// Take the next event without waiting.
    ///
    /// - `Ok(Some(event))` - an event was queued
    /// - `Ok(None)` - nothing queued yet
    /// - `Err(ListenerError::Closed)` - closed and drained
    pub fn try_recv(&mut self) -> Result<Option<Arc<T>>, ListenerError> {
        self.shared.try_pop()
    }
}

impl<T: Send + Sync + 'static> Listener<T> {
    /// Turn the listener into a stream of events.
    ///
    /// The stream is lazy, keeps broadcast order and ends when the listener
    /// is closed and drained. It cannot be restarted.
    pub fn into_stream(self) -> impl Stream<Item = Arc<T>> + Send + 'static {
        futures::stream::unfold(self, |mut listener| async move {
            let item = listener.recv().await?;
            Some((item, listener))
        })
    }
}

impl<T> Drop for Listener<T> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.shared.id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Closes a listener without owning its receive side.
pub struct ListenerHandle<T> {
    pub(crate) shared: Arc<Shared<T>>,
}

impl<T> ListenerHandle<T> {
    pub fn id(&self) -> ListenerId {
        self.shared.id
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    /// Close the listener. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl<T> Clone for ListenerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for ListenerHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.shared.id)
            .field("active", &self.is_active())
            .finish()
    }
}
