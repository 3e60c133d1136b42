//! # Correlation Table
//!
//! Matches replies to the callers waiting for them.
//!
//! Flow:
//! 1. `send` draws a token from the [`TokenGenerator`]
//! 2. `register()` stores a one-shot slot under the token
//! 3. the request goes out with the token in `@extra`
//! 4. the correlation task calls `complete()` with the reply
//! 5. the caller's [`PendingSlot`] resolves, or times out and removes itself
//!
//! A slot is removed exactly once: by `complete`, by its own timeout, or by
//! being dropped while still waiting.

use crate::error::ClientError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use td_types::Response;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

/// Source of correlation tokens.
pub type TokenGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Random UUID v4 tokens.
pub fn uuid_v4_tokens() -> TokenGenerator {
    Arc::new(|| Uuid::new_v4().to_string())
}

struct PendingCall {
    sender: oneshot::Sender<Response>,
    created_at: Instant,
    type_name: String,
    registration: u64,
}

/// Statistics for the correlation table
#[derive(Debug, Default)]
pub struct CorrelationStats {
    /// Total slots registered
    pub total_registered: AtomicU64,
    /// Total replies delivered to a waiter
    pub total_completed: AtomicU64,
    /// Total waits that timed out
    pub total_timeouts: AtomicU64,
    /// Total waits abandoned before a reply
    pub total_cancelled: AtomicU64,
    /// Total replies with no matching slot
    pub total_orphaned: AtomicU64,
}

/// Concurrent map from correlation token to a one-shot reply slot.
#[derive(Default)]
pub struct CorrelationTable {
    pending: DashMap<String, PendingCall>,
    next_registration: AtomicU64,
    stats: CorrelationStats,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot for `token`.
    ///
    /// Fails with [`ClientError::DuplicateToken`] if the token is already
    /// pending; the existing slot is left untouched.
    pub fn register(&self, token: String, type_name: &str) -> Result<PendingSlot<'_>, ClientError> {
        let (sender, receiver) = oneshot::channel();
        let registration = self.next_registration.fetch_add(1, Ordering::Relaxed);

        match self.pending.entry(token.clone()) {
            Entry::Occupied(_) => {
                warn!(token = %token, type_name, "Correlation token already pending");
                return Err(ClientError::DuplicateToken(token));
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingCall {
                    sender,
                    created_at: Instant::now(),
                    type_name: type_name.to_owned(),
                    registration,
                });
            }
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(token = %token, type_name, "Registered pending call");

        Ok(PendingSlot {
            table: self,
            token,
            type_name: type_name.to_owned(),
            registration,
            receiver,
        })
    }

    /// Hand `response` to the caller waiting on its token.
    ///
    /// Returns false for untagged responses, unknown tokens (the caller
    /// already gave up) and callers that went away.
    pub fn complete(&self, response: Response) -> bool {
        if response.extra.is_empty() {
            return false;
        }

        let Some((token, pending)) = self.pending.remove(&response.extra) else {
            self.stats.total_orphaned.fetch_add(1, Ordering::Relaxed);
            debug!(
                token = %response.extra,
                type_name = %response.type_name,
                "Reply for unknown or expired token"
            );
            return false;
        };

        let elapsed = pending.created_at.elapsed();
        match pending.sender.send(response) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    token = %token,
                    type_name = %pending.type_name,
                    response_time_ms = elapsed.as_millis(),
                    "Completed pending call"
                );
                true
            }
            Err(_) => {
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(token = %token, type_name = %pending.type_name, "Pending call receiver dropped");
                false
            }
        }
    }

    /// Fail every outstanding call. Waiters observe the client as stopped.
    pub fn clear(&self) {
        let outstanding = self.pending.len();
        self.pending.clear();
        if outstanding > 0 {
            debug!(outstanding, "Cleared pending calls");
        }
    }

    /// Number of calls waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a token is pending
    pub fn is_pending(&self, token: &str) -> bool {
        self.pending.contains_key(token)
    }

    /// Get statistics
    pub fn stats(&self) -> &CorrelationStats {
        &self.stats
    }

    fn remove(&self, token: &str, registration: u64) -> bool {
        self.pending
            .remove_if(token, |_, call| call.registration == registration)
            .is_some()
    }
}

impl fmt::Debug for CorrelationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationTable")
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// A registered reply slot. Removes itself from the table if dropped
/// before the reply arrives.
pub struct PendingSlot<'a> {
    table: &'a CorrelationTable,
    token: String,
    type_name: String,
    registration: u64,
    receiver: oneshot::Receiver<Response>,
}

impl PendingSlot<'_> {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Wait up to `timeout` for the reply.
    pub async fn wait(mut self, timeout: Duration) -> Result<Response, ClientError> {
        match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(response)) => Ok(response),
            // Sender dropped without a reply: the table was cleared.
            Ok(Err(_)) => Err(ClientError::Stopped),
            Err(_) => {
                if self.table.remove(&self.token, self.registration) {
                    self.table.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                }
                warn!(token = %self.token, type_name = %self.type_name, ?timeout, "Pending call timed out");
                Err(ClientError::Timeout {
                    type_name: std::mem::take(&mut self.type_name),
                    timeout,
                })
            }
        }
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if self.table.remove(&self.token, self.registration) {
            self.table.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(token = %self.token, "Pending call abandoned");
        }
    }
}

impl fmt::Debug for PendingSlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSlot")
            .field("token", &self.token)
            .field("type_name", &self.type_name)
            .finish()
    }
}
