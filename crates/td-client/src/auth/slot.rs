//! Handoff slots and the state history queue.

use crate::error::AuthError;
use td_types::AuthorizationState;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Observed states kept for an external observer before the oldest unread
/// ones start being dropped.
pub const STATE_HISTORY_CAPACITY: usize = 10;

/// Supplier side of a handoff slot.
#[derive(Debug, Clone)]
pub struct HandoffSender<T> {
    name: &'static str,
    sender: mpsc::Sender<T>,
}

impl<T> HandoffSender<T> {
    /// Hand a value to the strategy. Waits while a previous value is unread;
    /// fails once the strategy is closed.
    pub async fn supply(&self, value: T) -> Result<(), AuthError> {
        self.sender
            .send(value)
            .await
            .map_err(|_| AuthError::SlotClosed(self.name))
    }
}

/// Strategy side of a handoff slot: one value at a time.
#[derive(Debug)]
pub(crate) struct HandoffSlot<T> {
    name: &'static str,
    receiver: mpsc::Receiver<T>,
}

impl<T> HandoffSlot<T> {
    pub(crate) fn channel(name: &'static str) -> (HandoffSender<T>, Self) {
        let (sender, receiver) = mpsc::channel(1);
        (HandoffSender { name, sender }, Self { name, receiver })
    }

    /// Wait for the supplier. Fails if the slot is closed or every supplier
    /// is gone.
    pub(crate) async fn take(&mut self) -> Result<T, AuthError> {
        self.receiver.recv().await.ok_or(AuthError::SlotClosed(self.name))
    }

    pub(crate) fn close(&mut self) {
        self.receiver.close();
    }
}

/// Forwards every observed state to an observer without ever blocking.
#[derive(Debug)]
pub(crate) struct StateHistory {
    sender: Option<mpsc::Sender<AuthorizationState>>,
}

impl StateHistory {
    pub(crate) fn channel() -> (Self, mpsc::Receiver<AuthorizationState>) {
        let (sender, receiver) = mpsc::channel(STATE_HISTORY_CAPACITY);
        (Self { sender: Some(sender) }, receiver)
    }

    pub(crate) fn record(&self, state: &AuthorizationState) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(state.clone()) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(state)) => {
                warn!(state = state.type_name(), "State history full, state dropped");
            }
        }
    }

    /// End the observer's stream once it has read what is queued.
    pub(crate) fn close(&mut self) {
        self.sender = None;
    }
}
