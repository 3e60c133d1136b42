//! # Dispatch Loop
//!
//! Two background tasks:
//!
//! ```text
//! [blocking thread]                                   [async task]
//! receive ──► copy ──► release turnstile ──► tagged? ──► deliveries ──► CorrelationTable::complete
//!                                      │
//!                                      └──► parse Event ──► ListenerRegistry::broadcast ──► collect?
//! ```
//!
//! The receive side runs on a blocking thread because both the engine call
//! and a full listener under the `Block` policy block the thread.

use crate::correlation::CorrelationTable;
use shared_bus::ListenerRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use td_engine::{EngineAdapter, EngineError};
use td_types::{Event, Response};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Everything the receive loop needs.
pub(crate) struct Dispatcher {
    pub adapter: Arc<EngineAdapter>,
    pub listeners: Arc<ListenerRegistry<Event>>,
    pub table: Arc<CorrelationTable>,
    pub stopping: Arc<AtomicBool>,
    pub receive_timeout: Duration,
    pub delivery_buffer: usize,
}

/// Handles to the running dispatch tasks.
pub(crate) struct DispatchTasks {
    receive: JoinHandle<()>,
    correlation: JoinHandle<()>,
}

impl DispatchTasks {
    /// Wait for both tasks to finish.
    pub async fn join(self) {
        if let Err(e) = self.receive.await {
            warn!(error = %e, "Receive loop ended abnormally");
        }
        if let Err(e) = self.correlation.await {
            warn!(error = %e, "Correlation task ended abnormally");
        }
    }
}

impl Dispatcher {
    /// Start the receive loop and the correlation task on the current runtime.
    pub fn spawn(self) -> DispatchTasks {
        let (deliveries, inbox) = mpsc::channel(self.delivery_buffer);

        let correlation = tokio::spawn(correlate(inbox, Arc::clone(&self.table)));
        let receive = tokio::task::spawn_blocking(move || self.receive_loop(deliveries));

        DispatchTasks { receive, correlation }
    }

    fn receive_loop(self, deliveries: mpsc::Sender<Response>) {
        debug!(receive_timeout = ?self.receive_timeout, "Receive loop started");

        while !self.stopping.load(Ordering::Acquire) {
            let message = match self.adapter.receive(self.receive_timeout) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(EngineError::Destroyed) => break,
                Err(e) => {
                    warn!(error = %e, "Receive failed");
                    continue;
                }
            };

            // Copying out and dropping the message releases the turnstile.
            let response = match message.into_response() {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "Malformed message dropped");
                    continue;
                }
            };
            trace!(type_name = %response.type_name, extra = %response.extra, "Message received");

            if response.is_reply() && deliveries.blocking_send(response.clone()).is_err() {
                debug!("Correlation task gone, stopping receive loop");
                break;
            }

            self.broadcast(&response);
        }

        debug!("Receive loop stopped");
    }

    fn broadcast(&self, response: &Response) {
        let event = match Event::from_slice(&response.data) {
            Ok(event) => event,
            Err(e) => {
                warn!(type_name = %response.type_name, error = %e, "Unparsable event dropped");
                return;
            }
        };

        let report = self.listeners.broadcast(event);
        if report.needs_collection() {
            self.listeners.collect();
        }
    }
}

async fn correlate(mut inbox: mpsc::Receiver<Response>, table: Arc<CorrelationTable>) {
    while let Some(response) = inbox.recv().await {
        table.complete(response);
    }
    debug!("Correlation task stopped");
}
