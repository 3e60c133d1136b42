//! # Client Facade
//!
//! Request/reply and event subscription on top of the dispatch loop.
//!
//! ```text
//! send(request) ──► token ──► register slot ──► engine.send ──► wait(send_timeout)
//!                                                                   ▲
//! dispatch loop ── reply with matching @extra ──────────────────────┘
//!
//! listener() ──► ListenerRegistry::register ──► Listener<Event>
//! ```

use crate::auth::{self, AuthorizationStateHandler};
use crate::config::ClientConfig;
use crate::correlation::{uuid_v4_tokens, CorrelationTable, TokenGenerator};
use crate::dispatch::{DispatchTasks, Dispatcher};
use crate::error::{AuthError, ClientError, Result};
use parking_lot::Mutex;
use shared_bus::{Listener, ListenerRegistry};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use td_engine::{Engine, EngineAdapter, TurnstileGuard};
use td_types::functions::Close;
use td_types::{Event, Function, Request, Response};
use tracing::{debug, info, warn};

/// Builds a [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    tokens: TokenGenerator,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            tokens: uuid_v4_tokens(),
        }
    }

    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the UUID v4 token source.
    #[must_use]
    pub fn token_generator(mut self, tokens: TokenGenerator) -> Self {
        self.tokens = tokens;
        self
    }

    /// Start the dispatch loop without authorizing.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn(self, engine: impl Engine) -> Result<Client> {
        self.spawn_shared(Arc::new(engine))
    }

    /// Like [`spawn`](Self::spawn) for an engine the caller keeps a handle to.
    pub fn spawn_shared(self, engine: Arc<dyn Engine>) -> Result<Client> {
        self.config.validate()?;

        let inner = Arc::new(ClientInner {
            adapter: Arc::new(EngineAdapter::from_shared(engine)),
            table: Arc::new(CorrelationTable::new()),
            listeners: Arc::new(ListenerRegistry::with_policy(
                self.config.listener_capacity,
                self.config.overflow_policy,
            )),
            tokens: self.tokens,
            stop_requested: AtomicBool::new(false),
            stopping: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(None),
            config: self.config,
        });

        let tasks = Dispatcher {
            adapter: Arc::clone(&inner.adapter),
            listeners: Arc::clone(&inner.listeners),
            table: Arc::clone(&inner.table),
            stopping: Arc::clone(&inner.stopping),
            receive_timeout: inner.config.receive_timeout,
            delivery_buffer: inner.config.delivery_buffer,
        }
        .spawn();
        *inner.tasks.lock() = Some(tasks);

        debug!(config = ?inner.config, "Client started");
        Ok(Client { inner })
    }

    /// Start the dispatch loop and run the authorization handshake.
    ///
    /// If the handshake fails, or the engine shuts down before reaching
    /// `Ready`, the client is torn down and the failure returned.
    pub async fn start<H>(self, engine: impl Engine, handler: &mut H) -> Result<Client>
    where
        H: AuthorizationStateHandler + ?Sized,
    {
        let client = self.spawn(engine)?;
        let settle_delay = client.config().settle_delay;

        let outcome = match auth::authorize(&client, handler, settle_delay).await {
            Ok(state) if state.is_ready() => Ok(()),
            Ok(_) => Err(AuthError::Closed),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => Ok(client),
            Err(e) => {
                warn!(error = %e, "Authorization failed, shutting down");
                client.shutdown().await;
                Err(e.into())
            }
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct ClientInner {
    adapter: Arc<EngineAdapter>,
    table: Arc<CorrelationTable>,
    listeners: Arc<ListenerRegistry<Event>>,
    tokens: TokenGenerator,
    config: ClientConfig,
    stop_requested: AtomicBool,
    stopping: Arc<AtomicBool>,
    tasks: Mutex<Option<DispatchTasks>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // The receive loop notices within one receive timeout and lets go of
        // the adapter, which destroys the engine once idle.
        self.stopping.store(true, Ordering::Release);
        self.listeners.close_all();
        self.table.clear();
    }
}

/// Handle to a running client. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Builder with default configuration.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Send a request and wait for its reply.
    ///
    /// Any `@extra` already on the request is replaced by a fresh token. An
    /// `error` reply becomes [`ClientError::Engine`].
    pub async fn send(&self, mut request: Request) -> Result<Response> {
        if self.is_stopping() {
            return Err(ClientError::Stopped);
        }

        let token = (self.inner.tokens)();
        let slot = self.inner.table.register(token.clone(), &request.type_name)?;
        request.extra = token;
        self.inner.adapter.send(&request)?;

        let response = slot.wait(self.inner.config.send_timeout).await?;
        Ok(response.into_result()??)
    }

    /// Send a typed operation and decode its reply.
    pub async fn call<F: Function>(&self, function: &F) -> Result<F::Output> {
        let response = self.send(Request::from_function(function)?).await?;
        Ok(response.decode_reply()?)
    }

    /// Run a synchronous operation through the engine's `execute`.
    pub async fn execute<F: Function>(&self, function: &F) -> Result<F::Output> {
        if !F::SYNCHRONOUS {
            return Err(ClientError::NotSynchronous(F::TYPE));
        }
        let response = self.execute_request(&Request::from_function(function)?).await?;
        Ok(response.decode_reply()?)
    }

    /// Run a raw request through the engine's `execute`.
    pub async fn execute_request(&self, request: &Request) -> Result<Response> {
        let message = self.inner.adapter.execute(request).await?;
        let response = message.into_response()?;
        Ok(response.into_result()??)
    }

    /// Subscribe to every event received from now on.
    ///
    /// On a stopped client the listener is returned already closed.
    pub fn listener(&self) -> Listener<Event> {
        let listener = self.inner.listeners.register();
        if self.is_stopping() {
            listener.close();
        }
        listener
    }

    /// Hold the turnstile, keeping `receive`/`execute` out until dropped.
    pub async fn lock(&self) -> TurnstileGuard {
        self.inner.adapter.lock().await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Calls waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.inner.table.pending_count()
    }

    /// Registered listeners, including closed ones not yet collected.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.is_stopping() && self.inner.adapter.is_destroyed()
    }

    /// Close the engine, then destroy it once no message is outstanding.
    ///
    /// A `close` request is attempted first; its failure is logged and does
    /// not prevent destruction. Waits for the dispatch tasks, closes every
    /// listener and fails every pending call. Idempotent.
    pub async fn stop(&self) {
        if self.inner.stop_requested.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Err(e) = self.call(&Close {}).await {
            warn!(error = %e, "Close request failed, destroying anyway");
        }
        self.teardown().await;
        info!("Client stopped");
    }

    /// Destroy the engine immediately, without waiting for the turnstile.
    ///
    /// # Safety
    ///
    /// The receive loop may be inside the engine, or a consumer may still
    /// hold a message, when the handle is freed. Either can then read freed
    /// memory. Only use this when the process is about to exit anyway.
    pub unsafe fn force_stop(&self) {
        self.inner.stop_requested.store(true, Ordering::Release);
        self.inner.stopping.store(true, Ordering::Release);
        self.inner.adapter.destroy_unsynchronized();
        self.inner.listeners.close_all();
        self.inner.table.clear();
        warn!("Client force-stopped");
    }

    /// Stop without sending `close`.
    async fn shutdown(&self) {
        self.inner.stop_requested.store(true, Ordering::Release);
        self.teardown().await;
    }

    async fn teardown(&self) {
        self.inner.stopping.store(true, Ordering::Release);
        self.inner.adapter.destroy().await;
        // A broadcast blocked on a full listener returns once it is closed.
        self.inner.listeners.close_all();

        let tasks = self.inner.tasks.lock().take();
        if let Some(tasks) = tasks {
            tasks.join().await;
        }
        self.inner.table.clear();
    }

    fn is_stopping(&self) -> bool {
        self.inner.stopping.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("pending_calls", &self.pending_calls())
            .field("listeners", &self.listener_count())
            .field("stopping", &self.is_stopping())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use td_engine::scripted::{error_body, reply_to};
    use td_engine::ScriptedEngine;
    use td_types::functions::{GetAuthorizationState, GetFileMimeType};
    use td_types::{AuthorizationState, WireError};

    fn quick_config() -> ClientConfig {
        ClientConfig {
            receive_timeout: Duration::from_millis(20),
            send_timeout: Duration::from_millis(500),
            settle_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn client(engine: Arc<ScriptedEngine>) -> Client {
        Client::builder().config(quick_config()).spawn_shared(engine).unwrap()
    }

    #[tokio::test]
    async fn test_send_receives_matching_reply() {
        let engine = Arc::new(ScriptedEngine::new(|request| {
            vec![reply_to(request, json!({"@type": "authorizationStateWaitPhoneNumber"}))]
        }));
        let client = client(engine.clone());

        let state = client.call(&GetAuthorizationState {}).await.unwrap();
        assert_eq!(state, AuthorizationState::WaitPhoneNumber);
        assert_eq!(client.pending_calls(), 0);

        let sent = engine.sent();
        assert_eq!(sent[0]["@type"], "getAuthorizationState");
        assert!(!sent[0]["@extra"].as_str().unwrap().is_empty());

        client.stop().await;
    }

    #[tokio::test]
    async fn test_error_reply_is_typed() {
        let engine = Arc::new(ScriptedEngine::new(|request| {
            vec![reply_to(request, error_body(400, "PHONE_NUMBER_INVALID"))]
        }));
        let client = client(engine);

        let err = client.send(Request::new("setAuthenticationPhoneNumber")).await.unwrap_err();
        assert!(matches!(err, ClientError::Engine { code: 400, ref message } if message == "PHONE_NUMBER_INVALID"));
    }

    #[tokio::test]
    async fn test_send_timeout_leaves_no_slot() {
        let engine = Arc::new(ScriptedEngine::silent());
        let config = ClientConfig {
            send_timeout: Duration::from_millis(100),
            ..quick_config()
        };
        let client = Client::builder().config(config).spawn_shared(engine).unwrap();

        let err = client.send(Request::new("getMe")).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));
        assert_eq!(client.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_token_is_rejected() {
        let engine = Arc::new(ScriptedEngine::silent());
        let client = Client::builder()
            .config(ClientConfig {
                send_timeout: Duration::from_millis(300),
                ..quick_config()
            })
            .token_generator(Arc::new(|| "fixed".to_owned()))
            .spawn_shared(engine)
            .unwrap();

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.send(Request::new("getMe")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = client.send(Request::new("getMe")).await.unwrap_err();
        assert!(matches!(err, ClientError::DuplicateToken(_)));
        assert!(matches!(first.await.unwrap(), Err(ClientError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_execute_synchronous_operation() {
        let engine = Arc::new(ScriptedEngine::new(|request| {
            vec![reply_to(request, json!({"@type": "text", "text": "image/png"}))]
        }));
        let client = client(engine);

        let text = client
            .execute(&GetFileMimeType { file_name: "a.png".into() })
            .await
            .unwrap();
        assert_eq!(text.text, "image/png");

        let err = client.execute(&GetAuthorizationState {}).await.unwrap_err();
        assert!(matches!(err, ClientError::NotSynchronous("getAuthorizationState")));
    }

    #[tokio::test]
    async fn test_call_rejects_reply_of_wrong_type() {
        let engine = Arc::new(ScriptedEngine::new(|request| {
            vec![reply_to(request, json!({"@type": "text", "text": "x"}))]
        }));
        let client = client(engine);

        let err = client.call(&Close {}).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Decode(WireError::UnexpectedType { expected: "ok", ref actual }) if actual == "text"
        ));
    }

    #[tokio::test]
    async fn test_stop_is_graceful_and_idempotent() {
        let engine = Arc::new(ScriptedEngine::acknowledging());
        let client = client(engine.clone());
        let mut listener = client.listener();

        client.stop().await;
        client.stop().await;

        assert!(client.is_stopped());
        assert_eq!(engine.destroy_count(), 1);
        assert_eq!(engine.sent_types(), vec!["close"]);

        // Whatever was queued drains, then the stream ends.
        while listener.recv().await.is_some() {}
        assert!(matches!(client.send(Request::new("getMe")).await, Err(ClientError::Stopped)));
        assert!(!client.listener().is_active());
    }

    #[tokio::test]
    async fn test_stop_fails_pending_calls() {
        let engine = Arc::new(ScriptedEngine::new(|request| {
            if request["@type"] == "close" {
                vec![reply_to(request, json!({"@type": "ok"}))]
            } else {
                Vec::new()
            }
        }));
        let client = client(engine);

        let waiting = {
            let client = client.clone();
            tokio::spawn(async move { client.send(Request::new("getMe")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        client.stop().await;
        assert!(matches!(waiting.await.unwrap(), Err(ClientError::Stopped)));
    }

    #[tokio::test]
    async fn test_force_stop() {
        let engine = Arc::new(ScriptedEngine::silent());
        let client = client(engine.clone());
        let listener = client.listener();

        unsafe { client.force_stop() };

        assert_eq!(engine.destroy_count(), 1);
        assert!(!listener.is_active());
        assert!(matches!(client.send(Request::new("getMe")).await, Err(ClientError::Stopped)));
    }

    #[tokio::test]
    async fn test_lock_holds_off_execute() {
        let engine = Arc::new(ScriptedEngine::new(|request| {
            vec![reply_to(request, json!({"@type": "text", "text": "x"}))]
        }));
        let client = client(engine);

        let guard = client.lock().await;
        let executing = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .execute(&GetFileMimeType { file_name: "x".into() })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!executing.is_finished());

        drop(guard);
        assert!(executing.await.unwrap().is_ok());
    }
}
