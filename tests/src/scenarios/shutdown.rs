//! # Shutdown Scenarios
//!
//! Graceful stop, forced stop and dropping the last handle.

#[cfg(test)]
mod tests {
    use crate::{init_tracing, test_config};
    use anyhow::Result;
    use std::sync::Arc;
    use std::time::Duration;
    use td_client::{AuthorizationState, BotAuthorizer, Client, ClientConfig, ClientError, Event, Request, TdlibParameters};
    use td_engine::{AuthFlow, ScriptedEngine};

    const TOKEN: &str = "123456:ABC-DEF";

    async fn ready_bot(engine: Arc<ScriptedEngine>) -> Result<Client> {
        let params = TdlibParameters {
            database_directory: "tdlib-db".into(),
            api_id: 94575,
            api_hash: "a3406de8d171bb422bb6ddf3bbd800e2".into(),
            ..Default::default()
        };
        let mut authorizer = BotAuthorizer::new(TOKEN, params);
        Ok(Client::builder()
            .config(test_config())
            .start(engine, &mut authorizer)
            .await?)
    }

    async fn wait_for_destroy(engine: &ScriptedEngine) -> bool {
        for _ in 0..100 {
            if engine.destroy_count() > 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    // =============================================================================
    // GRACEFUL STOP
    // =============================================================================

    /// `close` is sent, listeners see the engine close, then their streams end.
    #[tokio::test]
    async fn test_stop_after_ready() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::with_auth_flow(AuthFlow::bot(TOKEN)));
        let client = ready_bot(engine.clone()).await?;
        let mut listener = client.listener();

        client.stop().await;
        assert!(client.is_stopped());
        assert_eq!(engine.destroy_count(), 1);
        assert_eq!(engine.sent_types().last().map(String::as_str), Some("close"));

        let mut states = Vec::new();
        while let Some(event) = listener.recv().await {
            states.extend(event.authorization_state().cloned());
        }
        assert!(states.contains(&AuthorizationState::Closing));
        Ok(())
    }

    /// Callers waiting on a reply and callers arriving late both see `Stopped`.
    #[tokio::test]
    async fn test_stop_fails_every_caller() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::new(|request| {
            if request["@type"] == "close" {
                vec![td_engine::scripted::reply_to(request, serde_json::json!({"@type": "ok"}))]
            } else {
                Vec::new()
            }
        }));
        let client = Client::builder().config(test_config()).spawn(engine.clone())?;

        let waiting: Vec<_> = (0..4)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.send(Request::new("getMe")).await })
            })
            .collect();
        while client.pending_calls() < 4 {
            tokio::task::yield_now().await;
        }

        let stopper = {
            let client = client.clone();
            tokio::spawn(async move { client.stop().await })
        };
        client.stop().await;
        stopper.await?;

        for waiter in waiting {
            assert!(matches!(waiter.await?, Err(ClientError::Stopped)));
        }
        assert!(matches!(client.send(Request::new("getMe")).await, Err(ClientError::Stopped)));
        assert_eq!(client.pending_calls(), 0);
        assert_eq!(engine.destroy_count(), 1);
        assert_eq!(engine.sent_types().iter().filter(|t| *t == "close").count(), 1);
        Ok(())
    }

    /// Destruction waits for a consumer holding the turnstile.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_waits_for_held_turnstile() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::acknowledging());
        let client = Client::builder()
            .config(ClientConfig {
                send_timeout: Duration::from_millis(100),
                ..test_config()
            })
            .spawn(engine.clone())?;

        let guard = client.lock().await;
        let stopping = {
            let client = client.clone();
            tokio::spawn(async move { client.stop().await })
        };

        // The close reply cannot be received while the turnstile is held, so
        // the close call times out and destroy queues behind the guard.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(engine.destroy_count(), 0);
        assert!(!stopping.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(2), stopping).await??;
        assert_eq!(engine.destroy_count(), 1);
        Ok(())
    }

    /// A failed `close` does not prevent destruction.
    #[tokio::test]
    async fn test_stop_survives_rejected_close() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::new(|request| {
            vec![td_engine::scripted::reply_to(
                request,
                td_engine::scripted::error_body(500, "Request aborted"),
            )]
        }));
        let client = Client::builder().config(test_config()).spawn(engine.clone())?;

        client.stop().await;
        assert!(client.is_stopped());
        assert_eq!(engine.destroy_count(), 1);
        Ok(())
    }

    // =============================================================================
    // FORCED STOP AND DROP
    // =============================================================================

    #[tokio::test]
    async fn test_force_stop_skips_close() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::acknowledging());
        let client = Client::builder().config(test_config()).spawn(engine.clone())?;
        let mut listener = client.listener();

        // SAFETY: no message is held and nothing else touches the engine.
        unsafe { client.force_stop() };

        assert_eq!(engine.destroy_count(), 1);
        assert!(engine.sent_types().is_empty());
        assert!(listener.recv().await.is_none());

        // A later graceful stop is a no-op.
        client.stop().await;
        assert_eq!(engine.destroy_count(), 1);
        Ok(())
    }

    /// Dropping every handle lets the dispatch loop exit and the engine go.
    #[tokio::test]
    async fn test_drop_destroys_engine() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::silent());
        let client = Client::builder().config(test_config()).spawn(engine.clone())?;
        let mut listener = client.listener();
        let clone = client.clone();

        drop(client);
        assert_eq!(engine.destroy_count(), 0);
        drop(clone);

        assert!(listener.recv().await.is_none());
        assert!(wait_for_destroy(&engine).await);
        assert!(engine.sent_types().is_empty());
        Ok(())
    }

    /// Events queued before the stop are still readable afterwards.
    #[tokio::test]
    async fn test_queued_events_drain_after_stop() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::acknowledging());
        let client = Client::builder().config(test_config()).spawn(engine.clone())?;
        let mut listener = client.listener();
        let mut witness = client.listener();

        for _ in 0..3 {
            engine.push_event(serde_json::json!({"@type": "ok"}));
        }
        for _ in 0..3 {
            witness.recv().await;
        }

        client.stop().await;
        let mut drained = 0;
        while let Some(event) = listener.recv().await {
            if matches!(*event, Event::Ok) {
                drained += 1;
            }
        }
        // The reply to close may or may not beat close_all.
        assert!(drained >= 3);
        Ok(())
    }
}
