//! # Correlation Scenarios
//!
//! Replies reaching exactly the caller that asked, under timeouts and
//! concurrency.

#[cfg(test)]
mod tests {
    use crate::{init_tracing, test_config};
    use anyhow::Result;
    use futures::future::join_all;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use td_client::{Client, ClientConfig, ClientError, Event, Request};
    use td_engine::scripted::reply_to;
    use td_engine::ScriptedEngine;

    /// Answers `echo` with the request's `value`.
    fn echo_engine() -> ScriptedEngine {
        ScriptedEngine::new(|request| {
            vec![reply_to(
                request,
                json!({"@type": "text", "text": request["value"].as_str().unwrap_or_default()}),
            )]
        })
    }

    #[tokio::test]
    async fn test_timeout_leaves_no_slot() -> Result<()> {
        init_tracing();
        let client = Client::builder()
            .config(ClientConfig {
                send_timeout: Duration::from_millis(100),
                ..test_config()
            })
            .spawn(ScriptedEngine::silent())?;

        let started = std::time::Instant::now();
        let err = client.send(Request::new("getMe")).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { ref type_name, .. } if type_name == "getMe"));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(500), "timed out after {elapsed:?}");
        assert_eq!(client.pending_calls(), 0);

        client.stop().await;
        Ok(())
    }

    /// A reply arriving after the caller gave up goes to listeners only.
    #[tokio::test]
    async fn test_late_reply_is_discarded() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::silent());
        let client = Client::builder()
            .config(ClientConfig {
                send_timeout: Duration::from_millis(50),
                ..test_config()
            })
            .spawn(engine.clone())?;
        let mut listener = client.listener();

        assert!(client.send(Request::new("getMe")).await.is_err());
        let token = engine.sent()[0]["@extra"].as_str().unwrap().to_owned();

        engine.push_event(json!({"@type": "ok", "@extra": token}));
        let event = tokio::time::timeout(Duration::from_secs(1), listener.recv()).await?;
        assert_eq!(event.as_deref(), Some(&Event::Ok));
        assert_eq!(client.pending_calls(), 0);

        // The loop is still healthy.
        engine.push_event(json!({"@type": "updateOption", "name": "x",
            "value": {"@type": "optionValueEmpty"}}));
        let event = tokio::time::timeout(Duration::from_secs(1), listener.recv()).await?;
        assert_eq!(event.map(|e| e.type_name().to_owned()).as_deref(), Some("updateOption"));

        client.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_callers_get_their_own_replies() -> Result<()> {
        init_tracing();
        let client = Client::builder().config(test_config()).spawn(echo_engine())?;

        let calls = (0..64).map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let request = Request::new("echo").with_field("value", format!("caller-{i}"));
                let response = client.send(request).await?;
                Ok::<_, ClientError>((i, response.decode::<td_types::Text>()?.text))
            })
        });

        for result in join_all(calls).await {
            let (i, text) = result??;
            assert_eq!(text, format!("caller-{i}"));
        }
        assert_eq!(client.pending_calls(), 0);

        client.stop().await;
        Ok(())
    }

    /// A caller that stops waiting frees its slot.
    #[tokio::test]
    async fn test_abandoned_call_frees_slot() -> Result<()> {
        init_tracing();
        let client = Client::builder().config(test_config()).spawn(ScriptedEngine::silent())?;

        let call = {
            let client = client.clone();
            tokio::spawn(async move { client.send(Request::new("getMe")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.pending_calls(), 1);

        call.abort();
        let _ = call.await;
        assert_eq!(client.pending_calls(), 0);
        Ok(())
    }
}
