//! # Fan-out Scenarios
//!
//! Events from the engine reaching every listener, in order, with
//! independent lifecycles.

#[cfg(test)]
mod tests {
    use crate::{init_tracing, test_config};
    use anyhow::Result;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use td_client::{Client, ClientConfig, Event, OverflowPolicy};
    use td_engine::ScriptedEngine;
    use td_types::{OptionValue, UpdateOption};

    fn option_event(i: i64) -> serde_json::Value {
        json!({"@type": "updateOption", "name": "seq",
            "value": {"@type": "optionValueInteger", "value": i.to_string()}})
    }

    fn sequence(event: &Event) -> Option<i64> {
        match event {
            Event::UpdateOption(UpdateOption {
                value: OptionValue::Integer { value },
                ..
            }) => Some(*value),
            _ => None,
        }
    }

    /// N listeners by M events: everyone sees everything, in order.
    #[tokio::test]
    async fn test_every_listener_sees_every_event_in_order() -> Result<()> {
        init_tracing();
        const LISTENERS: usize = 8;
        const EVENTS: i64 = 200;

        let engine = Arc::new(ScriptedEngine::silent());
        let client = Client::builder().config(test_config()).spawn(engine.clone())?;

        let readers: Vec<_> = (0..LISTENERS)
            .map(|_| {
                let stream = client.listener().into_stream();
                tokio::spawn(async move {
                    stream
                        .filter_map(|event| async move { sequence(&event) })
                        .take(EVENTS as usize)
                        .collect::<Vec<_>>()
                        .await
                })
            })
            .collect();

        for i in 0..EVENTS {
            engine.push_event(option_event(i));
        }

        let expected: Vec<i64> = (0..EVENTS).collect();
        for reader in readers {
            let seen = tokio::time::timeout(Duration::from_secs(5), reader).await??;
            assert_eq!(seen, expected);
        }

        client.stop().await;
        Ok(())
    }

    /// A listener closed part-way sees nothing broadcast after the close.
    #[tokio::test]
    async fn test_closed_listener_sees_no_later_events() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::silent());
        let client = Client::builder().config(test_config()).spawn(engine.clone())?;

        let mut early = client.listener();
        let mut witness = client.listener();

        engine.push_event(option_event(1));
        assert_eq!(witness.recv().await.as_deref().and_then(sequence), Some(1));

        early.close();
        engine.push_event(option_event(2));
        assert_eq!(witness.recv().await.as_deref().and_then(sequence), Some(2));

        assert_eq!(early.recv().await.as_deref().and_then(sequence), Some(1));
        assert!(early.recv().await.is_none());

        client.stop().await;
        Ok(())
    }

    /// Listeners registered late only see what comes after.
    #[tokio::test]
    async fn test_late_listener_starts_from_now() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::silent());
        let client = Client::builder().config(test_config()).spawn(engine.clone())?;

        let mut first = client.listener();
        engine.push_event(option_event(1));
        first.recv().await;

        let mut late = client.listener();
        engine.push_event(option_event(2));
        assert_eq!(late.recv().await.as_deref().and_then(sequence), Some(2));

        client.stop().await;
        Ok(())
    }

    /// Closing a listener while the broadcaster is blocked on it is safe and
    /// unblocks the loop for everyone else.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_during_blocked_broadcast() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::silent());
        let client = Client::builder()
            .config(ClientConfig {
                listener_capacity: 1,
                overflow_policy: OverflowPolicy::Block,
                ..test_config()
            })
            .spawn(engine.clone())?;

        let stalled = client.listener();
        let stalled_handle = stalled.handle();
        let mut healthy = client.listener();

        for i in 0..3 {
            engine.push_event(option_event(i));
        }
        assert_eq!(healthy.recv().await.as_deref().and_then(sequence), Some(0));

        // The loop is now stuck pushing event 1 into the stalled listener.
        let closers: Vec<_> = (0..4)
            .map(|_| {
                let handle = stalled_handle.clone();
                tokio::spawn(async move { handle.close() })
            })
            .collect();
        for closer in closers {
            closer.await?;
        }

        assert_eq!(healthy.recv().await.as_deref().and_then(sequence), Some(1));
        assert_eq!(healthy.recv().await.as_deref().and_then(sequence), Some(2));
        assert!(!stalled.is_active());

        client.stop().await;
        Ok(())
    }

    /// A lossy listener keeps the newest events and never stalls the loop.
    #[tokio::test]
    async fn test_drop_oldest_listener_never_blocks() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::silent());
        let client = Client::builder()
            .config(ClientConfig {
                listener_capacity: 4,
                overflow_policy: OverflowPolicy::DropOldest,
                ..test_config()
            })
            .spawn(engine.clone())?;

        let mut lossy = client.listener();
        let mut reader = client.listener();
        for i in 0..20 {
            engine.push_event(option_event(i));
        }
        // Reading one listener fully means the loop got past every event.
        let mut last = None;
        while last != Some(19) {
            last = reader.recv().await.as_deref().and_then(sequence);
        }

        let mut kept = Vec::new();
        while let Ok(Some(event)) = lossy.try_recv() {
            kept.extend(sequence(&event));
        }
        assert_eq!(kept, vec![16, 17, 18, 19]);

        client.stop().await;
        Ok(())
    }
}
