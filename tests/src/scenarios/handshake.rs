//! # Handshake Scenarios
//!
//! `Client::start` driving the scripted engine through authorization with
//! both strategies.

#[cfg(test)]
mod tests {
    use crate::{init_tracing, test_config};
    use anyhow::Result;
    use std::sync::Arc;
    use std::time::Instant;
    use td_client::{AuthError, AuthorizationState, BotAuthorizer, Client, ClientAuthorizer, ClientError, TdlibParameters};
    use td_engine::scripted::Login;
    use td_engine::{AuthFlow, ScriptedEngine};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn parameters() -> TdlibParameters {
        TdlibParameters {
            database_directory: "tdlib-db".into(),
            api_id: 94575,
            api_hash: "a3406de8d171bb422bb6ddf3bbd800e2".into(),
            system_language_code: "en".into(),
            device_model: "Server".into(),
            application_version: "1.0.0".into(),
            ..Default::default()
        }
    }

    fn unregistered_user() -> ScriptedEngine {
        ScriptedEngine::with_auth_flow(
            AuthFlow::new(Login::User {
                code: "12345".into(),
                registered: false,
                password: None,
            })
            .without_encryption_key(),
        )
    }

    // =============================================================================
    // INTERACTIVE STRATEGY
    // =============================================================================

    /// Parameters, phone number, code with names, then ready.
    #[tokio::test]
    async fn test_interactive_handshake_reaches_ready() -> Result<()> {
        init_tracing();
        let engine = Arc::new(unregistered_user());
        let (mut authorizer, mut handle) = ClientAuthorizer::new();
        handle.supply_parameters(parameters()).await?;

        let supplier = tokio::spawn(async move {
            let mut observed = Vec::new();
            while let Some(state) = handle.next_state().await {
                match &state {
                    AuthorizationState::WaitPhoneNumber => handle.supply_phone_number("+15551234567").await?,
                    AuthorizationState::WaitCode { is_registered: false } => {
                        handle.supply_code("12345").await?;
                        handle.supply_names("Ann", "Lee").await?;
                    }
                    _ => {}
                }
                observed.push(state);
            }
            Ok::<_, AuthError>(observed)
        });

        let started = Instant::now();
        let client = Client::builder()
            .config(test_config())
            .start(engine.clone(), &mut authorizer)
            .await?;
        assert!(started.elapsed() >= test_config().settle_delay);

        let observed = supplier.await??;
        assert_eq!(
            observed,
            vec![
                AuthorizationState::WaitTdlibParameters,
                AuthorizationState::WaitPhoneNumber,
                AuthorizationState::WaitCode { is_registered: false },
                AuthorizationState::Ready,
            ]
        );

        let sent = engine.sent();
        let phone = sent.iter().find(|r| r["@type"] == "setAuthenticationPhoneNumber").unwrap();
        assert_eq!(phone["phone_number"], "+15551234567");
        let code = sent.iter().find(|r| r["@type"] == "checkAuthenticationCode").unwrap();
        assert_eq!(code["code"], "12345");
        assert_eq!(code["first_name"], "Ann");
        assert_eq!(code["last_name"], "Lee");
        let setup = sent.iter().find(|r| r["@type"] == "setTdlibParameters").unwrap();
        assert_eq!(setup["parameters"]["api_id"], 94575);

        client.stop().await;
        Ok(())
    }

    /// A wrong code aborts the handshake and tears the client down.
    #[tokio::test]
    async fn test_rejected_code_fails_start() -> Result<()> {
        init_tracing();
        let engine = Arc::new(unregistered_user());
        let (mut authorizer, handle) = ClientAuthorizer::new();
        handle.supply_parameters(parameters()).await?;
        handle.supply_phone_number("+15551234567").await?;
        handle.supply_code("00000").await?;
        handle.supply_names("Ann", "Lee").await?;

        let err = Client::builder()
            .config(test_config())
            .start(engine.clone(), &mut authorizer)
            .await
            .unwrap_err();

        match err {
            ClientError::Authorization(auth) => assert!(matches!(
                *auth,
                AuthError::Client(ClientError::Engine { code: 400, ref message }) if message == "PHONE_CODE_INVALID"
            )),
            other => panic!("expected authorization error, got {other:?}"),
        }
        assert_eq!(engine.destroy_count(), 1);
        // Torn down without a close request.
        assert!(!engine.sent_types().contains(&"close".to_owned()));

        // The strategy was closed: suppliers now fail.
        assert!(matches!(handle.supply_code("1").await, Err(AuthError::SlotClosed("code"))));
        Ok(())
    }

    // =============================================================================
    // UNATTENDED STRATEGY
    // =============================================================================

    #[tokio::test]
    async fn test_bot_handshake_reaches_ready() -> Result<()> {
        init_tracing();
        let engine = Arc::new(ScriptedEngine::with_auth_flow(AuthFlow::bot("123456:ABC-DEF")));
        let mut authorizer = BotAuthorizer::new("123456:ABC-DEF", parameters());
        let mut states = authorizer.take_state_history().unwrap();

        let client = Client::builder()
            .config(test_config())
            .start(engine.clone(), &mut authorizer)
            .await?;

        let token = engine
            .sent()
            .into_iter()
            .find(|r| r["@type"] == "checkAuthenticationBotToken")
            .unwrap();
        assert_eq!(token["token"], "123456:ABC-DEF");
        assert!(!engine.sent_types().contains(&"setAuthenticationPhoneNumber".to_owned()));

        let mut last = None;
        while let Some(state) = states.recv().await {
            last = Some(state);
        }
        assert_eq!(last, Some(AuthorizationState::Ready));

        client.stop().await;
        Ok(())
    }

    /// The engine closing mid-handshake is reported, not treated as ready.
    #[tokio::test]
    async fn test_engine_closing_fails_start() -> Result<()> {
        init_tracing();
        let engine = ScriptedEngine::new(|request| {
            vec![td_engine::scripted::reply_to(
                request,
                serde_json::json!({"@type": "authorizationStateClosing"}),
            )]
        });
        let mut authorizer = BotAuthorizer::new("1:a", parameters());

        let err = Client::builder()
            .config(test_config())
            .start(engine, &mut authorizer)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Authorization(ref e) if matches!(**e, AuthError::Closed)));
        Ok(())
    }
}
