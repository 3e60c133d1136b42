//! Unattended strategy for bot accounts.

use super::slot::StateHistory;
use super::AuthorizationStateHandler;
use crate::client::Client;
use crate::error::AuthError;
use async_trait::async_trait;
use td_types::functions::{CheckAuthenticationBotToken, CheckDatabaseEncryptionKey, SetTdlibParameters};
use td_types::{AuthorizationState, TdlibParameters};
use tokio::sync::mpsc;
use tracing::debug;

/// Strategy with every credential supplied up front.
///
/// The token answers both `WaitPhoneNumber` and `WaitBotToken`; code and
/// password states are ignored.
pub struct BotAuthorizer {
    token: String,
    parameters: TdlibParameters,
    history: StateHistory,
    states: Option<mpsc::Receiver<AuthorizationState>>,
    closed: bool,
}

impl BotAuthorizer {
    pub fn new(token: impl Into<String>, parameters: TdlibParameters) -> Self {
        let (history, states) = StateHistory::channel();
        Self {
            token: token.into(),
            parameters,
            history,
            states: Some(states),
            closed: false,
        }
    }

    /// Receiver of observed states. Only the first call returns it.
    pub fn take_state_history(&mut self) -> Option<mpsc::Receiver<AuthorizationState>> {
        self.states.take()
    }

    fn check_open(&self, input: &'static str) -> Result<(), AuthError> {
        if self.closed {
            return Err(AuthError::SlotClosed(input));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorizationStateHandler for BotAuthorizer {
    async fn handle(&mut self, client: &Client, state: &AuthorizationState) -> Result<(), AuthError> {
        self.history.record(state);

        match state {
            AuthorizationState::WaitTdlibParameters => {
                self.check_open("tdlib parameters")?;
                client
                    .call(&SetTdlibParameters {
                        parameters: self.parameters.clone(),
                    })
                    .await?;
            }
            AuthorizationState::WaitEncryptionKey { .. } => {
                client.call(&CheckDatabaseEncryptionKey::default()).await?;
            }
            AuthorizationState::WaitPhoneNumber | AuthorizationState::WaitBotToken => {
                self.check_open("bot token")?;
                client
                    .call(&CheckAuthenticationBotToken {
                        token: self.token.clone(),
                    })
                    .await?;
            }
            _ => debug!(state = state.type_name(), "Nothing to supply"),
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        self.history.close();
    }
}

impl std::fmt::Debug for BotAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotAuthorizer")
            .field("token", &"<redacted>")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
