//! Interactive strategy: credentials arrive while the handshake runs.

use super::slot::{HandoffSender, HandoffSlot, StateHistory};
use super::AuthorizationStateHandler;
use crate::client::Client;
use crate::error::AuthError;
use async_trait::async_trait;
use td_types::functions::{
    CheckAuthenticationCode, CheckAuthenticationPassword, CheckDatabaseEncryptionKey,
    SetAuthenticationPhoneNumber, SetTdlibParameters,
};
use td_types::{AuthorizationState, TdlibParameters};
use tokio::sync::mpsc;
use tracing::debug;

/// Strategy for a user account.
///
/// Waits on a handoff slot for each credential the current state needs. The
/// matching [`AuthorizerHandle`] supplies them and observes the states.
#[derive(Debug)]
pub struct ClientAuthorizer {
    parameters: HandoffSlot<TdlibParameters>,
    phone_number: HandoffSlot<String>,
    code: HandoffSlot<String>,
    names: HandoffSlot<(String, String)>,
    password: HandoffSlot<String>,
    history: StateHistory,
}

/// Supplier side of a [`ClientAuthorizer`].
#[derive(Debug)]
pub struct AuthorizerHandle {
    parameters: HandoffSender<TdlibParameters>,
    phone_number: HandoffSender<String>,
    code: HandoffSender<String>,
    names: HandoffSender<(String, String)>,
    password: HandoffSender<String>,
    states: mpsc::Receiver<AuthorizationState>,
}

impl ClientAuthorizer {
    pub fn new() -> (Self, AuthorizerHandle) {
        let (parameters_tx, parameters) = HandoffSlot::channel("tdlib parameters");
        let (phone_number_tx, phone_number) = HandoffSlot::channel("phone number");
        let (code_tx, code) = HandoffSlot::channel("code");
        let (names_tx, names) = HandoffSlot::channel("names");
        let (password_tx, password) = HandoffSlot::channel("password");
        let (history, states) = StateHistory::channel();

        let authorizer = Self {
            parameters,
            phone_number,
            code,
            names,
            password,
            history,
        };
        let handle = AuthorizerHandle {
            parameters: parameters_tx,
            phone_number: phone_number_tx,
            code: code_tx,
            names: names_tx,
            password: password_tx,
            states,
        };
        (authorizer, handle)
    }
}

#[async_trait]
impl AuthorizationStateHandler for ClientAuthorizer {
    async fn handle(&mut self, client: &Client, state: &AuthorizationState) -> Result<(), AuthError> {
        self.history.record(state);

        match state {
            AuthorizationState::WaitTdlibParameters => {
                let parameters = self.parameters.take().await?;
                client.call(&SetTdlibParameters { parameters }).await?;
            }
            AuthorizationState::WaitEncryptionKey { .. } => {
                client.call(&CheckDatabaseEncryptionKey::default()).await?;
            }
            AuthorizationState::WaitPhoneNumber => {
                let phone_number = self.phone_number.take().await?;
                client
                    .call(&SetAuthenticationPhoneNumber {
                        phone_number,
                        allow_flash_call: false,
                        is_current_phone_number: false,
                    })
                    .await?;
            }
            AuthorizationState::WaitCode { is_registered } => {
                let code = self.code.take().await?;
                let (first_name, last_name) = if *is_registered {
                    Default::default()
                } else {
                    self.names.take().await?
                };
                client
                    .call(&CheckAuthenticationCode {
                        code,
                        first_name,
                        last_name,
                    })
                    .await?;
            }
            AuthorizationState::WaitPassword { .. } => {
                let password = self.password.take().await?;
                client.call(&CheckAuthenticationPassword { password }).await?;
            }
            AuthorizationState::WaitBotToken => {
                return Err(AuthError::UnsupportedState(state.type_name().to_owned()));
            }
            AuthorizationState::Ready
            | AuthorizationState::LoggingOut
            | AuthorizationState::Closing
            | AuthorizationState::Closed
            | AuthorizationState::Unknown => {
                debug!(state = state.type_name(), "Nothing to supply");
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.parameters.close();
        self.phone_number.close();
        self.code.close();
        self.names.close();
        self.password.close();
        self.history.close();
    }
}

impl AuthorizerHandle {
    /// Next observed state. `None` once the handshake has ended and every
    /// queued state has been read.
    pub async fn next_state(&mut self) -> Option<AuthorizationState> {
        self.states.recv().await
    }

    pub async fn supply_parameters(&self, parameters: TdlibParameters) -> Result<(), AuthError> {
        self.parameters.supply(parameters).await
    }

    pub async fn supply_phone_number(&self, phone_number: impl Into<String>) -> Result<(), AuthError> {
        self.phone_number.supply(phone_number.into()).await
    }

    pub async fn supply_code(&self, code: impl Into<String>) -> Result<(), AuthError> {
        self.code.supply(code.into()).await
    }

    /// Names for an account that is not registered yet.
    pub async fn supply_names(
        &self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Result<(), AuthError> {
        self.names.supply((first_name.into(), last_name.into())).await
    }

    pub async fn supply_password(&self, password: impl Into<String>) -> Result<(), AuthError> {
        self.password.supply(password.into()).await
    }
}
