//! # Authorization Handshake
//!
//! Drives the engine through its bootstrap states before general traffic:
//!
//! ```text
//! ┌─► getAuthorizationState ──► handler.handle(state) ──┬─ Ready ──► settle ──► done
//! │                                                     ├─ LoggingOut / Closing / Closed ──► done
//! └─────────────────────────────────────────────────────┘ otherwise
//! ```
//!
//! A state that comes back unchanged has already been answered; the loop
//! waits `auth_retry_delay` and queries again without calling the handler.
//!
//! Two strategies implement [`AuthorizationStateHandler`]:
//!
//! - [`ClientAuthorizer`]: credentials supplied at runtime through an
//!   [`AuthorizerHandle`], e.g. by [`terminal::prompt_loop`]
//! - [`BotAuthorizer`]: a bot token supplied up front

pub mod bot;
pub mod interactive;
pub mod slot;
pub mod terminal;

pub use bot::BotAuthorizer;
pub use interactive::{AuthorizerHandle, ClientAuthorizer};
pub use slot::{HandoffSender, STATE_HISTORY_CAPACITY};

use crate::client::Client;
use crate::error::AuthError;
use async_trait::async_trait;
use std::time::Duration;
use td_types::functions::GetAuthorizationState;
use td_types::AuthorizationState;
use tracing::{debug, info, trace};

/// A strategy for answering authorization states.
#[async_trait]
pub trait AuthorizationStateHandler: Send {
    /// Answer one observed state, usually with a single request.
    async fn handle(&mut self, client: &Client, state: &AuthorizationState) -> Result<(), AuthError>;

    /// Release handoff slots and end the state history. Called once when the
    /// handshake ends, whatever the outcome.
    fn close(&mut self);
}

/// Run the handshake to completion.
///
/// Returns the final state: `Ready`, or the shutdown state the engine moved
/// to. Any error from `handler` aborts the handshake.
pub async fn authorize<H>(
    client: &Client,
    handler: &mut H,
    settle_delay: Duration,
) -> Result<AuthorizationState, AuthError>
where
    H: AuthorizationStateHandler + ?Sized,
{
    let result = run(client, handler, settle_delay).await;
    handler.close();
    result
}

async fn run<H>(client: &Client, handler: &mut H, settle_delay: Duration) -> Result<AuthorizationState, AuthError>
where
    H: AuthorizationStateHandler + ?Sized,
{
    let retry_delay = client.config().auth_retry_delay;
    let mut answered: Option<AuthorizationState> = None;

    loop {
        let state = client.call(&GetAuthorizationState {}).await?;
        if answered.as_ref() == Some(&state) {
            trace!(state = state.type_name(), "Authorization state unchanged");
            tokio::time::sleep(retry_delay).await;
            continue;
        }
        debug!(state = state.type_name(), "Authorization state");

        handler.handle(client, &state).await?;

        if state.is_ready() {
            // Lets the engine flush its database after login.
            tokio::time::sleep(settle_delay).await;
            info!("Authorized");
            return Ok(state);
        }
        if state.is_terminal() {
            info!(state = state.type_name(), "Engine shut down during authorization");
            return Ok(state);
        }
        answered = Some(state);
    }
}
