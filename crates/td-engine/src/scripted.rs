//! In-process engine for tests.
//!
//! [`ScriptedEngine`] behaves like the native engine from the adapter's point
//! of view: every `receive`/`execute` overwrites the buffer returned by the
//! previous one. Replies are produced by a responder closure that sees each
//! request as JSON; unsolicited events are injected with
//! [`ScriptedEngine::push_event`].
//!
//! [`AuthFlow`] is a ready-made responder that walks the authorization states.

use crate::engine::Engine;
use parking_lot::{Condvar, Mutex};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::ffi::{c_char, CStr, CString};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use td_types::AuthorizationState;

type Responder = dyn Fn(&Value) -> Vec<Value> + Send + Sync;

#[derive(Default)]
struct Buffers {
    inbox: VecDeque<CString>,
    current: Option<CString>,
    destroyed: bool,
}

/// Scripted engine.
pub struct ScriptedEngine {
    buffers: Mutex<Buffers>,
    arrived: Condvar,
    responder: Box<Responder>,
    sent: Mutex<Vec<Value>>,
    destroyed: AtomicUsize,
}

impl ScriptedEngine {
    /// Engine whose replies to each request come from `responder`.
    ///
    /// For `send`, every returned value is queued for `receive`. For
    /// `execute`, the first value is the result and the rest are discarded;
    /// an empty reply makes `execute` report an unparsable request.
    pub fn new(responder: impl Fn(&Value) -> Vec<Value> + Send + Sync + 'static) -> Self {
        Self {
            buffers: Mutex::new(Buffers::default()),
            arrived: Condvar::new(),
            responder: Box::new(responder),
            sent: Mutex::new(Vec::new()),
            destroyed: AtomicUsize::new(0),
        }
    }

    /// Engine that never replies.
    pub fn silent() -> Self {
        Self::new(|_| Vec::new())
    }

    /// Engine that acknowledges every request with `ok`.
    pub fn acknowledging() -> Self {
        Self::new(|request| vec![reply_to(request, json!({"@type": "ok"}))])
    }

    /// Engine driven by an authorization script.
    pub fn with_auth_flow(flow: AuthFlow) -> Self {
        let engine = Self::new(move |request| flow.respond(request));
        engine.push_event(update_authorization_state(&AuthorizationState::WaitTdlibParameters));
        engine
    }

    /// Queue an unsolicited message.
    pub fn push_event(&self, event: Value) {
        self.enqueue(vec![event]);
    }

    /// Every request passed to `send`, in order.
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    /// Tags of every request passed to `send`, in order.
    pub fn sent_types(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|request| request["@type"].as_str().map(str::to_owned))
            .collect()
    }

    /// Messages queued but not yet received.
    pub fn pending_events(&self) -> usize {
        self.buffers.lock().inbox.len()
    }

    /// How many times `destroy` was called.
    pub fn destroy_count(&self) -> usize {
        self.destroyed.load(Ordering::Acquire)
    }

    fn enqueue(&self, messages: Vec<Value>) {
        if messages.is_empty() {
            return;
        }
        let mut buffers = self.buffers.lock();
        buffers.inbox.extend(messages.into_iter().filter_map(encode));
        self.arrived.notify_all();
    }
}

// SAFETY: the returned pointer targets `current`, which is only replaced by the
// next receive/execute and freed by destroy; `send` never touches it.
unsafe impl Engine for ScriptedEngine {
    fn send(&self, request: &CStr) {
        let Ok(request) = serde_json::from_slice::<Value>(request.to_bytes()) else {
            return;
        };
        let replies = (self.responder)(&request);
        self.sent.lock().push(request);
        self.enqueue(replies);
    }

    fn receive(&self, timeout: Duration) -> Option<NonNull<c_char>> {
        let mut buffers = self.buffers.lock();
        self.arrived
            .wait_while_for(&mut buffers, |b| b.inbox.is_empty() && !b.destroyed, timeout);
        if buffers.destroyed {
            return None;
        }
        let next = buffers.inbox.pop_front()?;
        let buffers = &mut *buffers;
        let current = buffers.current.insert(next);
        NonNull::new(current.as_ptr().cast_mut())
    }

    fn execute(&self, request: &CStr) -> Option<NonNull<c_char>> {
        let request = serde_json::from_slice::<Value>(request.to_bytes()).ok()?;
        let reply = encode((self.responder)(&request).into_iter().next()?)?;
        let mut buffers = self.buffers.lock();
        let current = buffers.current.insert(reply);
        NonNull::new(current.as_ptr().cast_mut())
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::AcqRel);
        let mut buffers = self.buffers.lock();
        buffers.destroyed = true;
        buffers.current = None;
        buffers.inbox.clear();
        self.arrived.notify_all();
    }
}

fn encode(value: Value) -> Option<CString> {
    CString::new(value.to_string()).ok()
}

/// Copy the request's `@extra` onto `body`.
pub fn reply_to(request: &Value, mut body: Value) -> Value {
    if let (Some(extra), Some(object)) = (request.get("@extra"), body.as_object_mut()) {
        object.insert("@extra".to_owned(), extra.clone());
    }
    body
}

/// An `error` reply body.
pub fn error_body(code: i32, message: &str) -> Value {
    json!({"@type": "error", "code": code, "message": message})
}

/// An `updateAuthorizationState` event.
pub fn update_authorization_state(state: &AuthorizationState) -> Value {
    json!({"@type": "updateAuthorizationState", "authorization_state": state})
}

/// How an [`AuthFlow`] account logs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Login {
    /// Phone number, confirmation code and optional password.
    User {
        code: String,
        registered: bool,
        password: Option<String>,
    },
    /// Bot token, accepted in the phone number state.
    Bot { token: String },
    /// Bot token, requested through its own state.
    BotTokenState { token: String },
}

/// Scripted authorization state machine.
///
/// `getAuthorizationState` answers with the current state. Each
/// authentication call valid in the current state advances it, queues an
/// `updateAuthorizationState` event and replies `ok`; wrong credentials get a
/// 400 error and calls out of order get a 400 error too. `close` walks
/// through `Closing` to `Closed`. Anything else gets `ok`.
pub struct AuthFlow {
    login: Login,
    encrypted_database: bool,
    state: Mutex<AuthorizationState>,
}

impl AuthFlow {
    /// A user account that logs in with `code`.
    pub fn user(code: impl Into<String>) -> Self {
        Self::new(Login::User {
            code: code.into(),
            registered: true,
            password: None,
        })
    }

    /// A bot account that logs in with `token`.
    pub fn bot(token: impl Into<String>) -> Self {
        Self::new(Login::Bot { token: token.into() })
    }

    /// Script an arbitrary login.
    pub fn new(login: Login) -> Self {
        Self {
            login,
            encrypted_database: true,
            state: Mutex::new(AuthorizationState::WaitTdlibParameters),
        }
    }

    /// Skip `WaitEncryptionKey` after the parameters are accepted.
    #[must_use]
    pub fn without_encryption_key(mut self) -> Self {
        self.encrypted_database = false;
        self
    }

    fn respond(&self, request: &Value) -> Vec<Value> {
        let Some(tag) = request["@type"].as_str() else {
            return vec![reply_to(request, error_body(400, "Request must have @type"))];
        };
        let field = |name: &str| request[name].as_str().unwrap_or_default().to_owned();

        let mut state = self.state.lock();
        if tag == "getAuthorizationState" {
            return vec![reply_to(request, json!(&*state))];
        }
        if tag == "close" {
            *state = AuthorizationState::Closed;
            return vec![
                update_authorization_state(&AuthorizationState::Closing),
                reply_to(request, json!({"@type": "ok"})),
                update_authorization_state(&AuthorizationState::Closed),
            ];
        }

        let next = match (tag, &*state, &self.login) {
            ("setTdlibParameters", AuthorizationState::WaitTdlibParameters, _) => {
                if self.encrypted_database {
                    Ok(AuthorizationState::WaitEncryptionKey { is_encrypted: false })
                } else {
                    Ok(self.after_key())
                }
            }
            ("checkDatabaseEncryptionKey", AuthorizationState::WaitEncryptionKey { .. }, _) => {
                Ok(self.after_key())
            }
            ("setAuthenticationPhoneNumber", AuthorizationState::WaitPhoneNumber, Login::User { registered, .. }) => {
                Ok(AuthorizationState::WaitCode { is_registered: *registered })
            }
            ("checkAuthenticationCode", AuthorizationState::WaitCode { .. }, Login::User { code, password, .. }) => {
                if field("code") != *code {
                    Err(error_body(400, "PHONE_CODE_INVALID"))
                } else if password.is_some() {
                    Ok(AuthorizationState::WaitPassword {
                        password_hint: String::new(),
                        has_recovery_email_address: false,
                        recovery_email_address_pattern: String::new(),
                    })
                } else {
                    Ok(AuthorizationState::Ready)
                }
            }
            (
                "checkAuthenticationPassword",
                AuthorizationState::WaitPassword { .. },
                Login::User { password: Some(password), .. },
            ) => {
                if field("password") == *password {
                    Ok(AuthorizationState::Ready)
                } else {
                    Err(error_body(400, "PASSWORD_HASH_INVALID"))
                }
            }
            (
                "checkAuthenticationBotToken",
                AuthorizationState::WaitPhoneNumber | AuthorizationState::WaitBotToken,
                Login::Bot { token } | Login::BotTokenState { token },
            ) => {
                if field("token") == *token {
                    Ok(AuthorizationState::Ready)
                } else {
                    Err(error_body(401, "ACCESS_TOKEN_INVALID"))
                }
            }
            (
                "setTdlibParameters"
                | "checkDatabaseEncryptionKey"
                | "setAuthenticationPhoneNumber"
                | "checkAuthenticationCode"
                | "checkAuthenticationPassword"
                | "checkAuthenticationBotToken",
                current,
                _,
            ) => Err(error_body(
                400,
                &format!("Call to {tag} unexpected in {}", current.type_name()),
            )),
            _ => return vec![reply_to(request, json!({"@type": "ok"}))],
        };

        match next {
            Ok(next) => {
                *state = next.clone();
                vec![
                    update_authorization_state(&next),
                    reply_to(request, json!({"@type": "ok"})),
                ]
            }
            Err(error) => vec![reply_to(request, error)],
        }
    }

    fn after_key(&self) -> AuthorizationState {
        match self.login {
            Login::BotTokenState { .. } => AuthorizationState::WaitBotToken,
            _ => AuthorizationState::WaitPhoneNumber,
        }
    }
}
