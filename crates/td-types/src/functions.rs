//! Typed operations.
//!
//! Each operation is a struct whose fields are the request payload. The
//! [`Function`] trait ties it to its wire tag and reply type. Only the
//! operations the client itself drives live here; the rest of the API surface
//! is generated from the engine schema and implements the same trait.

use crate::authorization::{AuthorizationState, TdlibParameters};
use crate::event::Text;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A typed engine operation.
pub trait Function: Serialize + Send + Sync {
    /// Wire tag of the request.
    const TYPE: &'static str;

    /// Whether the engine accepts this operation through `execute`.
    const SYNCHRONOUS: bool = false;

    /// Decoded reply.
    type Output: Reply;
}

/// A type a reply decodes into.
pub trait Reply: DeserializeOwned + Send {
    /// Wire tag of the reply, or the shared prefix of a family of tags.
    const TYPE: &'static str;

    /// Whether a reply tagged `type_name` decodes into this type.
    fn accepts(type_name: &str) -> bool {
        type_name == Self::TYPE
    }
}

/// Empty success reply (`ok`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OkResponse {}

impl Reply for OkResponse {
    const TYPE: &'static str = "ok";
}

impl Reply for Text {
    const TYPE: &'static str = "text";
}

impl Reply for AuthorizationState {
    const TYPE: &'static str = "authorizationState";

    fn accepts(type_name: &str) -> bool {
        type_name.starts_with(Self::TYPE)
    }
}

/// Returns the current authorization state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetAuthorizationState {}

impl Function for GetAuthorizationState {
    const TYPE: &'static str = "getAuthorizationState";
    type Output = AuthorizationState;
}

/// Sets the engine bootstrap parameters.
#[derive(Debug, Clone, Serialize)]
pub struct SetTdlibParameters {
    pub parameters: TdlibParameters,
}

impl Function for SetTdlibParameters {
    const TYPE: &'static str = "setTdlibParameters";
    type Output = OkResponse;
}

/// Checks the database encryption key. An empty key opens an unencrypted database.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckDatabaseEncryptionKey {
    pub encryption_key: String,
}

impl Function for CheckDatabaseEncryptionKey {
    const TYPE: &'static str = "checkDatabaseEncryptionKey";
    type Output = OkResponse;
}

/// Sends the user's phone number.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SetAuthenticationPhoneNumber {
    pub phone_number: String,
    pub allow_flash_call: bool,
    pub is_current_phone_number: bool,
}

impl Function for SetAuthenticationPhoneNumber {
    const TYPE: &'static str = "setAuthenticationPhoneNumber";
    type Output = OkResponse;
}

/// Checks the confirmation code. Names are only used for unregistered accounts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckAuthenticationCode {
    pub code: String,
    pub first_name: String,
    pub last_name: String,
}

impl Function for CheckAuthenticationCode {
    const TYPE: &'static str = "checkAuthenticationCode";
    type Output = OkResponse;
}

/// Checks the two-factor password.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckAuthenticationPassword {
    pub password: String,
}

impl Function for CheckAuthenticationPassword {
    const TYPE: &'static str = "checkAuthenticationPassword";
    type Output = OkResponse;
}

/// Authorizes a bot account with its token.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckAuthenticationBotToken {
    pub token: String,
}

impl Function for CheckAuthenticationBotToken {
    const TYPE: &'static str = "checkAuthenticationBotToken";
    type Output = OkResponse;
}

/// Closes the engine. Ends with `authorizationStateClosed`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Close {}

impl Function for Close {
    const TYPE: &'static str = "close";
    type Output = OkResponse;
}

/// Returns the MIME type for a file name. Executable synchronously.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetFileMimeType {
    pub file_name: String,
}

impl Function for GetFileMimeType {
    const TYPE: &'static str = "getFileMimeType";
    const SYNCHRONOUS: bool = true;
    type Output = Text;
}
