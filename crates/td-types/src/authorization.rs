//! Authorization states and bootstrap parameters.

use serde::{Deserialize, Serialize};

/// Where the engine is in its bootstrap sequence.
///
/// Produced by `getAuthorizationState` and by `updateAuthorizationState`
/// events. Tags this build does not know decode to [`AuthorizationState::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum AuthorizationState {
    /// Bootstrap parameters are required.
    #[serde(rename = "authorizationStateWaitTdlibParameters")]
    WaitTdlibParameters,

    /// The database encryption key is required.
    #[serde(rename = "authorizationStateWaitEncryptionKey")]
    WaitEncryptionKey {
        #[serde(default)]
        is_encrypted: bool,
    },

    /// A phone number (or a bot token) is required.
    #[serde(rename = "authorizationStateWaitPhoneNumber")]
    WaitPhoneNumber,

    /// The confirmation code is required. Unregistered accounts also need a name.
    #[serde(rename = "authorizationStateWaitCode")]
    WaitCode {
        #[serde(default)]
        is_registered: bool,
    },

    /// The two-factor password is required.
    #[serde(rename = "authorizationStateWaitPassword")]
    WaitPassword {
        #[serde(default)]
        password_hint: String,
        #[serde(default)]
        has_recovery_email_address: bool,
        #[serde(default)]
        recovery_email_address_pattern: String,
    },

    /// A bot token is required.
    #[serde(rename = "authorizationStateWaitBotToken")]
    WaitBotToken,

    /// Authorized; general traffic is meaningful.
    #[serde(rename = "authorizationStateReady")]
    Ready,

    /// The session is logging out.
    #[serde(rename = "authorizationStateLoggingOut")]
    LoggingOut,

    /// The engine is closing.
    #[serde(rename = "authorizationStateClosing")]
    Closing,

    /// The engine is closed; the handle must be destroyed.
    #[serde(rename = "authorizationStateClosed")]
    Closed,

    /// A state this build does not understand.
    #[serde(other)]
    Unknown,
}

impl AuthorizationState {
    /// Wire tag of this state.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::WaitTdlibParameters => "authorizationStateWaitTdlibParameters",
            Self::WaitEncryptionKey { .. } => "authorizationStateWaitEncryptionKey",
            Self::WaitPhoneNumber => "authorizationStateWaitPhoneNumber",
            Self::WaitCode { .. } => "authorizationStateWaitCode",
            Self::WaitPassword { .. } => "authorizationStateWaitPassword",
            Self::WaitBotToken => "authorizationStateWaitBotToken",
            Self::Ready => "authorizationStateReady",
            Self::LoggingOut => "authorizationStateLoggingOut",
            Self::Closing => "authorizationStateClosing",
            Self::Closed => "authorizationStateClosed",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the handshake has completed.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether the engine is shutting down and will not become ready.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LoggingOut | Self::Closing | Self::Closed)
    }
}

/// Engine bootstrap configuration sent in reply to
/// [`AuthorizationState::WaitTdlibParameters`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "@type", rename = "tdlibParameters")]
pub struct TdlibParameters {
    /// Use the test data centers.
    pub use_test_dc: bool,
    /// Directory for the persistent database.
    pub database_directory: String,
    /// Directory for downloaded files.
    pub files_directory: String,
    /// Persist information about downloaded and uploaded files.
    pub use_file_database: bool,
    /// Persist user, basic group, supergroup and channel info.
    pub use_chat_info_database: bool,
    /// Persist chats and messages.
    pub use_message_database: bool,
    /// Enable secret chats.
    pub use_secret_chats: bool,
    /// Application identifier.
    pub api_id: i32,
    /// Application hash.
    pub api_hash: String,
    /// IETF language tag of the user's OS.
    pub system_language_code: String,
    /// Device model.
    pub device_model: String,
    /// OS version.
    pub system_version: String,
    /// Application version.
    pub application_version: String,
    /// Let the engine drop old files automatically.
    pub enable_storage_optimizer: bool,
    /// Ignore original file names on download.
    pub ignore_file_names: bool,
}
