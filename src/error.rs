//! Error types for the lobby keeper
//!
//! Glue code uses `anyhow` for propagation; the failure kinds that callers
//! branch on are spelled out in [`LobbyError`].

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Failure kinds of lobby creation and reconciliation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// No matching confirmation arrived within the bound
    #[error("Timed out waiting for lobby '{title}' to be created")]
    Timeout { title: String },

    /// The room was created but joining its channel failed
    #[error("Failed to join {channel}: {reason}")]
    JoinFailure { channel: String, reason: String },

    #[error("Lobby registry unavailable: {reason}")]
    RegistryUnavailable { reason: String },

    /// The lobby exists and is joined but is not tracked anywhere
    #[error("Failed to initialize lobby {lobby_id}: {reason}")]
    InitializationFailure { lobby_id: u64, reason: String },

    #[error("A creation for '{title}' is already in flight")]
    AlreadyPending { title: String },

    #[error("Chat transport error: {message}")]
    ChatTransport { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl LobbyError {
    /// Short label used for log fields and metric outcomes
    pub fn kind(&self) -> &'static str {
        match self {
            LobbyError::Timeout { .. } => "timeout",
            LobbyError::JoinFailure { .. } => "join_failure",
            LobbyError::RegistryUnavailable { .. } => "registry_unavailable",
            LobbyError::InitializationFailure { .. } => "initialization_failure",
            LobbyError::AlreadyPending { .. } => "already_pending",
            LobbyError::ChatTransport { .. } => "send_failure",
            LobbyError::ConfigurationError { .. } => "configuration_error",
            LobbyError::InternalError { .. } => "internal_error",
        }
    }
}
