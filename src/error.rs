//! Error types for the call-session coordinator and its collaborators

use thiserror::Error;

/// Errors reported by the signaling client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalingError {
    #[error("Call rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

/// Errors reported by the native call UI bridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Call UI setup failed: {0}")]
    Setup(String),

    #[error("Call UI command failed: {0}")]
    Command(String),
}

/// Errors reported by local media devices
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Media unavailable: {0}")]
    Unavailable(String),
}

/// Coordinator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The remote side rejected or failed the call. Surfaced to the view as `last_error`.
    #[error("Call failed: {0}")]
    SignalingFailure(String),

    /// An event arrived for a session that already ended. Never surfaced.
    #[error("Event for a session that already ended")]
    TerminationRace,

    /// Native call UI registration failed. Logged, calls keep working without it.
    #[error("Call UI setup failed: {0}")]
    BridgeSetupFailure(String),

    #[error("Phone is not ready")]
    NotReady,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No active call")]
    NoActiveSession,

    #[error("Invalid DTMF digit: {0:?}")]
    InvalidDigit(char),

    #[error("Coordinator is not running")]
    ChannelClosed,
}

impl From<SignalingError> for CallError {
    fn from(err: SignalingError) -> Self {
        match err {
            SignalingError::Rejected(cause) => CallError::SignalingFailure(cause),
            other => CallError::SignalingFailure(other.to_string()),
        }
    }
}

/// Result type for coordinator operations
pub type CallResult<T> = Result<T, CallError>;
