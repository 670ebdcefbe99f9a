//! Native call UI bridge contract
//!
//! The host platform's call UI (CallKit, ConnectionService and the like) shows
//! calls in the system interface. The coordinator tells it what is happening
//! and receives the user's actions on it as [`BridgeEvent`]s.

use crate::error::BridgeError;
use crate::session::CallId;

/// User-driven events raised by the native call UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// A call was started from the system UI (contacts, recents, ...)
    StartCallRequested { handle: String },
    /// The user answered from the system UI
    AnswerRequested { call_id: CallId },
    /// The user ended or declined from the system UI
    EndRequested { call_id: CallId },
    /// The system or the user changed the mute state
    MuteToggled { muted: bool },
    /// The system or the user changed the hold state
    HoldToggled { held: bool },
    /// A keypad digit was pressed on the system UI
    Dtmf { digit: char },
}

/// Trait defining the commands the coordinator sends to the native call UI
#[async_trait::async_trait]
pub trait CallUiBridge: Send + Sync {
    /// Register the app with the system call UI
    async fn setup(&self, app_name: &str) -> Result<(), BridgeError>;

    async fn display_incoming_call(&self, call_id: CallId, number: &str, video: bool) -> Result<(), BridgeError>;

    async fn start_call(&self, call_id: CallId, number: &str, video: bool) -> Result<(), BridgeError>;

    async fn set_current_call_active(&self, call_id: CallId) -> Result<(), BridgeError>;

    async fn end_call(&self, call_id: CallId) -> Result<(), BridgeError>;

    /// Bring the app in front of the system call UI
    async fn back_to_foreground(&self) -> Result<(), BridgeError>;
}
