//! Signaling client contract
//!
//! The signaling client (SIP/WebRTC stack) places and receives calls and
//! negotiates media. The coordinator drives it through [`SignalingClient`] and
//! observes it through [`SignalingEvent`]s delivered on the coordinator channel.

use serde::{Deserialize, Serialize};

use crate::config::MediaOptions;
use crate::error::SignalingError;
use crate::media::StreamHandle;

/// Signaling client's identifier for one call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events emitted by the signaling client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    /// A remote party is calling
    Incoming {
        session: SessionHandle,
        peer_number: String,
        video: bool,
    },
    /// The call was accepted by both sides; video calls carry their streams
    Accepted {
        session: SessionHandle,
        local_stream: Option<StreamHandle>,
        remote_stream: Option<StreamHandle>,
    },
    /// The remote party hung up
    Ended { session: SessionHandle },
    /// The call was rejected or failed
    Failed { session: SessionHandle, cause: String },
    /// Client-level error, optionally tied to a session
    Error {
        session: Option<SessionHandle>,
        cause: String,
    },
}

impl SignalingEvent {
    /// Session the event refers to, if any
    pub fn session(&self) -> Option<&SessionHandle> {
        match self {
            SignalingEvent::Incoming { session, .. }
            | SignalingEvent::Accepted { session, .. }
            | SignalingEvent::Ended { session }
            | SignalingEvent::Failed { session, .. } => Some(session),
            SignalingEvent::Error { session, .. } => session.as_ref(),
        }
    }
}

/// Trait defining the operations the coordinator needs from the signaling client
#[async_trait::async_trait]
pub trait SignalingClient: Send + Sync {
    /// Register with the platform and open the requested media
    async fn connect(&self, media: MediaOptions) -> Result<(), SignalingError>;

    /// Tear down the registration
    async fn disconnect(&self) -> Result<(), SignalingError>;

    /// Place a call
    async fn call(&self, number: &str, video: bool) -> Result<SessionHandle, SignalingError>;

    /// Accept an incoming call
    async fn accept(&self, session: &SessionHandle, video: bool) -> Result<(), SignalingError>;

    /// Hang up, cancel or reject a call
    async fn hangup(&self, session: &SessionHandle) -> Result<(), SignalingError>;

    async fn hold(&self, session: &SessionHandle) -> Result<(), SignalingError>;

    async fn resume(&self, session: &SessionHandle) -> Result<(), SignalingError>;

    async fn mute(&self, session: &SessionHandle) -> Result<(), SignalingError>;

    async fn unmute(&self, session: &SessionHandle) -> Result<(), SignalingError>;

    async fn turn_camera_on(&self, session: &SessionHandle) -> Result<(), SignalingError>;

    async fn turn_camera_off(&self, session: &SessionHandle) -> Result<(), SignalingError>;

    /// Send a DTMF digit on the call
    async fn send_dtmf(&self, session: &SessionHandle, digit: char) -> Result<(), SignalingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_session_accessor() {
        let handle = SessionHandle::new("abc");
        let event = SignalingEvent::Ended { session: handle.clone() };
        assert_eq!(event.session(), Some(&handle));

        let event = SignalingEvent::Error {
            session: None,
            cause: "socket closed".to_string(),
        };
        assert_eq!(event.session(), None);
    }
}
