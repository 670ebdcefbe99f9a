//! Call Session
//!
//! The record of one call, owned by the coordinator from ring/dial to termination.

pub mod identity;

pub use identity::{CallId, CallIdAllocator};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::StreamHandle;
use crate::signaling::SessionHandle;

/// Call phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    /// No call in progress
    #[default]
    Idle,
    /// Incoming call waiting to be answered
    Ringing,
    /// Call placed or answered
    Active,
    /// Call is over; collapses back to Idle
    Ended,
}

impl std::fmt::Display for CallPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallPhase::Idle => write!(f, "Idle"),
            CallPhase::Ringing => write!(f, "Ringing"),
            CallPhase::Active => write!(f, "Active"),
            CallPhase::Ended => write!(f, "Ended"),
        }
    }
}

/// Call direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    /// We placed the call
    Outbound,
    /// The remote party called us
    Inbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldState {
    #[default]
    NotHeld,
    Held,
}

impl HoldState {
    pub fn toggled(self) -> Self {
        match self {
            HoldState::NotHeld => HoldState::Held,
            HoldState::Held => HoldState::NotHeld,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraState {
    On,
    #[default]
    Off,
}

impl CameraState {
    pub fn toggled(self) -> Self {
        match self {
            CameraState::On => CameraState::Off,
            CameraState::Off => CameraState::On,
        }
    }
}

/// One call in progress
#[derive(Debug, Clone)]
pub struct CallSession {
    /// Identifier shared with the native call UI
    pub call_id: CallId,
    /// Signaling client session this call is bound to
    pub handle: SessionHandle,
    pub direction: CallDirection,
    pub peer_number: String,
    pub is_video: bool,
    phase: CallPhase,
    hold_state: HoldState,
    camera_state: CameraState,
    muted: bool,
    local_stream: Option<StreamHandle>,
    remote_stream: Option<StreamHandle>,
    pub started_at: DateTime<Utc>,
    connected_at: Option<DateTime<Utc>>,
}

impl CallSession {
    /// Create a dialed call. Outbound calls are active as soon as they are placed.
    pub fn new_outbound(call_id: CallId, handle: SessionHandle, peer_number: String, is_video: bool) -> Self {
        let now = Utc::now();
        Self {
            call_id,
            handle,
            direction: CallDirection::Outbound,
            peer_number,
            is_video,
            phase: CallPhase::Active,
            hold_state: HoldState::NotHeld,
            camera_state: if is_video { CameraState::On } else { CameraState::Off },
            muted: false,
            local_stream: None,
            remote_stream: None,
            started_at: now,
            connected_at: Some(now),
        }
    }

    /// Create a ringing incoming call
    pub fn new_inbound(call_id: CallId, handle: SessionHandle, peer_number: String, is_video: bool) -> Self {
        Self {
            call_id,
            handle,
            direction: CallDirection::Inbound,
            peer_number,
            is_video,
            phase: CallPhase::Ringing,
            hold_state: HoldState::NotHeld,
            camera_state: CameraState::Off,
            muted: false,
            local_stream: None,
            remote_stream: None,
            started_at: Utc::now(),
            connected_at: None,
        }
    }

    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    pub fn hold_state(&self) -> HoldState {
        self.hold_state
    }

    pub fn camera_state(&self) -> CameraState {
        self.camera_state
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_active(&self) -> bool {
        self.phase == CallPhase::Active
    }

    /// Whether this record belongs to the given signaling session
    pub fn owns(&self, handle: &SessionHandle) -> bool {
        &self.handle == handle
    }

    /// Ringing -> Active. The camera follows the answer mode on video calls.
    pub fn answer(&mut self, with_video: bool) {
        self.phase = CallPhase::Active;
        self.connected_at = Some(Utc::now());
        self.camera_state = if self.is_video && with_video {
            CameraState::On
        } else {
            CameraState::Off
        };
    }

    /// Only meaningful while active; returns false when the change is refused
    pub fn set_hold(&mut self, hold_state: HoldState) -> bool {
        if !self.is_active() {
            return false;
        }
        self.hold_state = hold_state;
        true
    }

    /// Only meaningful on an active video call; returns false when the change is refused
    pub fn set_camera(&mut self, camera_state: CameraState) -> bool {
        if !self.is_active() || !self.is_video {
            return false;
        }
        self.camera_state = camera_state;
        true
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn attach_streams(&mut self, local: Option<StreamHandle>, remote: Option<StreamHandle>) {
        self.local_stream = local;
        self.remote_stream = remote;
    }

    pub fn has_streams(&self) -> bool {
        self.local_stream.is_some() || self.remote_stream.is_some()
    }

    /// Detach the video streams so they can be released
    pub fn take_streams(&mut self) -> Vec<StreamHandle> {
        self.local_stream
            .take()
            .into_iter()
            .chain(self.remote_stream.take())
            .collect()
    }

    /// Seconds since connect, or since start if never connected
    pub fn duration(&self) -> u64 {
        let start = self.connected_at.unwrap_or(self.started_at);
        (Utc::now() - start).num_seconds().max(0) as u64
    }

    /// Mark the session over. The coordinator drops it right after.
    pub fn end(&mut self) {
        self.phase = CallPhase::Ended;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_handle() -> SessionHandle {
        SessionHandle::new("sess-1")
    }

    #[test]
    fn test_outbound_video_starts_active_with_camera() {
        let mut ids = CallIdAllocator::new();
        let session = CallSession::new_outbound(ids.get_or_create(), session_handle(), "8008".into(), true);
        assert_eq!(session.phase(), CallPhase::Active);
        assert_eq!(session.camera_state(), CameraState::On);
        assert_eq!(session.direction, CallDirection::Outbound);
    }

    #[test]
    fn test_inbound_answer_audio_only_keeps_camera_off() {
        let mut ids = CallIdAllocator::new();
        let mut session = CallSession::new_inbound(ids.get_or_create(), session_handle(), "1002".into(), true);
        assert_eq!(session.phase(), CallPhase::Ringing);

        session.answer(false);
        assert_eq!(session.phase(), CallPhase::Active);
        assert_eq!(session.camera_state(), CameraState::Off);
    }

    #[test]
    fn test_hold_refused_while_ringing() {
        let mut ids = CallIdAllocator::new();
        let mut session = CallSession::new_inbound(ids.get_or_create(), session_handle(), "1002".into(), false);
        assert!(!session.set_hold(HoldState::Held));
        assert_eq!(session.hold_state(), HoldState::NotHeld);
    }

    #[test]
    fn test_camera_refused_on_audio_call() {
        let mut ids = CallIdAllocator::new();
        let mut session = CallSession::new_outbound(ids.get_or_create(), session_handle(), "8008".into(), false);
        assert!(!session.set_camera(CameraState::On));
        assert_eq!(session.camera_state(), CameraState::Off);
    }

    #[test]
    fn test_take_streams_empties_session() {
        let mut ids = CallIdAllocator::new();
        let mut session = CallSession::new_outbound(ids.get_or_create(), session_handle(), "8008".into(), true);
        session.attach_streams(Some(StreamHandle::new("local")), Some(StreamHandle::new("remote")));
        assert!(session.has_streams());

        let streams = session.take_streams();
        assert_eq!(streams.len(), 2);
        assert!(!session.has_streams());
    }

    #[test]
    fn test_toggles_flip() {
        assert_eq!(HoldState::NotHeld.toggled(), HoldState::Held);
        assert_eq!(HoldState::Held.toggled(), HoldState::NotHeld);
        assert_eq!(CameraState::On.toggled(), CameraState::Off);
    }
}
