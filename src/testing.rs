//! Recording collaborators for tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::bridge::CallUiBridge;
use crate::config::{MediaOptions, PhoneConfig};
use crate::coordinator::Coordinator;
use crate::error::{BridgeError, MediaError, SignalingError};
use crate::media::{LocalMedia, StreamHandle};
use crate::session::CallId;
use crate::signaling::{SessionHandle, SignalingClient};

/// A command the coordinator sent to the signaling client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingOp {
    Connect(MediaOptions),
    Disconnect,
    Call { number: String, video: bool },
    Accept { session: SessionHandle, video: bool },
    Hangup(SessionHandle),
    Hold(SessionHandle),
    Resume(SessionHandle),
    Mute(SessionHandle),
    Unmute(SessionHandle),
    CameraOn(SessionHandle),
    CameraOff(SessionHandle),
    Dtmf(SessionHandle, char),
}

impl SignalingOp {
    fn name(&self) -> &'static str {
        match self {
            SignalingOp::Connect(_) => "connect",
            SignalingOp::Disconnect => "disconnect",
            SignalingOp::Call { .. } => "call",
            SignalingOp::Accept { .. } => "accept",
            SignalingOp::Hangup(_) => "hangup",
            SignalingOp::Hold(_) => "hold",
            SignalingOp::Resume(_) => "resume",
            SignalingOp::Mute(_) => "mute",
            SignalingOp::Unmute(_) => "unmute",
            SignalingOp::CameraOn(_) => "camera_on",
            SignalingOp::CameraOff(_) => "camera_off",
            SignalingOp::Dtmf(..) => "dtmf",
        }
    }
}

/// Signaling client that records every command and fails the ones it is told to
#[derive(Default)]
pub struct RecordingSignaling {
    ops: Mutex<Vec<SignalingOp>>,
    failing: Mutex<HashSet<&'static str>>,
    next_session: AtomicU64,
}

impl RecordingSignaling {
    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn ops(&self) -> Vec<SignalingOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn count(&self, op: &'static str) -> usize {
        self.ops().iter().filter(|o| o.name() == op).count()
    }

    fn record(&self, op: SignalingOp) -> Result<(), SignalingError> {
        let name = op.name();
        self.ops.lock().unwrap().push(op);
        if self.failing.lock().unwrap().contains(name) {
            return Err(SignalingError::Rejected(format!("{} rejected", name)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SignalingClient for RecordingSignaling {
    async fn connect(&self, media: MediaOptions) -> Result<(), SignalingError> {
        self.record(SignalingOp::Connect(media))
    }

    async fn disconnect(&self) -> Result<(), SignalingError> {
        self.record(SignalingOp::Disconnect)
    }

    async fn call(&self, number: &str, video: bool) -> Result<SessionHandle, SignalingError> {
        self.record(SignalingOp::Call {
            number: number.to_string(),
            video,
        })?;
        let n = self.next_session.fetch_add(1, Ordering::SeqCst);
        Ok(SessionHandle::new(format!("out-{}", n)))
    }

    async fn accept(&self, session: &SessionHandle, video: bool) -> Result<(), SignalingError> {
        self.record(SignalingOp::Accept {
            session: session.clone(),
            video,
        })
    }

    async fn hangup(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.record(SignalingOp::Hangup(session.clone()))
    }

    async fn hold(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.record(SignalingOp::Hold(session.clone()))
    }

    async fn resume(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.record(SignalingOp::Resume(session.clone()))
    }

    async fn mute(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.record(SignalingOp::Mute(session.clone()))
    }

    async fn unmute(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.record(SignalingOp::Unmute(session.clone()))
    }

    async fn turn_camera_on(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.record(SignalingOp::CameraOn(session.clone()))
    }

    async fn turn_camera_off(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.record(SignalingOp::CameraOff(session.clone()))
    }

    async fn send_dtmf(&self, session: &SessionHandle, digit: char) -> Result<(), SignalingError> {
        self.record(SignalingOp::Dtmf(session.clone(), digit))
    }
}

/// A command the coordinator sent to the native call UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOp {
    Setup(String),
    DisplayIncoming { call_id: CallId, number: String, video: bool },
    StartCall { call_id: CallId, number: String, video: bool },
    SetActive(CallId),
    EndCall(CallId),
    Foreground,
}

/// Native call UI that records every command
#[derive(Default)]
pub struct RecordingBridge {
    ops: Mutex<Vec<BridgeOp>>,
    fail_setup: Mutex<bool>,
    fail_commands: Mutex<bool>,
}

impl RecordingBridge {
    pub fn fail_setup(&self) {
        *self.fail_setup.lock().unwrap() = true;
    }

    pub fn fail_commands(&self) {
        *self.fail_commands.lock().unwrap() = true;
    }

    pub fn ops(&self) -> Vec<BridgeOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn end_calls(&self) -> Vec<CallId> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BridgeOp::EndCall(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn active_calls(&self) -> Vec<CallId> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BridgeOp::SetActive(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: BridgeOp) -> Result<(), BridgeError> {
        self.ops.lock().unwrap().push(op);
        if *self.fail_commands.lock().unwrap() {
            return Err(BridgeError::Command("call UI unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CallUiBridge for RecordingBridge {
    async fn setup(&self, app_name: &str) -> Result<(), BridgeError> {
        self.ops.lock().unwrap().push(BridgeOp::Setup(app_name.to_string()));
        if *self.fail_setup.lock().unwrap() {
            return Err(BridgeError::Setup("permission denied".to_string()));
        }
        Ok(())
    }

    async fn display_incoming_call(&self, call_id: CallId, number: &str, video: bool) -> Result<(), BridgeError> {
        self.record(BridgeOp::DisplayIncoming {
            call_id,
            number: number.to_string(),
            video,
        })
    }

    async fn start_call(&self, call_id: CallId, number: &str, video: bool) -> Result<(), BridgeError> {
        self.record(BridgeOp::StartCall {
            call_id,
            number: number.to_string(),
            video,
        })
    }

    async fn set_current_call_active(&self, call_id: CallId) -> Result<(), BridgeError> {
        self.record(BridgeOp::SetActive(call_id))
    }

    async fn end_call(&self, call_id: CallId) -> Result<(), BridgeError> {
        self.record(BridgeOp::EndCall(call_id))
    }

    async fn back_to_foreground(&self) -> Result<(), BridgeError> {
        self.record(BridgeOp::Foreground)
    }
}

/// Local media that hands out numbered previews and remembers releases
#[derive(Default)]
pub struct RecordingMedia {
    acquired: AtomicU64,
    released: Mutex<Vec<StreamHandle>>,
    unavailable: Mutex<bool>,
}

impl RecordingMedia {
    pub fn make_unavailable(&self) {
        *self.unavailable.lock().unwrap() = true;
    }

    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> Vec<StreamHandle> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LocalMedia for RecordingMedia {
    async fn acquire_preview(&self) -> Result<StreamHandle, MediaError> {
        if *self.unavailable.lock().unwrap() {
            return Err(MediaError::Unavailable("camera busy".to_string()));
        }
        let n = self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(StreamHandle::new(format!("preview-{}", n)))
    }

    async fn release(&self, stream: StreamHandle) {
        self.released.lock().unwrap().push(stream);
    }
}

/// Coordinator wired to recording collaborators
pub struct Harness {
    pub coordinator: Coordinator,
    pub signaling: Arc<RecordingSignaling>,
    pub bridge: Arc<RecordingBridge>,
    pub media: Arc<RecordingMedia>,
}

impl Harness {
    pub fn new(config: PhoneConfig) -> Self {
        let signaling = Arc::new(RecordingSignaling::default());
        let bridge = Arc::new(RecordingBridge::default());
        let media = Arc::new(RecordingMedia::default());

        let coordinator = Coordinator::new(config, signaling.clone(), bridge.clone(), media.clone());

        Self {
            coordinator,
            signaling,
            bridge,
            media,
        }
    }

    /// Harness with default config, already initialised
    pub async fn ready() -> Self {
        let mut harness = Self::new(PhoneConfig::default());
        harness.coordinator.init().await.unwrap();
        harness
    }
}
