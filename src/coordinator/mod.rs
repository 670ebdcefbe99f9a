//! Call Session Lifecycle Coordinator
//!
//! Owns the current call and mediates between the signaling client and the
//! native call UI. Every input, whether it comes from the signaling client,
//! the native call UI or the app's own dialer, is a [`CoordinatorEvent`] fed
//! through [`Coordinator::handle`], one at a time. View layers never touch the
//! session; they read [`CallSnapshot`]s published after each event.

mod handle;


pub use handle::{channel, CoordinatorHandle, EventSink};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::bridge::{BridgeEvent, CallUiBridge};
use crate::config::PhoneConfig;
use crate::error::{CallError, CallResult};
use crate::media::{LocalMedia, StreamHandle};
use crate::session::{
    CallDirection, CallId, CallIdAllocator, CallPhase, CallSession, CameraState, HoldState,
};
use crate::signaling::{SessionHandle, SignalingClient, SignalingEvent};

/// Actions requested by the app's own dialer screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Call { number: String, video: bool },
    Answer { with_video: bool },
    Hangup,
    ToggleHold,
    ToggleCamera,
    SetMuted(bool),
    Dtmf(char),
}

/// Everything the coordinator reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    Signaling(SignalingEvent),
    Bridge(BridgeEvent),
    Command(UserCommand),
}

impl From<SignalingEvent> for CoordinatorEvent {
    fn from(event: SignalingEvent) -> Self {
        CoordinatorEvent::Signaling(event)
    }
}

impl From<BridgeEvent> for CoordinatorEvent {
    fn from(event: BridgeEvent) -> Self {
        CoordinatorEvent::Bridge(event)
    }
}

impl From<UserCommand> for CoordinatorEvent {
    fn from(command: UserCommand) -> Self {
        CoordinatorEvent::Command(command)
    }
}

/// Read-only view of the coordinator for view layers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallSnapshot {
    pub ready: bool,
    pub phase: CallPhase,
    pub call_id: Option<CallId>,
    pub peer_number: Option<String>,
    pub direction: Option<CallDirection>,
    pub is_video: bool,
    pub hold_state: HoldState,
    pub camera_state: CameraState,
    pub muted: bool,
    pub last_error: Option<String>,
    pub preview_active: bool,
    pub duration_secs: u64,
}

impl CallSnapshot {
    pub fn is_ringing(&self) -> bool {
        self.phase == CallPhase::Ringing
    }

    pub fn is_in_call(&self) -> bool {
        self.phase == CallPhase::Active
    }

    pub fn is_held(&self) -> bool {
        self.hold_state == HoldState::Held
    }

    pub fn status_text(&self) -> &str {
        match self.phase {
            _ if !self.ready => "Connecting...",
            CallPhase::Ringing => "Incoming call",
            CallPhase::Active if self.is_held() => "On Hold",
            CallPhase::Active => "In Call",
            CallPhase::Idle | CallPhase::Ended => "Ready",
        }
    }
}

/// DTMF digits a keypad can send
pub fn is_dtmf_digit(digit: char) -> bool {
    matches!(digit, '0'..='9' | '*' | '#' | 'A'..='D')
}

/// Call session lifecycle coordinator
pub struct Coordinator {
    config: PhoneConfig,
    signaling: Arc<dyn SignalingClient>,
    bridge: Arc<dyn CallUiBridge>,
    media: Arc<dyn LocalMedia>,
    ids: CallIdAllocator,
    session: Option<CallSession>,
    last_error: Option<String>,
    ready: bool,
    preview: Option<StreamHandle>,
    state_tx: watch::Sender<CallSnapshot>,
}

impl Coordinator {
    pub fn new(
        config: PhoneConfig,
        signaling: Arc<dyn SignalingClient>,
        bridge: Arc<dyn CallUiBridge>,
        media: Arc<dyn LocalMedia>,
    ) -> Self {
        let (state_tx, _) = watch::channel(CallSnapshot::default());

        Self {
            config,
            signaling,
            bridge,
            media,
            ids: CallIdAllocator::new(),
            session: None,
            last_error: None,
            ready: false,
            preview: None,
            state_tx,
        }
    }

    pub fn config(&self) -> &PhoneConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Current call, if any
    pub fn session(&self) -> Option<&CallSession> {
        self.session.as_ref()
    }

    pub fn phase(&self) -> CallPhase {
        self.session
            .as_ref()
            .map(|s| s.phase())
            .unwrap_or(CallPhase::Idle)
    }

    /// Identifier of the current call, if any
    pub fn current_call_id(&self) -> Option<CallId> {
        self.ids.current()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn preview(&self) -> Option<&StreamHandle> {
        self.preview.as_ref()
    }

    pub fn snapshot(&self) -> CallSnapshot {
        let session = self.session.as_ref();

        CallSnapshot {
            ready: self.ready,
            phase: self.phase(),
            call_id: self.ids.current(),
            peer_number: session.map(|s| s.peer_number.clone()),
            direction: session.map(|s| s.direction),
            is_video: session.map(|s| s.is_video).unwrap_or(false),
            hold_state: session.map(|s| s.hold_state()).unwrap_or_default(),
            camera_state: session.map(|s| s.camera_state()).unwrap_or_default(),
            muted: session.map(|s| s.is_muted()).unwrap_or(false),
            last_error: self.last_error.clone(),
            preview_active: self.preview.is_some(),
            duration_secs: session.map(|s| s.duration()).unwrap_or(0),
        }
    }

    /// Subscribe to snapshots published after every handled event
    pub fn subscribe(&self) -> watch::Receiver<CallSnapshot> {
        self.state_tx.subscribe()
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.snapshot());
    }

    /// Connect the signaling client, register with the native call UI and show the preview
    pub async fn init(&mut self) -> CallResult<()> {
        if let Err(e) = self.signaling.connect(self.config.media).await {
            let err = CallError::from(e);
            tracing::error!("Signaling connect failed: {}", err);
            self.last_error = Some(err.to_string());
            self.publish();
            return Err(err);
        }

        // Calls still work without the system call UI
        if let Err(e) = self.bridge.setup(&self.config.app_name).await {
            let err = CallError::BridgeSetupFailure(e.to_string());
            tracing::warn!("{}", err);
        }

        self.ready = true;
        self.start_preview().await;

        tracing::info!("Phone ready");
        self.publish();
        Ok(())
    }

    /// End any call, release media and disconnect. Used on logout.
    pub async fn shutdown(&mut self) {
        self.ready = false;

        if self.session.is_some() {
            let _ = self.hangup().await;
        }

        if let Some(preview) = self.preview.take() {
            self.media.release(preview).await;
        }

        if let Err(e) = self.signaling.disconnect().await {
            tracing::warn!("Signaling disconnect failed: {}", e);
        }

        tracing::info!("Phone shut down");
        self.publish();
    }

    /// Handle one event to completion and publish the resulting state
    pub async fn handle(&mut self, event: CoordinatorEvent) {
        tracing::debug!("Handling {:?}", event);

        let result = match event {
            CoordinatorEvent::Signaling(event) => self.on_signaling(event).await,
            CoordinatorEvent::Bridge(event) => self.on_bridge(event).await,
            CoordinatorEvent::Command(command) => self.on_command(command).await,
        };

        match result {
            Ok(()) => {}
            Err(CallError::TerminationRace) => {
                tracing::debug!("Ignored event for a call that already ended");
            }
            Err(e @ CallError::NoActiveSession) => tracing::debug!("Ignored: {}", e),
            Err(e) => tracing::warn!("{}", e),
        }

        self.publish();
    }

    async fn on_signaling(&mut self, event: SignalingEvent) -> CallResult<()> {
        match event {
            SignalingEvent::Incoming {
                session,
                peer_number,
                video,
            } => self.receive_incoming(session, peer_number, video).await.map(|_| ()),
            SignalingEvent::Accepted {
                session,
                local_stream,
                remote_stream,
            } => self.on_accepted(&session, local_stream, remote_stream).await,
            SignalingEvent::Ended { session } => self.on_ended(&session).await,
            SignalingEvent::Failed { session, cause } => self.on_failed(&session, cause).await,
            SignalingEvent::Error {
                session: Some(session),
                cause,
            } => self.on_failed(&session, cause).await,
            SignalingEvent::Error { session: None, cause } => {
                tracing::warn!("Signaling error: {}", cause);
                self.last_error = Some(cause);
                Ok(())
            }
        }
    }

    async fn on_bridge(&mut self, event: BridgeEvent) -> CallResult<()> {
        match event {
            BridgeEvent::StartCallRequested { handle } => {
                // The platform echoes calls the app placed itself
                if self.session.is_some() {
                    tracing::debug!("Ignoring native start-call for {}: call in progress", handle);
                    return Ok(());
                }
                self.place_call(&handle, false).await.map(|_| ())
            }
            BridgeEvent::AnswerRequested { call_id } => {
                self.ensure_current(call_id)?;
                self.answer(true).await?;

                let is_video = self.session.as_ref().map(|s| s.is_video).unwrap_or(false);
                if is_video && self.config.foreground_on_video_answer {
                    if let Err(e) = self.bridge.back_to_foreground().await {
                        tracing::warn!("Could not bring app to foreground: {}", e);
                    }
                }
                Ok(())
            }
            BridgeEvent::EndRequested { call_id } => {
                self.ensure_current(call_id)?;
                self.hangup().await
            }
            BridgeEvent::MuteToggled { muted } => self.set_muted(muted).await,
            BridgeEvent::HoldToggled { held } => {
                let target = if held { HoldState::Held } else { HoldState::NotHeld };
                self.set_hold(target).await
            }
            BridgeEvent::Dtmf { digit } => self.send_dtmf(digit).await,
        }
    }

    async fn on_command(&mut self, command: UserCommand) -> CallResult<()> {
        match command {
            UserCommand::Call { number, video } => self.place_call(&number, video).await.map(|_| ()),
            UserCommand::Answer { with_video } => self.answer(with_video).await,
            UserCommand::Hangup => self.hangup().await,
            UserCommand::ToggleHold => self.toggle_hold().await,
            UserCommand::ToggleCamera => self.toggle_camera().await,
            UserCommand::SetMuted(muted) => self.set_muted(muted).await,
            UserCommand::Dtmf(digit) => self.send_dtmf(digit).await,
        }
    }

    /// Native call UI events must name the current call
    fn ensure_current(&self, call_id: CallId) -> CallResult<()> {
        match self.ids.current() {
            Some(current) if current == call_id => Ok(()),
            _ => Err(CallError::TerminationRace),
        }
    }

    /// Session matching a signaling handle, or a termination race
    fn session_for(&mut self, handle: &SessionHandle) -> CallResult<&mut CallSession> {
        match self.session.as_mut() {
            Some(session) if session.owns(handle) => Ok(session),
            _ => Err(CallError::TerminationRace),
        }
    }

    /// Idle -> Active: place an outbound call
    pub async fn place_call(&mut self, number: &str, video: bool) -> CallResult<CallId> {
        if !self.ready {
            return Err(CallError::NotReady);
        }
        if let Some(session) = &self.session {
            return Err(CallError::InvalidState(format!(
                "Cannot place a call while {}",
                session.phase()
            )));
        }

        let number = number.trim();
        if number.is_empty() {
            return Err(CallError::InvalidState("Number is required".to_string()));
        }

        self.last_error = None;

        let handle = match self.signaling.call(number, video).await {
            Ok(handle) => handle,
            Err(e) => {
                let err = CallError::from(e);
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        };

        let call_id = self.ids.get_or_create();
        self.session = Some(CallSession::new_outbound(call_id, handle, number.to_string(), video));

        if let Err(e) = self.bridge.start_call(call_id, number, video).await {
            tracing::warn!("Call UI start_call failed for {}: {}", call_id, e);
        }

        tracing::info!(
            "Calling {} ({}) call_id: {}",
            number,
            if video { "video" } else { "audio" },
            call_id
        );
        Ok(call_id)
    }

    /// Idle -> Ringing: a remote party is calling
    pub async fn receive_incoming(
        &mut self,
        handle: SessionHandle,
        peer_number: String,
        video: bool,
    ) -> CallResult<CallId> {
        if let Some(current) = &self.session {
            if current.owns(&handle) {
                tracing::debug!("Duplicate incoming event for {}", handle);
                return Ok(current.call_id);
            }

            tracing::info!("Rejecting incoming call from {}: busy", peer_number);
            if let Err(e) = self.signaling.hangup(&handle).await {
                tracing::warn!("Could not reject incoming call {}: {}", handle, e);
            }
            return Err(CallError::InvalidState(format!(
                "Busy: call with {} in progress",
                current.peer_number
            )));
        }

        self.last_error = None;

        let call_id = self.ids.get_or_create();
        if let Err(e) = self.bridge.display_incoming_call(call_id, &peer_number, video).await {
            tracing::warn!("Call UI display_incoming_call failed for {}: {}", call_id, e);
        }

        tracing::info!(
            "Incoming {} call from {} call_id: {}",
            if video { "video" } else { "audio" },
            peer_number,
            call_id
        );
        self.session = Some(CallSession::new_inbound(call_id, handle, peer_number, video));
        Ok(call_id)
    }

    /// Ringing -> Active: answer the incoming call
    pub async fn answer(&mut self, with_video: bool) -> CallResult<()> {
        let (handle, call_id) = match &self.session {
            Some(s) if s.phase() == CallPhase::Ringing => (s.handle.clone(), s.call_id),
            Some(s) => {
                return Err(CallError::InvalidState(format!(
                    "Cannot answer call in state: {}",
                    s.phase()
                )))
            }
            None => return Err(CallError::NoActiveSession),
        };

        if let Err(e) = self.signaling.accept(&handle, with_video).await {
            let err = CallError::from(e);
            self.fail(err.to_string()).await;
            return Err(err);
        }

        if let Some(session) = self.session.as_mut() {
            session.answer(with_video);
        }

        if let Err(e) = self.bridge.set_current_call_active(call_id).await {
            tracing::warn!("Call UI set_current_call_active failed for {}: {}", call_id, e);
        }

        tracing::info!("Answered call {} with video: {}", call_id, with_video);
        Ok(())
    }

    /// Ringing/Active -> Idle. Hanging up before acceptance cancels or declines the call.
    pub async fn hangup(&mut self) -> CallResult<()> {
        let handle = match &self.session {
            Some(session) => session.handle.clone(),
            None => return Err(CallError::NoActiveSession),
        };

        // Local cleanup proceeds whatever the signaling client says
        if let Err(e) = self.signaling.hangup(&handle).await {
            tracing::warn!("Signaling hangup failed for {}: {}", handle, e);
        }

        self.terminate("local hangup").await;
        Ok(())
    }

    async fn on_accepted(
        &mut self,
        handle: &SessionHandle,
        local_stream: Option<StreamHandle>,
        remote_stream: Option<StreamHandle>,
    ) -> CallResult<()> {
        let session = self.session_for(handle)?;
        tracing::info!("Call {} accepted", session.call_id);

        if !session.is_video || (local_stream.is_none() && remote_stream.is_none()) {
            return Ok(());
        }

        session.attach_streams(local_stream, remote_stream);

        // The call's own local stream replaces the preview
        if let Some(preview) = self.preview.take() {
            self.media.release(preview).await;
        }
        Ok(())
    }

    async fn on_ended(&mut self, handle: &SessionHandle) -> CallResult<()> {
        self.session_for(handle)?;
        self.terminate("remote hangup").await;
        Ok(())
    }

    async fn on_failed(&mut self, handle: &SessionHandle, cause: String) -> CallResult<()> {
        self.session_for(handle)?;
        self.fail(cause).await;
        Ok(())
    }

    async fn fail(&mut self, cause: String) {
        tracing::warn!("Call failed: {}", cause);
        self.last_error = Some(cause);
        self.terminate("failure").await;
    }

    /// Tear the current call down. Returns false when there was nothing to tear down.
    async fn terminate(&mut self, reason: &str) -> bool {
        let call_id = match (self.session.is_some(), self.ids.current()) {
            (true, Some(call_id)) => call_id,
            _ => {
                tracing::debug!("Termination ({}) with no call in progress", reason);
                return false;
            }
        };

        let Some(mut session) = self.session.take() else {
            return false;
        };
        session.end();

        let suppress = self.config.suppress_end_call_with_camera
            && session.is_video
            && session.camera_state() == CameraState::On;

        if suppress {
            tracing::debug!("Skipping call UI end_call for {}: camera on", call_id);
        } else if let Err(e) = self.bridge.end_call(call_id).await {
            tracing::warn!("Call UI end_call failed for {}: {}", call_id, e);
        }

        for stream in session.take_streams() {
            self.media.release(stream).await;
        }
        if let Some(preview) = self.preview.take() {
            self.media.release(preview).await;
        }

        self.ids.clear();

        tracing::info!(
            "Call {} with {} ended ({}) after {}s",
            call_id,
            session.peer_number,
            reason,
            session.duration()
        );

        self.start_preview().await;
        true
    }

    /// Show the local preview again so the next call starts from a clean slate
    async fn start_preview(&mut self) {
        if !self.ready || !self.config.local_preview || self.preview.is_some() {
            return;
        }

        match self.media.acquire_preview().await {
            Ok(stream) => {
                tracing::debug!("Local preview on {}", stream);
                self.preview = Some(stream);
            }
            Err(e) => tracing::warn!("Local preview unavailable: {}", e),
        }
    }

    fn active_session(&self) -> CallResult<&CallSession> {
        match &self.session {
            Some(s) if s.is_active() => Ok(s),
            Some(s) => Err(CallError::InvalidState(format!("Call is {}", s.phase()))),
            None => Err(CallError::NoActiveSession),
        }
    }

    /// Put the active call on hold or resume it
    pub async fn set_hold(&mut self, target: HoldState) -> CallResult<()> {
        let session = self.active_session()?;
        if session.hold_state() == target {
            return Ok(());
        }
        let handle = session.handle.clone();

        let result = match target {
            HoldState::Held => self.signaling.hold(&handle).await,
            HoldState::NotHeld => self.signaling.resume(&handle).await,
        };
        result?;

        if let Some(session) = self.session.as_mut() {
            session.set_hold(target);
        }
        tracing::info!("Call {:?}", target);
        Ok(())
    }

    pub async fn toggle_hold(&mut self) -> CallResult<()> {
        let target = self.active_session()?.hold_state().toggled();
        self.set_hold(target).await
    }

    /// Turn the camera on or off during an active video call
    pub async fn toggle_camera(&mut self) -> CallResult<()> {
        let session = self.active_session()?;
        if !session.is_video {
            return Err(CallError::InvalidState("Not a video call".to_string()));
        }
        let handle = session.handle.clone();
        let target = session.camera_state().toggled();

        let result = match target {
            CameraState::On => self.signaling.turn_camera_on(&handle).await,
            CameraState::Off => self.signaling.turn_camera_off(&handle).await,
        };
        result?;

        if let Some(session) = self.session.as_mut() {
            session.set_camera(target);
        }
        tracing::info!("Camera {:?}", target);
        Ok(())
    }

    /// Mute or unmute the microphone. A no-op without a call.
    pub async fn set_muted(&mut self, muted: bool) -> CallResult<()> {
        let Some(session) = &self.session else {
            tracing::debug!("Mute toggled with no call in progress");
            return Ok(());
        };
        let handle = session.handle.clone();

        if muted {
            self.signaling.mute(&handle).await?;
        } else {
            self.signaling.unmute(&handle).await?;
        }

        if let Some(session) = self.session.as_mut() {
            session.set_muted(muted);
        }
        Ok(())
    }

    /// Send a keypad digit on the active call
    pub async fn send_dtmf(&mut self, digit: char) -> CallResult<()> {
        let digit = digit.to_ascii_uppercase();
        if !is_dtmf_digit(digit) {
            return Err(CallError::InvalidDigit(digit));
        }

        let handle = match &self.session {
            Some(s) if s.is_active() => s.handle.clone(),
            _ => {
                tracing::debug!("DTMF {} ignored: no active call", digit);
                return Ok(());
            }
        };
        self.signaling.send_dtmf(&handle, digit).await?;
        tracing::debug!("DTMF {} sent", digit);
        Ok(())
    }
}
