//! Loopback collaborators
//!
//! In-process stand-ins for the signaling client, the native call UI and the
//! camera, used by the console dialer. Dialed calls are answered after a short
//! delay; numbers starting with `486` are answered busy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;

use crate::bridge::{BridgeEvent, CallUiBridge};
use crate::config::MediaOptions;
use crate::coordinator::EventSink;
use crate::error::{BridgeError, MediaError, SignalingError};
use crate::media::{LocalMedia, StreamHandle};
use crate::session::CallId;
use crate::signaling::{SessionHandle, SignalingClient, SignalingEvent};

/// Signaling client that talks to itself
pub struct LoopbackSignaling {
    sink: EventSink,
    answer_delay: Duration,
    connected: AtomicBool,
    next_session: AtomicU64,
    /// Live sessions and whether they carry video
    sessions: RwLock<HashMap<SessionHandle, bool>>,
}

impl LoopbackSignaling {
    pub fn new(sink: EventSink, answer_delay: Duration) -> Self {
        Self {
            sink,
            answer_delay,
            connected: AtomicBool::new(false),
            next_session: AtomicU64::new(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn new_session(&self) -> SessionHandle {
        let n = self.next_session.fetch_add(1, Ordering::Relaxed);
        SessionHandle::new(format!("loop-{}", n))
    }

    fn ensure_connected(&self) -> Result<(), SignalingError> {
        if self.connected.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(SignalingError::NotConnected)
        }
    }

    async fn ensure_session(&self, session: &SessionHandle) -> Result<bool, SignalingError> {
        self.sessions
            .read()
            .await
            .get(session)
            .copied()
            .ok_or_else(|| SignalingError::SessionNotFound(session.to_string()))
    }

    fn streams_for(session: &SessionHandle, video: bool) -> (Option<StreamHandle>, Option<StreamHandle>) {
        if video {
            (
                Some(StreamHandle::new(format!("{}-local", session))),
                Some(StreamHandle::new(format!("{}-remote", session))),
            )
        } else {
            (None, None)
        }
    }

    /// Simulate a remote party calling us
    pub async fn simulate_incoming(&self, number: &str, video: bool) -> Result<SessionHandle, SignalingError> {
        self.ensure_connected()?;

        let session = self.new_session();
        self.sessions.write().await.insert(session.clone(), video);

        tracing::info!("Loopback: incoming call {} from {}", session, number);
        self.sink
            .signaling(SignalingEvent::Incoming {
                session: session.clone(),
                peer_number: number.to_string(),
                video,
            })
            .await
            .map_err(|e| SignalingError::Transport(e.to_string()))?;

        Ok(session)
    }

    /// Simulate the remote party hanging up every live call
    pub async fn simulate_remote_hangup(&self) -> usize {
        let sessions: Vec<SessionHandle> = self.sessions.write().await.drain().map(|(s, _)| s).collect();

        for session in &sessions {
            tracing::info!("Loopback: remote hangup on {}", session);
            let _ = self
                .sink
                .signaling(SignalingEvent::Ended {
                    session: session.clone(),
                })
                .await;
        }
        sessions.len()
    }
}

#[async_trait::async_trait]
impl SignalingClient for LoopbackSignaling {
    async fn connect(&self, media: MediaOptions) -> Result<(), SignalingError> {
        tracing::info!("Loopback: connected (audio: {}, video: {})", media.audio, media.video);
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SignalingError> {
        self.connected.store(false, Ordering::Relaxed);
        self.sessions.write().await.clear();
        tracing::info!("Loopback: disconnected");
        Ok(())
    }

    async fn call(&self, number: &str, video: bool) -> Result<SessionHandle, SignalingError> {
        self.ensure_connected()?;

        let session = self.new_session();
        self.sessions.write().await.insert(session.clone(), video);
        tracing::info!("Loopback: dialing {} on {}", number, session);

        let busy = number.starts_with("486");
        let sink = self.sink.clone();
        let delay = self.answer_delay;
        let (local_stream, remote_stream) = Self::streams_for(&session, video);
        let handle = session.clone();

        // Progress the call the way a remote party would
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let event = if busy {
                SignalingEvent::Failed {
                    session: handle,
                    cause: "486 Busy Here".to_string(),
                }
            } else {
                SignalingEvent::Accepted {
                    session: handle,
                    local_stream,
                    remote_stream,
                }
            };
            let _ = sink.signaling(event).await;
        });

        Ok(session)
    }

    async fn accept(&self, session: &SessionHandle, video: bool) -> Result<(), SignalingError> {
        let has_video = self.ensure_session(session).await?;
        let (local_stream, remote_stream) = Self::streams_for(session, has_video && video);

        let sink = self.sink.clone();
        let handle = session.clone();
        tokio::spawn(async move {
            let _ = sink
                .signaling(SignalingEvent::Accepted {
                    session: handle,
                    local_stream,
                    remote_stream,
                })
                .await;
        });
        Ok(())
    }

    async fn hangup(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        if self.sessions.write().await.remove(session).is_none() {
            return Err(SignalingError::SessionNotFound(session.to_string()));
        }

        tracing::info!("Loopback: hung up {}", session);
        Ok(())
    }

    async fn hold(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.ensure_session(session).await?;
        tracing::info!("Loopback: {} on hold", session);
        Ok(())
    }

    async fn resume(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.ensure_session(session).await?;
        tracing::info!("Loopback: {} resumed", session);
        Ok(())
    }

    async fn mute(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.ensure_session(session).await?;
        tracing::info!("Loopback: {} muted", session);
        Ok(())
    }

    async fn unmute(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.ensure_session(session).await?;
        tracing::info!("Loopback: {} unmuted", session);
        Ok(())
    }

    async fn turn_camera_on(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.ensure_session(session).await?;
        tracing::info!("Loopback: camera on for {}", session);
        Ok(())
    }

    async fn turn_camera_off(&self, session: &SessionHandle) -> Result<(), SignalingError> {
        self.ensure_session(session).await?;
        tracing::info!("Loopback: camera off for {}", session);
        Ok(())
    }

    async fn send_dtmf(&self, session: &SessionHandle, digit: char) -> Result<(), SignalingError> {
        self.ensure_session(session).await?;
        tracing::info!("Loopback: DTMF {} on {}", digit, session);
        Ok(())
    }
}

/// Native call UI that only logs what it would show
pub struct LoggingBridge {
    sink: EventSink,
}

impl LoggingBridge {
    pub fn new(sink: EventSink) -> Self {
        Self { sink }
    }

    /// Forward an action taken on the (imaginary) system call UI
    pub async fn user_action(&self, event: BridgeEvent) -> Result<(), BridgeError> {
        self.sink
            .bridge(event)
            .await
            .map_err(|e| BridgeError::Command(e.to_string()))
    }
}

#[async_trait::async_trait]
impl CallUiBridge for LoggingBridge {
    async fn setup(&self, app_name: &str) -> Result<(), BridgeError> {
        tracing::info!("Call UI: registered as {}", app_name);
        Ok(())
    }

    async fn display_incoming_call(&self, call_id: CallId, number: &str, video: bool) -> Result<(), BridgeError> {
        tracing::info!("Call UI: incoming {} from {} (video: {})", call_id, number, video);
        Ok(())
    }

    async fn start_call(&self, call_id: CallId, number: &str, video: bool) -> Result<(), BridgeError> {
        tracing::info!("Call UI: outgoing {} to {} (video: {})", call_id, number, video);
        Ok(())
    }

    async fn set_current_call_active(&self, call_id: CallId) -> Result<(), BridgeError> {
        tracing::info!("Call UI: {} active", call_id);
        Ok(())
    }

    async fn end_call(&self, call_id: CallId) -> Result<(), BridgeError> {
        tracing::info!("Call UI: {} ended", call_id);
        Ok(())
    }

    async fn back_to_foreground(&self) -> Result<(), BridgeError> {
        tracing::info!("Call UI: app to foreground");
        Ok(())
    }
}

/// Camera stand-in that hands out numbered preview streams
#[derive(Default)]
pub struct LoopbackMedia {
    next_stream: AtomicU64,
}

#[async_trait::async_trait]
impl LocalMedia for LoopbackMedia {
    async fn acquire_preview(&self) -> Result<StreamHandle, MediaError> {
        let n = self.next_stream.fetch_add(1, Ordering::Relaxed);
        Ok(StreamHandle::new(format!("preview-{}", n)))
    }

    async fn release(&self, stream: StreamHandle) {
        tracing::debug!("Released stream {}", stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{channel, CoordinatorEvent};

    #[tokio::test]
    async fn test_call_requires_connect() {
        let (sink, _events) = channel(8);
        let signaling = LoopbackSignaling::new(sink, Duration::from_millis(1));

        let result = signaling.call("8008", false).await;
        assert_eq!(result, Err(SignalingError::NotConnected));
    }

    #[tokio::test]
    async fn test_dialed_call_is_accepted_after_delay() {
        let (sink, mut events) = channel(8);
        let signaling = LoopbackSignaling::new(sink, Duration::from_millis(1));
        signaling.connect(MediaOptions::default()).await.unwrap();

        let session = signaling.call("8008", true).await.unwrap();

        match events.recv().await {
            Some(CoordinatorEvent::Signaling(SignalingEvent::Accepted {
                session: accepted,
                local_stream,
                remote_stream,
            })) => {
                assert_eq!(accepted, session);
                assert!(local_stream.is_some());
                assert!(remote_stream.is_some());
            }
            other => panic!("Expected Accepted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_busy_number_fails() {
        let (sink, mut events) = channel(8);
        let signaling = LoopbackSignaling::new(sink, Duration::from_millis(1));
        signaling.connect(MediaOptions::default()).await.unwrap();

        signaling.call("4861", false).await.unwrap();

        assert!(matches!(
            events.recv().await,
            Some(CoordinatorEvent::Signaling(SignalingEvent::Failed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_hangup_unknown_session_errors() {
        let (sink, _events) = channel(8);
        let signaling = LoopbackSignaling::new(sink, Duration::from_millis(1));

        let result = signaling.hangup(&SessionHandle::new("nope")).await;
        assert!(matches!(result, Err(SignalingError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_remote_hangup_ends_live_sessions() {
        let (sink, mut events) = channel(8);
        let signaling = LoopbackSignaling::new(sink, Duration::from_millis(1));
        signaling.connect(MediaOptions::default()).await.unwrap();

        let session = signaling.simulate_incoming("1002", false).await.unwrap();
        assert!(matches!(
            events.recv().await,
            Some(CoordinatorEvent::Signaling(SignalingEvent::Incoming { .. }))
        ));

        assert_eq!(signaling.simulate_remote_hangup().await, 1);
        assert_eq!(
            events.recv().await,
            Some(CoordinatorEvent::Signaling(SignalingEvent::Ended { session }))
        );
    }
}
