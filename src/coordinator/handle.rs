//! Coordinator runtime
//!
//! Runs a [`Coordinator`] on its own task. Collaborators and view layers talk
//! to it only through the event channel, so the session is never mutated from
//! two places at once.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{CallSnapshot, Coordinator, CoordinatorEvent, UserCommand};
use crate::bridge::BridgeEvent;
use crate::error::{CallError, CallResult};
use crate::signaling::SignalingEvent;

/// Create the coordinator event channel
pub fn channel(buffer: usize) -> (EventSink, mpsc::Receiver<CoordinatorEvent>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (EventSink { tx }, rx)
}

/// Sending side of the coordinator event channel, handed to collaborators
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::Sender<CoordinatorEvent>,
}

impl EventSink {
    pub async fn send(&self, event: impl Into<CoordinatorEvent>) -> CallResult<()> {
        self.tx
            .send(event.into())
            .await
            .map_err(|_| CallError::ChannelClosed)
    }

    pub async fn signaling(&self, event: SignalingEvent) -> CallResult<()> {
        self.send(event).await
    }

    pub async fn bridge(&self, event: BridgeEvent) -> CallResult<()> {
        self.send(event).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handle to a running coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    sink: EventSink,
    state_rx: watch::Receiver<CallSnapshot>,
    cancel_token: CancellationToken,
}

impl CoordinatorHandle {
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// Latest published state
    pub fn snapshot(&self) -> CallSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<CallSnapshot> {
        self.state_rx.clone()
    }

    async fn command(&self, command: UserCommand) -> CallResult<()> {
        self.sink.send(command).await
    }

    pub async fn call(&self, number: &str, video: bool) -> CallResult<()> {
        self.command(UserCommand::Call {
            number: number.to_string(),
            video,
        })
        .await
    }

    pub async fn answer(&self, with_video: bool) -> CallResult<()> {
        self.command(UserCommand::Answer { with_video }).await
    }

    pub async fn hangup(&self) -> CallResult<()> {
        self.command(UserCommand::Hangup).await
    }

    pub async fn toggle_hold(&self) -> CallResult<()> {
        self.command(UserCommand::ToggleHold).await
    }

    pub async fn toggle_camera(&self) -> CallResult<()> {
        self.command(UserCommand::ToggleCamera).await
    }

    pub async fn set_muted(&self, muted: bool) -> CallResult<()> {
        self.command(UserCommand::SetMuted(muted)).await
    }

    pub async fn send_dtmf(&self, digit: char) -> CallResult<()> {
        self.command(UserCommand::Dtmf(digit)).await
    }

    /// Stop the coordinator. It hangs up and disconnects before the task exits.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Coordinator {
    /// Run the coordinator on a new task
    pub fn spawn(
        self,
        sink: EventSink,
        events: mpsc::Receiver<CoordinatorEvent>,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let cancel_token = CancellationToken::new();
        let handle = CoordinatorHandle {
            sink,
            state_rx: self.subscribe(),
            cancel_token: cancel_token.clone(),
        };

        let task = tokio::spawn(self.run(events, cancel_token));
        (handle, task)
    }

    /// Initialise, then handle events until cancelled or every sender is gone
    pub async fn run(mut self, mut events: mpsc::Receiver<CoordinatorEvent>, cancel_token: CancellationToken) {
        if let Err(e) = self.init().await {
            tracing::error!("Phone initialisation failed: {}", e);
        }

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("Coordinator cancelled");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        tracing::info!("Coordinator event channel closed");
                        break;
                    }
                },
            }
        }

        self.shutdown().await;
    }
}
