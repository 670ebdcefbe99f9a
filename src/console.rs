//! Console dialer
//!
//! A line-oriented dialer screen: each input line is parsed into a
//! [`ConsoleCommand`] and turned into coordinator commands or simulated
//! remote/native events.

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::bridge::BridgeEvent;
use crate::coordinator::CoordinatorHandle;
use crate::loopback::{LoggingBridge, LoopbackSignaling};
use crate::session::CallId;

pub const HELP: &str = "\
Commands:
  call [number]            audio call (default number if omitted)
  video [number]           video call
  answer | answer-video    answer the ringing call
  hangup                   end or decline the call
  hold                     toggle hold
  camera                   toggle camera on a video call
  mute | unmute            microphone
  dtmf <digits>            send keypad digits
  incoming <number> [video]  simulate an incoming call
  remote-hangup            simulate the remote party hanging up
  native-call <number>     simulate a call started from the system UI
  native-answer            simulate answering from the system UI
  native-end               simulate ending from the system UI
  status                   print the current state
  help | quit";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("Missing argument for {0}")]
    MissingArgument(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Call { number: Option<String>, video: bool },
    Answer { video: bool },
    Hangup,
    Hold,
    Camera,
    Mute(bool),
    Dtmf(String),
    Incoming { number: String, video: bool },
    RemoteHangup,
    NativeCall(String),
    NativeAnswer,
    NativeEnd,
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or(ParseError::Empty)?.to_lowercase();
        let arg = words.next().map(str::to_string);

        let parsed = match command.as_str() {
            "call" => ConsoleCommand::Call { number: arg, video: false },
            "video" => ConsoleCommand::Call { number: arg, video: true },
            "answer" => ConsoleCommand::Answer { video: false },
            "answer-video" => ConsoleCommand::Answer { video: true },
            "hangup" | "end" => ConsoleCommand::Hangup,
            "hold" | "unhold" => ConsoleCommand::Hold,
            "camera" => ConsoleCommand::Camera,
            "mute" => ConsoleCommand::Mute(true),
            "unmute" => ConsoleCommand::Mute(false),
            "dtmf" => ConsoleCommand::Dtmf(arg.ok_or(ParseError::MissingArgument("dtmf"))?),
            "incoming" => ConsoleCommand::Incoming {
                number: arg.ok_or(ParseError::MissingArgument("incoming"))?,
                video: words.next().is_some_and(|w| w.eq_ignore_ascii_case("video")),
            },
            "remote-hangup" => ConsoleCommand::RemoteHangup,
            "native-call" => {
                ConsoleCommand::NativeCall(arg.ok_or(ParseError::MissingArgument("native-call"))?)
            }
            "native-answer" => ConsoleCommand::NativeAnswer,
            "native-end" => ConsoleCommand::NativeEnd,
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "logout" => ConsoleCommand::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };

        Ok(parsed)
    }
}

/// Dialer screen wired to a running coordinator and the loopback collaborators
pub struct Console {
    handle: CoordinatorHandle,
    signaling: Arc<LoopbackSignaling>,
    bridge: Arc<LoggingBridge>,
    default_number: String,
}

impl Console {
    pub fn new(
        handle: CoordinatorHandle,
        signaling: Arc<LoopbackSignaling>,
        bridge: Arc<LoggingBridge>,
        default_number: String,
    ) -> Self {
        Self {
            handle,
            signaling,
            bridge,
            default_number,
        }
    }

    /// Run one command. Returns false when the user asked to quit.
    pub async fn execute(&self, command: ConsoleCommand) -> anyhow::Result<bool> {
        match command {
            ConsoleCommand::Call { number, video } => {
                let number = number.unwrap_or_else(|| self.default_number.clone());
                self.handle.call(&number, video).await?;
            }
            ConsoleCommand::Answer { video } => self.handle.answer(video).await?,
            ConsoleCommand::Hangup => self.handle.hangup().await?,
            ConsoleCommand::Hold => self.handle.toggle_hold().await?,
            ConsoleCommand::Camera => self.handle.toggle_camera().await?,
            ConsoleCommand::Mute(muted) => self.handle.set_muted(muted).await?,
            ConsoleCommand::Dtmf(digits) => {
                for digit in digits.chars() {
                    self.handle.send_dtmf(digit).await?;
                }
            }
            ConsoleCommand::Incoming { number, video } => {
                self.signaling.simulate_incoming(&number, video).await?;
            }
            ConsoleCommand::RemoteHangup => {
                if self.signaling.simulate_remote_hangup().await == 0 {
                    println!("No call to hang up");
                }
            }
            ConsoleCommand::NativeCall(handle) => {
                self.bridge
                    .user_action(BridgeEvent::StartCallRequested { handle })
                    .await?;
            }
            ConsoleCommand::NativeAnswer => {
                self.native_action(|call_id| BridgeEvent::AnswerRequested { call_id })
                    .await?
            }
            ConsoleCommand::NativeEnd => {
                self.native_action(|call_id| BridgeEvent::EndRequested { call_id })
                    .await?
            }
            ConsoleCommand::Status => {
                let snapshot = self.handle.snapshot();
                println!("{}", snapshot.status_text());
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => return Ok(false),
        }

        Ok(true)
    }

    /// Act on the system call UI entry for the current call
    async fn native_action(&self, event: impl FnOnce(CallId) -> BridgeEvent) -> anyhow::Result<()> {
        let Some(call_id) = self.handle.snapshot().call_id else {
            println!("No call on the system UI");
            return Ok(());
        };
        self.bridge.user_action(event(call_id)).await?;
        Ok(())
    }
}
