//! Softphone call-session coordinator
//!
//! Sits between a SIP/WebRTC signaling client and the host platform's native
//! call UI, tracking one call at a time from ring/dial to termination.
//!
//! - [`coordinator`]: the lifecycle state machine and its runtime
//! - [`session`]: the per-call record and identifier allocation
//! - [`signaling`], [`bridge`], [`media`]: collaborator contracts
//! - [`loopback`], [`console`]: in-process collaborators and the console dialer

pub mod bridge;
pub mod config;
pub mod console;
pub mod coordinator;
pub mod error;
pub mod loopback;
pub mod media;
pub mod session;
pub mod signaling;

#[cfg(test)]
mod testing;

pub use config::{MediaOptions, PhoneConfig};
pub use coordinator::{CallSnapshot, Coordinator, CoordinatorEvent, CoordinatorHandle, EventSink, UserCommand};
pub use error::{CallError, CallResult};
pub use session::{CallId, CallPhase, CallSession};
