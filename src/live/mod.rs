//! Live module - turns a duplex byte connection into decoded entries.
//!
//! ```text
//! peer ──► read task ──► FrameBuffer ──► WireDecoder ──► mpsc<LiveEvent>
//!   ▲                                                        │
//!   └──── heartbeat task (marker every interval)             ▼
//!                                                   LiveSession::recv()
//! ```
//!
//! A session ends with exactly one terminal event, [`LiveEvent::Closed`] or
//! [`LiveEvent::Error`], after which the event channel closes.

mod heartbeat;
mod session;

use crate::error::RlogError;
use crate::model::Entry;

pub use session::{LiveSession, LiveSessionBuilder};

/// Why a session closed without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer ended the connection.
    PeerClosed,
    /// No inbound bytes within the idle timeout.
    IdleTimeout,
}

/// Event delivered by a [`LiveSession`].
#[derive(Debug)]
pub enum LiveEvent {
    /// Entries decoded from one or more complete frames.
    Entries(Vec<Entry>),
    /// Terminal: orderly close.
    Closed(CloseReason),
    /// Terminal: I/O, framing or decode failure.
    Error(RlogError),
}

impl LiveEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LiveEvent::Entries(_))
    }
}

/// Connection status for UI indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStatus {
    Connecting,
    Active,
    Error,
    Closed,
}
