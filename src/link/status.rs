//! Link status and the transition rule
//!
//! The whole lifecycle of the game link is a pure function of the current
//! [`Status`] and one [`LinkEvent`]. The supervisor feeds it events; nothing
//! else decides what the status becomes.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────
// Faults
// ─────────────────────────────────────────────────────────────────

/// Classified transport failure. Every variant is recoverable by redialing.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Connect did not complete within the dial timeout, or failed for a
    /// reason other than refusal
    #[error("dial timed out")]
    DialTimeout,

    /// Game actively refused the connection
    #[error("connection refused")]
    DialRefused,

    /// Request frame was not flushed within the write timeout
    #[error("write timed out")]
    WriteTimeout,

    /// No complete response frame within the read timeout
    #[error("read timed out")]
    ReadTimeout,

    /// Peer reset or closed the stream
    #[error("connection reset")]
    ConnectionReset,

    /// Response frame could not be decoded
    #[error("malformed frame")]
    MalformedFrame,
}

impl Fault {
    /// Whether this fault can only come out of a dial attempt
    pub fn is_dial_fault(&self) -> bool {
        matches!(self, Fault::DialTimeout | Fault::DialRefused)
    }

    /// Classify an I/O error raised while dialing
    pub fn from_dial_error(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused => Fault::DialRefused,
            _ => Fault::DialTimeout,
        }
    }

    /// Classify an I/O error raised on an established stream
    pub fn from_stream_error(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::InvalidData => Fault::MalformedFrame,
            _ => Fault::ConnectionReset,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────

/// Current state of the link to the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// No dial attempted yet
    #[default]
    Uninitialized,
    /// Last dial timed out
    DialTimedOut,
    /// Last dial was refused
    DialRefused,
    /// Socket open, first exchange not yet completed
    TentativelyConnected,
    /// At least one full exchange completed on this socket
    Connected,
    /// Write flush timed out on an established link
    WriteTimedOut,
    /// Response did not arrive in time on an established link
    ReadTimedOut,
    /// Peer reset or closed an established link
    ConnectionReset,
    /// Peer sent an undecodable frame on an established link
    MalformedFrame,
    /// The first exchange after dialing failed
    ReconnectingAfterTentativeFailure(Fault),
}

impl Status {
    /// Status reported after a fault on a link that had already completed
    /// an exchange, or after a failed dial
    pub fn from_fault(fault: Fault) -> Self {
        match fault {
            Fault::DialTimeout => Status::DialTimedOut,
            Fault::DialRefused => Status::DialRefused,
            Fault::WriteTimeout => Status::WriteTimedOut,
            Fault::ReadTimeout => Status::ReadTimedOut,
            Fault::ConnectionReset => Status::ConnectionReset,
            Fault::MalformedFrame => Status::MalformedFrame,
        }
    }

    /// Whether this status claims a live socket
    pub fn is_live(&self) -> bool {
        matches!(self, Status::TentativelyConnected | Status::Connected)
    }

    /// Whether the link is in its first, unproven cycle
    pub fn is_tentative(&self) -> bool {
        matches!(self, Status::TentativelyConnected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Uninitialized => write!(f, "Connection has not been initiated"),
            Status::DialTimedOut => write!(f, "Connection timing out"),
            Status::DialRefused => write!(f, "Connection refused"),
            Status::TentativelyConnected => write!(f, "Initial connection made"),
            Status::Connected => write!(f, "Connected"),
            Status::WriteTimedOut => write!(f, "Write timed out"),
            Status::ReadTimedOut => write!(f, "Read timed out"),
            Status::ConnectionReset => write!(f, "Connection was reset"),
            Status::MalformedFrame => write!(f, "Received a malformed frame"),
            Status::ReconnectingAfterTentativeFailure(fault) => {
                write!(f, "Was tentatively connected but an error occurred: {}", fault)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Transition Rule
// ─────────────────────────────────────────────────────────────────

/// Something that happened on the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Dial produced a socket
    Dialed,
    /// Dial failed
    DialFailed(Fault),
    /// One full request/response exchange finished cleanly
    ExchangeCompleted,
    /// The exchange failed and the socket was discarded
    ExchangeFailed(Fault),
}

/// Compute the next status.
///
/// A dial fault delivered as `ExchangeFailed` (or vice versa) is still
/// mapped by its own name; the only state-dependent rule is that a fault on
/// a tentative link is reported as a tentative failure.
pub fn transition(current: Status, event: LinkEvent) -> Status {
    match event {
        LinkEvent::Dialed => Status::TentativelyConnected,
        LinkEvent::DialFailed(Fault::DialRefused) => Status::DialRefused,
        LinkEvent::DialFailed(_) => Status::DialTimedOut,
        LinkEvent::ExchangeCompleted if current.is_live() => Status::Connected,
        LinkEvent::ExchangeCompleted => current,
        LinkEvent::ExchangeFailed(fault) if current.is_tentative() => {
            Status::ReconnectingAfterTentativeFailure(fault)
        }
        LinkEvent::ExchangeFailed(fault) => Status::from_fault(fault),
    }
}

// ─────────────────────────────────────────────────────────────────
// Shared Status Handle
// ─────────────────────────────────────────────────────────────────

/// Read-only view of the link status for observers outside the loop.
///
/// Reads never wait on link I/O. A read may trail an in-flight transition by
/// the few milliseconds the loop needs to publish it; treat the value as a
/// snapshot.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<Status>>,
}

impl StatusHandle {
    /// Current status snapshot
    pub fn get(&self) -> Status {
        *self.inner.read()
    }

    pub(crate) fn set(&self, status: Status) {
        *self.inner.write() = status;
    }
}

impl fmt::Display for StatusHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.get(), f)
    }
}
