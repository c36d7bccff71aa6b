//! Events emitted by a protocol client instance.

use std::fmt;

use crate::client::CredentialBundle;
use crate::{Error, SessionId};

/// One event from the protocol client's event stream.
///
/// All events from a client instance belong to the generation that
/// constructed it; the session layer discards events from stale
/// generations.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Connection-level update (QR challenge, open, close)
    Connection(ConnectionUpdate),
    /// The credential bundle changed and must be persisted before the next
    /// event is processed
    CredentialsUpdate(CredentialBundle),
    /// An inbound message arrived
    Message(InboundMessage),
}

/// Connection-level update from the protocol client.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionUpdate {
    /// A login QR challenge; `code` is the renderable QR payload
    QrChallenge {
        /// QR payload bytes as supplied by the protocol client
        code: Vec<u8>,
    },
    /// The socket is open and authenticated
    Open,
    /// The socket closed
    Closed {
        /// Why the socket closed
        reason: CloseReason,
    },
}

/// Classification of a socket close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Credentials were invalidated by the remote end; terminal
    LoggedOut,
    /// Another connection replaced this stream for the same account
    StreamConflict,
    /// Recoverable network-level loss
    ConnectionLost,
    /// Any other close code reported by the protocol client
    Other(String),
}

impl CloseReason {
    /// Whether this close invalidates the credentials (terminal).
    pub fn is_logged_out(&self) -> bool {
        matches!(self, CloseReason::LoggedOut)
    }

    /// Whether this close indicates the stream was replaced; reconnecting
    /// immediately would just bounce the other client, so these get an
    /// extended cooldown.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CloseReason::StreamConflict)
    }

    /// The typed error for this close, as surfaced in status snapshots.
    pub fn to_error(&self, session: &SessionId) -> Error {
        match self {
            CloseReason::LoggedOut => Error::LoggedOut(session.clone()),
            CloseReason::StreamConflict => {
                Error::Conflict("stream replaced by another client".to_string())
            }
            CloseReason::ConnectionLost => Error::Transient("connection lost".to_string()),
            CloseReason::Other(code) => Error::Transient(format!("closed({code})")),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::LoggedOut => f.write_str("logged-out"),
            CloseReason::StreamConflict => f.write_str("stream-conflict"),
            CloseReason::ConnectionLost => f.write_str("connection-lost"),
            CloseReason::Other(code) => write!(f, "closed({code})"),
        }
    }
}

/// An inbound message delivered by the protocol client.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Protocol-level message id, used for read receipts
    pub id: String,
    /// Sender identifier (the remote address on the messaging network)
    pub sender: String,
    /// Plain-text content
    pub text: String,
    /// Whether this message originated from our own session
    pub from_self: bool,
}

/// Presence state sent to the messaging network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceUpdate {
    /// Online/keepalive presence
    Available,
    /// Composing indicator
    Typing,
    /// Composing stopped
    Paused,
}
