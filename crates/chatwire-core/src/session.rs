//! Session identity, lifecycle states, and observable status snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for one logical authenticated session.
///
/// Session ids are caller-chosen names (e.g. `"main"`); they key the
/// credential store directory and the status registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The session id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SessionId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Connection state of a session. Single source of truth per session id.
///
/// Valid transitions:
/// `Idle → Connecting → {AwaitingQr | AwaitingPairing} → Open`, with
/// `Open → Reconnecting → Connecting` on recoverable loss and
/// `{Connecting, AwaitingQr, AwaitingPairing, Open} → LoggedOut` on terminal
/// auth invalidation. `Disconnected` is a transient marker immediately
/// followed by either `Reconnecting` or `LoggedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No generation is active for this session
    Idle,
    /// A protocol client is being constructed / the socket is opening
    Connecting,
    /// A QR challenge was received and awaits an out-of-band scan
    AwaitingQr,
    /// A pairing code was issued and awaits entry on the phone
    AwaitingPairing,
    /// The socket is open and authenticated
    Open,
    /// The socket dropped; a transient marker before the next state
    Disconnected,
    /// A reconnect is scheduled after the backoff delay
    Reconnecting,
    /// Credentials were invalidated; terminal until an explicit restart
    LoggedOut,
}

impl SessionState {
    /// Whether this state is terminal (no reconnect will be scheduled).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::LoggedOut)
    }

    /// Whether the session is currently usable for outbound traffic.
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open)
    }

    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingQr => "awaiting_qr",
            SessionState::AwaitingPairing => "awaiting_pairing",
            SessionState::Open => "open",
            SessionState::Disconnected => "disconnected",
            SessionState::Reconnecting => "reconnecting",
            SessionState::LoggedOut => "logged_out",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic token fencing one protocol client instance and its timers.
///
/// At most one generation per session is active at any time; events and
/// timer callbacks carrying an older token are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Wrap a raw generation counter value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw counter value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Immutable status value for external observation.
///
/// Replaced wholesale on every transition; observers never see a partially
/// updated snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Current connection state
    pub state: SessionState,
    /// When this snapshot was produced
    pub updated_at: DateTime<Utc>,
    /// Phone number supplied to `start`, if any
    pub phone_number: Option<String>,
    /// Most recent error surfaced to observers, if any
    pub last_error: Option<String>,
}

impl StatusSnapshot {
    /// Snapshot for a session with no active generation.
    pub fn idle() -> Self {
        Self::new(SessionState::Idle, None, None)
    }

    /// Build a snapshot stamped with the current time.
    pub fn new(
        state: SessionState,
        phone_number: Option<String>,
        last_error: Option<String>,
    ) -> Self {
        Self {
            state,
            updated_at: Utc::now(),
            phone_number,
            last_error,
        }
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new("main");
        assert_eq!(id.to_string(), "main");
        assert_eq!(id.as_str(), "main");
    }

    #[test]
    fn test_session_id_from_str() {
        let id: SessionId = "work".into();
        assert_eq!(id, SessionId::new("work"));
    }

    #[test]
    fn test_state_serde_snake_case() {
        let json = serde_json::to_string(&SessionState::AwaitingQr).unwrap();
        assert_eq!(json, "\"awaiting_qr\"");

        let state: SessionState = serde_json::from_str("\"logged_out\"").unwrap();
        assert_eq!(state, SessionState::LoggedOut);
    }

    #[test]
    fn test_state_display_matches_serde() {
        for state in [
            SessionState::Idle,
            SessionState::Connecting,
            SessionState::AwaitingQr,
            SessionState::AwaitingPairing,
            SessionState::Open,
            SessionState::Disconnected,
            SessionState::Reconnecting,
            SessionState::LoggedOut,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }

    #[test]
    fn test_state_terminal() {
        assert!(SessionState::LoggedOut.is_terminal());
        assert!(!SessionState::Reconnecting.is_terminal());
        assert!(!SessionState::Disconnected.is_terminal());
    }

    #[test]
    fn test_generation_ordering() {
        assert!(Generation::new(2) > Generation::new(1));
        assert_eq!(Generation::new(3).value(), 3);
        assert_eq!(Generation::new(3).to_string(), "gen3");
    }

    #[test]
    fn test_snapshot_defaults_to_idle() {
        let snap = StatusSnapshot::default();
        assert_eq!(snap.state, SessionState::Idle);
        assert!(snap.phone_number.is_none());
        assert!(snap.last_error.is_none());
    }

    #[test]
    fn test_snapshot_serializes_state_and_timestamp() {
        let snap = StatusSnapshot::new(
            SessionState::Open,
            Some("15551234567".to_string()),
            None,
        );
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"state\":\"open\""));
        assert!(json.contains("\"phone_number\":\"15551234567\""));
        assert!(json.contains("updated_at"));
    }
}
