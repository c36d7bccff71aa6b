//! Error types for Chatwire.

use thiserror::Error;

use crate::SessionId;

/// Main error type for Chatwire operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No session is registered under the given id
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// The session was logged out by the remote end; credentials are purged
    /// and no reconnect is scheduled until an explicit restart
    #[error("Session logged out: {0}")]
    LoggedOut(SessionId),

    /// Recoverable socket loss; recovered automatically via backoff
    #[error("Transient disconnect: {0}")]
    Transient(String),

    /// The stream was replaced by another active connection for the same
    /// account; reconnects only after an extended cooldown
    #[error("Stream conflict: {0}")]
    Conflict(String),

    /// QR render or pairing-code request failure; the session stays in its
    /// pre-failure phase and the caller must re-invoke start
    #[error("Handshake failure: {0}")]
    Handshake(String),

    /// Credential store save failure; fatal for the current generation
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// A protocol client command failed
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_not_found_error() {
        let err = Error::SessionNotFound(SessionId::new("main"));
        assert_eq!(err.to_string(), "Session not found: main");
    }

    #[test]
    fn test_logged_out_error() {
        let err = Error::LoggedOut(SessionId::new("main"));
        assert_eq!(err.to_string(), "Session logged out: main");
    }

    #[test]
    fn test_transient_error() {
        let err = Error::Transient("connection reset".to_string());
        assert_eq!(err.to_string(), "Transient disconnect: connection reset");
    }

    #[test]
    fn test_conflict_error() {
        let err = Error::Conflict("replaced by another client".to_string());
        assert_eq!(err.to_string(), "Stream conflict: replaced by another client");
    }

    #[test]
    fn test_handshake_error() {
        let err = Error::Handshake("pairing code request rejected".to_string());
        assert_eq!(
            err.to_string(),
            "Handshake failure: pairing code request rejected"
        );
    }

    #[test]
    fn test_persistence_error() {
        let err = Error::Persistence("disk full".to_string());
        assert_eq!(err.to_string(), "Persistence failure: disk full");
    }

    #[test]
    fn test_config_error() {
        let err = Error::Config("empty command_prefix".to_string());
        assert_eq!(err.to_string(), "Configuration error: empty command_prefix");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
