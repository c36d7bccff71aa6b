//! Contracts for the external collaborators of the session core.
//!
//! The protocol client (the library that speaks the messaging network's wire
//! protocol) is consumed through [`ProtocolConnector`]/[`ProtocolClient`];
//! the session core never looks inside it. Credential persistence and
//! QR/pairing presentation go through [`CredentialStore`] and
//! [`ArtifactSink`].

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::event::{ClientEvent, PresenceUpdate};
use crate::{Result, SessionId};

/// Opaque per-session credential blob.
///
/// Produced and consumed by the protocol client; the session core only
/// moves it between the client and the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialBundle(Vec<u8>);

impl CredentialBundle {
    /// Wrap raw credential bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the bundle, returning the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Byte length of the bundle.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bundle is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for CredentialBundle {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// One live connection to the messaging network.
///
/// A client instance belongs to exactly one generation; commands issued
/// after the generation is retired may fail and the caller must tolerate
/// that.
pub trait ProtocolClient: Send + Sync + 'static {
    /// Send a text message to a remote address.
    fn send_message(&self, to: &str, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Update presence. `to: None` broadcasts own presence (used as the
    /// session keepalive); `Some(addr)` scopes it to one chat.
    fn send_presence(
        &self,
        to: Option<&str>,
        presence: PresenceUpdate,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Mark messages as read.
    fn read_messages(&self, ids: &[String]) -> impl Future<Output = Result<()>> + Send;

    /// Request a one-shot pairing code for phone-number login.
    fn request_pairing_code(&self, phone: &str) -> impl Future<Output = Result<String>> + Send;

    /// Log the session out, invalidating its credentials remotely.
    fn logout(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Factory opening one protocol client per generation.
pub trait ProtocolConnector: Send + Sync + 'static {
    /// The client type this connector produces.
    type Client: ProtocolClient;

    /// Open a socket to the messaging network, resuming from `credentials`
    /// when present. Returns the client handle plus its event stream; the
    /// stream closing means the socket is dead.
    fn connect(
        &self,
        credentials: Option<CredentialBundle>,
    ) -> impl Future<Output = Result<(Self::Client, mpsc::Receiver<ClientEvent>)>> + Send;
}

/// Durable storage for credential bundles, keyed by session id.
///
/// `save` must complete before the session core processes the next
/// credential update, so the most recent bundle is never lost under
/// back-to-back updates.
pub trait CredentialStore: Send + Sync + 'static {
    /// Load the bundle for a session, if one was persisted.
    fn load(
        &self,
        session: &SessionId,
    ) -> impl Future<Output = Result<Option<CredentialBundle>>> + Send;

    /// Persist a bundle, replacing any previous one.
    fn save(
        &self,
        session: &SessionId,
        bundle: &CredentialBundle,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove the persisted bundle. Called only on logout.
    fn delete(&self, session: &SessionId) -> impl Future<Output = Result<()>> + Send;
}

/// Presentation surface for login artifacts (QR payloads, pairing codes).
///
/// Writes overwrite the previous artifact for the session; they never
/// append.
pub trait ArtifactSink: Send + Sync + 'static {
    /// Publish a QR payload for out-of-band scanning.
    fn write_qr(&self, session: &SessionId, payload: &[u8])
        -> impl Future<Output = Result<()>> + Send;

    /// Remove the published QR payload, if any.
    fn clear_qr(&self, session: &SessionId) -> impl Future<Output = Result<()>> + Send;

    /// Publish a pairing code for phone-number login.
    fn write_pairing_code(
        &self,
        session: &SessionId,
        code: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove the published pairing code, if any.
    fn clear_pairing_code(&self, session: &SessionId) -> impl Future<Output = Result<()>> + Send;
}
