//! Session manager: the control surface for starting, stopping, and
//! observing sessions.
//!
//! `start` performs the first connect inline so callers see handshake
//! failures directly, then hands the client to a long-lived supervisor
//! task. Stopping or restarting a session retires its generation, which
//! turns every callback, timer, and in-flight side effect of the old
//! generation into a no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chatwire_core::{
    ArtifactSink, ConfigHandle, CredentialStore, Error, ProtocolClient, ProtocolConnector, Result,
    SessionId, SessionState, StatusSnapshot,
};
use chatwire_router::CommandRouter;

use crate::backoff::BackoffPolicy;
use crate::driver::{supervise, SessionRuntime};
use crate::shared::SessionShared;

/// Timing knobs for the session lifecycle.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// How long an unscanned QR challenge stays valid before the client is
    /// torn down and replaced
    pub qr_refresh: Duration,
    /// Keepalive presence interval while a session is open
    pub heartbeat: Duration,
    /// How long the typing indicator is shown before a simulated-typing
    /// sequence completes
    pub typing_duration: Duration,
    /// Upper bound on any single outbound client call
    pub send_timeout: Duration,
    /// Reconnect backoff parameters
    pub backoff: BackoffPolicy,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            qr_refresh: Duration::from_secs(45),
            heartbeat: Duration::from_secs(30),
            typing_duration: Duration::from_millis(800),
            send_timeout: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
        }
    }
}

struct SessionEntry {
    shared: Arc<SessionShared>,
    task: Option<JoinHandle<()>>,
}

/// Owns all sessions and their supervisor tasks.
///
/// Generic over the protocol connector, the credential store, and the
/// artifact sink, so tests drive the full lifecycle with in-memory fakes.
pub struct SessionManager<N, S, A> {
    connector: Arc<N>,
    store: Arc<S>,
    artifacts: Arc<A>,
    router: CommandRouter,
    config: SessionManagerConfig,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl<N, S, A> SessionManager<N, S, A>
where
    N: ProtocolConnector,
    S: CredentialStore,
    A: ArtifactSink,
{
    /// Create a manager with default timing parameters.
    pub fn new(
        connector: Arc<N>,
        store: Arc<S>,
        artifacts: Arc<A>,
        router_config: ConfigHandle,
    ) -> Self {
        Self::with_config(
            connector,
            store,
            artifacts,
            router_config,
            SessionManagerConfig::default(),
        )
    }

    /// Create a manager with explicit timing parameters.
    pub fn with_config(
        connector: Arc<N>,
        store: Arc<S>,
        artifacts: Arc<A>,
        router_config: ConfigHandle,
        config: SessionManagerConfig,
    ) -> Self {
        Self {
            connector,
            store,
            artifacts,
            router: CommandRouter::new(router_config),
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start (or restart) a session.
    ///
    /// With a phone number the session authenticates by pairing code, which
    /// is requested inline and written to the artifact sink before this
    /// call returns. Without one, authentication happens via QR challenges
    /// delivered to the supervisor.
    ///
    /// A session that is already running is superseded: its generation is
    /// retired before the new connect begins. On error the session is left
    /// in `Connecting` with `last_error` set, and the caller decides
    /// whether to start again.
    pub async fn start(&self, id: impl Into<SessionId>, phone: Option<String>) -> Result<()> {
        let id = id.into();
        let (shared, gen) = {
            let mut sessions = self.sessions.lock().unwrap();
            let entry = sessions.entry(id.clone()).or_insert_with(|| SessionEntry {
                shared: Arc::new(SessionShared::new(id.clone())),
                task: None,
            });
            if let Some(task) = entry.task.take() {
                info!(session = %id, "superseding running session");
                task.abort();
            }
            let shared = Arc::clone(&entry.shared);
            shared.set_phone(phone.clone());
            let gen = shared.take_over();
            (shared, gen)
        };

        shared.publish(gen, SessionState::Connecting, None);

        let credentials = match self.store.load(&id).await {
            Ok(bundle) => {
                if bundle.is_some() {
                    debug!(session = %id, "resuming from persisted credentials");
                }
                bundle
            }
            Err(e) => {
                shared.publish(gen, SessionState::Connecting, Some(e.to_string()));
                return Err(e);
            }
        };

        let (client, events) = match self.connector.connect(credentials).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(session = %id, error = %e, "initial connect failed");
                shared.publish(gen, SessionState::Connecting, Some(e.to_string()));
                return Err(e);
            }
        };
        let client = Arc::new(client);

        let mut initial_state = SessionState::Connecting;
        if let Some(phone) = phone.as_deref() {
            if let Err(e) = self.request_pairing(&id, phone, client.as_ref()).await {
                shared.publish(gen, SessionState::Connecting, Some(e.to_string()));
                return Err(e);
            }
            initial_state = SessionState::AwaitingPairing;
            shared.publish(gen, initial_state, None);
        }

        let runtime = SessionRuntime {
            shared: Arc::clone(&shared),
            connector: Arc::clone(&self.connector),
            store: Arc::clone(&self.store),
            artifacts: Arc::clone(&self.artifacts),
            router: self.router.clone(),
            config: self.config.clone(),
        };
        let handle = tokio::spawn(supervise(runtime, gen, client, events, initial_state));

        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(&id) {
            Some(entry) if entry.shared.is_active(gen) => {
                entry.task = Some(handle);
            }
            _ => {
                // Superseded while we were connecting.
                handle.abort();
            }
        }
        Ok(())
    }

    /// Request a pairing code and publish it, invalidating any previous
    /// artifact first so a stale code is never observable next to a fresh
    /// one.
    async fn request_pairing(
        &self,
        id: &SessionId,
        phone: &str,
        client: &N::Client,
    ) -> Result<()> {
        self.artifacts
            .clear_pairing_code(id)
            .await
            .map_err(|e| Error::Handshake(format!("pairing artifact clear failed: {e}")))?;
        let code = client
            .request_pairing_code(phone)
            .await
            .map_err(|e| Error::Handshake(format!("pairing code request failed: {e}")))?;
        self.artifacts
            .write_pairing_code(id, &code)
            .await
            .map_err(|e| Error::Handshake(format!("pairing artifact write failed: {e}")))?;
        info!(session = %id, "pairing code issued");
        Ok(())
    }

    /// Stop a session, retiring its generation and aborting its supervisor.
    /// The session remains known and reports `Idle` until started again.
    pub fn stop(&self, id: &SessionId) -> Result<()> {
        let (shared, token, task) = {
            let mut sessions = self.sessions.lock().unwrap();
            let entry = sessions
                .get_mut(id)
                .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
            let token = entry.shared.retire();
            (Arc::clone(&entry.shared), token, entry.task.take())
        };
        if let Some(task) = task {
            task.abort();
        }
        shared.publish_stopped(token);
        info!(session = %id, "session stopped");
        Ok(())
    }

    /// The latest status snapshot for a session.
    pub fn status(&self, id: &SessionId) -> Result<StatusSnapshot> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(id)
            .map(|entry| entry.shared.snapshot())
            .ok_or_else(|| Error::SessionNotFound(id.clone()))
    }

    /// Snapshot every known session.
    pub fn list(&self) -> Vec<(SessionId, StatusSnapshot)> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .iter()
            .map(|(id, entry)| (id.clone(), entry.shared.snapshot()))
            .collect()
    }

    /// Number of known sessions, running or not.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Stop every known session.
    pub fn stop_all(&self) {
        let ids: Vec<SessionId> = {
            let sessions = self.sessions.lock().unwrap();
            sessions.keys().cloned().collect()
        };
        for id in ids {
            let _ = self.stop(&id);
        }
    }
}
