//! In-memory credential store and artifact sink.
//!
//! Used by the session integration tests and by embedders that handle
//! persistence themselves. The store supports injectable save latency and
//! forced save failures so lifecycle edge cases are testable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chatwire_core::{ArtifactSink, CredentialBundle, CredentialStore, Error, Result, SessionId};

/// Credential store keeping bundles in process memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    bundles: Mutex<HashMap<SessionId, CredentialBundle>>,
    save_latency: Option<Duration>,
    fail_saves: AtomicBool,
    save_count: AtomicU64,
    delete_count: AtomicU64,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that sleeps for `latency` inside every save, to
    /// exercise back-to-back credential updates against slow persistence.
    pub fn with_save_latency(latency: Duration) -> Self {
        Self {
            save_latency: Some(latency),
            ..Self::default()
        }
    }

    /// Make every subsequent save fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// The bundle currently held for a session.
    pub fn bundle(&self, session: &SessionId) -> Option<CredentialBundle> {
        self.bundles.lock().unwrap().get(session).cloned()
    }

    /// Seed a bundle, as if a previous process had persisted it.
    pub fn insert(&self, session: SessionId, bundle: CredentialBundle) {
        self.bundles.lock().unwrap().insert(session, bundle);
    }

    /// Number of completed saves.
    pub fn save_count(&self) -> u64 {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Number of deletes.
    pub fn delete_count(&self) -> u64 {
        self.delete_count.load(Ordering::SeqCst)
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, session: &SessionId) -> Result<Option<CredentialBundle>> {
        Ok(self.bundles.lock().unwrap().get(session).cloned())
    }

    async fn save(&self, session: &SessionId, bundle: &CredentialBundle) -> Result<()> {
        if let Some(latency) = self.save_latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Persistence("save disabled by test".to_string()));
        }
        self.bundles
            .lock()
            .unwrap()
            .insert(session.clone(), bundle.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, session: &SessionId) -> Result<()> {
        self.bundles.lock().unwrap().remove(session);
        self.delete_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Artifact sink keeping the latest QR payload and pairing code in memory.
#[derive(Debug, Default)]
pub struct MemoryArtifactSink {
    qr: Mutex<HashMap<SessionId, Vec<u8>>>,
    pairing: Mutex<HashMap<SessionId, String>>,
    qr_writes: AtomicU64,
    pairing_writes: AtomicU64,
}

impl MemoryArtifactSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The QR payload currently published for a session.
    pub fn qr(&self, session: &SessionId) -> Option<Vec<u8>> {
        self.qr.lock().unwrap().get(session).cloned()
    }

    /// The pairing code currently published for a session.
    pub fn pairing_code(&self, session: &SessionId) -> Option<String> {
        self.pairing.lock().unwrap().get(session).cloned()
    }

    /// Total number of QR writes across all sessions.
    pub fn qr_writes(&self) -> u64 {
        self.qr_writes.load(Ordering::SeqCst)
    }

    /// Total number of pairing-code writes across all sessions.
    pub fn pairing_writes(&self) -> u64 {
        self.pairing_writes.load(Ordering::SeqCst)
    }
}

impl ArtifactSink for MemoryArtifactSink {
    async fn write_qr(&self, session: &SessionId, payload: &[u8]) -> Result<()> {
        self.qr
            .lock()
            .unwrap()
            .insert(session.clone(), payload.to_vec());
        self.qr_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_qr(&self, session: &SessionId) -> Result<()> {
        self.qr.lock().unwrap().remove(session);
        Ok(())
    }

    async fn write_pairing_code(&self, session: &SessionId, code: &str) -> Result<()> {
        self.pairing
            .lock()
            .unwrap()
            .insert(session.clone(), code.to_string());
        self.pairing_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_pairing_code(&self, session: &SessionId) -> Result<()> {
        self.pairing.lock().unwrap().remove(session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        let id = SessionId::new("main");

        assert!(store.load(&id).await.unwrap().is_none());

        let bundle = CredentialBundle::new(vec![1, 2, 3]);
        store.save(&id, &bundle).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), Some(bundle));
        assert_eq!(store.save_count(), 1);

        store.delete(&id).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_none());
        assert_eq!(store.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_store_save_replaces_previous() {
        let store = MemoryCredentialStore::new();
        let id = SessionId::new("main");

        store.save(&id, &CredentialBundle::new(vec![1])).await.unwrap();
        store.save(&id, &CredentialBundle::new(vec![2])).await.unwrap();

        assert_eq!(store.bundle(&id), Some(CredentialBundle::new(vec![2])));
    }

    #[tokio::test]
    async fn test_store_forced_failure() {
        let store = MemoryCredentialStore::new();
        let id = SessionId::new("main");

        store.set_fail_saves(true);
        let result = store.save(&id, &CredentialBundle::new(vec![1])).await;
        assert!(matches!(result, Err(Error::Persistence(_))));
        assert!(store.bundle(&id).is_none());
    }

    #[tokio::test]
    async fn test_sink_overwrites_artifacts() {
        let sink = MemoryArtifactSink::new();
        let id = SessionId::new("main");

        sink.write_pairing_code(&id, "AAAA-1111").await.unwrap();
        sink.write_pairing_code(&id, "BBBB-2222").await.unwrap();

        assert_eq!(sink.pairing_code(&id), Some("BBBB-2222".to_string()));
        assert_eq!(sink.pairing_writes(), 2);
    }

    #[tokio::test]
    async fn test_sink_clear_is_idempotent() {
        let sink = MemoryArtifactSink::new();
        let id = SessionId::new("main");

        sink.write_qr(&id, b"qr-payload").await.unwrap();
        sink.clear_qr(&id).await.unwrap();
        sink.clear_qr(&id).await.unwrap();
        assert!(sink.qr(&id).is_none());

        sink.clear_pairing_code(&id).await.unwrap();
        assert!(sink.pairing_code(&id).is_none());
    }
}
