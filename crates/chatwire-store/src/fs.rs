//! Filesystem-backed credential store and artifact sink.
//!
//! Credentials live at `<root>/<session>/creds.bin`. Saves go through a
//! temp file, fsync, and atomic rename, so a crash mid-save leaves the
//! previous bundle intact rather than a torn write. Artifacts live at
//! `<root>/<session>/qr.png` and `<root>/<session>/pairing.txt`; writes
//! overwrite the previous artifact, clears remove the file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use chatwire_core::{ArtifactSink, CredentialBundle, CredentialStore, Error, Result, SessionId};

const CREDS_FILE: &str = "creds.bin";
const CREDS_TMP_FILE: &str = "creds.bin.tmp";
const QR_FILE: &str = "qr.png";
const PAIRING_FILE: &str = "pairing.txt";

/// Session ids become directory names; reject anything that would escape
/// the store root.
fn session_dir(root: &Path, session: &SessionId) -> Result<PathBuf> {
    let name = session.as_str();
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::Config(format!(
            "session id not usable as a directory name: {name:?}"
        )));
    }
    Ok(root.join(name))
}

async fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Credential store persisting bundles under a root directory.
#[derive(Debug, Clone)]
pub struct FsCredentialStore {
    root: PathBuf,
}

impl FsCredentialStore {
    /// Create a store rooted at the given directory (e.g. `./auth`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn creds_path(&self, session: &SessionId) -> Result<PathBuf> {
        Ok(session_dir(&self.root, session)?.join(CREDS_FILE))
    }
}

impl CredentialStore for FsCredentialStore {
    async fn load(&self, session: &SessionId) -> Result<Option<CredentialBundle>> {
        let path = self.creds_path(session)?;
        match fs::read(&path).await {
            Ok(bytes) => {
                debug!(session = %session, len = bytes.len(), "loaded credential bundle");
                Ok(Some(CredentialBundle::new(bytes)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, session: &SessionId, bundle: &CredentialBundle) -> Result<()> {
        let dir = session_dir(&self.root, session)?;
        fs::create_dir_all(&dir).await?;

        let tmp = dir.join(CREDS_TMP_FILE);
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bundle.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, dir.join(CREDS_FILE)).await?;
        debug!(session = %session, len = bundle.len(), "persisted credential bundle");
        Ok(())
    }

    async fn delete(&self, session: &SessionId) -> Result<()> {
        let dir = session_dir(&self.root, session)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(session = %session, "deleted credential directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Artifact sink writing QR payloads and pairing codes under a root
/// directory (e.g. `./public`), where a dashboard can serve them.
#[derive(Debug, Clone)]
pub struct FsArtifactSink {
    root: PathBuf,
}

impl FsArtifactSink {
    /// Create a sink rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn write(&self, session: &SessionId, file: &str, contents: &[u8]) -> Result<()> {
        let dir = session_dir(&self.root, session)?;
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(file), contents).await?;
        Ok(())
    }
}

impl ArtifactSink for FsArtifactSink {
    async fn write_qr(&self, session: &SessionId, payload: &[u8]) -> Result<()> {
        self.write(session, QR_FILE, payload).await?;
        info!(session = %session, "QR payload updated");
        Ok(())
    }

    async fn clear_qr(&self, session: &SessionId) -> Result<()> {
        remove_file_if_exists(&session_dir(&self.root, session)?.join(QR_FILE)).await
    }

    async fn write_pairing_code(&self, session: &SessionId, code: &str) -> Result<()> {
        self.write(session, PAIRING_FILE, code.as_bytes()).await?;
        info!(session = %session, "pairing code updated");
        Ok(())
    }

    async fn clear_pairing_code(&self, session: &SessionId) -> Result<()> {
        remove_file_if_exists(&session_dir(&self.root, session)?.join(PAIRING_FILE)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static DIR_SEQ: AtomicU64 = AtomicU64::new(0);

    fn temp_root(tag: &str) -> PathBuf {
        let seq = DIR_SEQ.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "chatwire-store-{tag}-{}-{seq}",
            std::process::id()
        ))
    }

    #[tokio::test]
    async fn test_fs_store_roundtrip() {
        let root = temp_root("creds");
        let store = FsCredentialStore::new(&root);
        let id = SessionId::new("main");

        assert!(store.load(&id).await.unwrap().is_none());

        let bundle = CredentialBundle::new(b"opaque-creds".to_vec());
        store.save(&id, &bundle).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), Some(bundle));

        store.delete(&id).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_none());

        let _ = fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_fs_store_save_replaces_previous() {
        let root = temp_root("replace");
        let store = FsCredentialStore::new(&root);
        let id = SessionId::new("main");

        store.save(&id, &CredentialBundle::new(vec![1])).await.unwrap();
        store.save(&id, &CredentialBundle::new(vec![2, 2])).await.unwrap();
        assert_eq!(
            store.load(&id).await.unwrap(),
            Some(CredentialBundle::new(vec![2, 2]))
        );

        let _ = fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_fs_store_delete_missing_is_ok() {
        let store = FsCredentialStore::new(temp_root("missing"));
        assert!(store.delete(&SessionId::new("ghost")).await.is_ok());
    }

    #[tokio::test]
    async fn test_fs_store_rejects_path_escaping_ids() {
        let store = FsCredentialStore::new(temp_root("escape"));
        for bad in ["", "..", "a/b", "a\\b"] {
            let result = store.load(&SessionId::new(bad)).await;
            assert!(result.is_err(), "id {bad:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_fs_sink_overwrite_and_clear() {
        let root = temp_root("artifacts");
        let sink = FsArtifactSink::new(&root);
        let id = SessionId::new("main");

        sink.write_pairing_code(&id, "AAAA-1111").await.unwrap();
        sink.write_pairing_code(&id, "BBBB-2222").await.unwrap();
        let on_disk = fs::read_to_string(root.join("main").join(PAIRING_FILE))
            .await
            .unwrap();
        assert_eq!(on_disk, "BBBB-2222");

        sink.write_qr(&id, b"qr-bytes").await.unwrap();
        sink.clear_qr(&id).await.unwrap();
        // Clearing twice is fine.
        sink.clear_qr(&id).await.unwrap();
        assert!(!root.join("main").join(QR_FILE).exists());

        let _ = fs::remove_dir_all(&root).await;
    }
}
