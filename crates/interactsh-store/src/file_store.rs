//! Filesystem-backed [`SessionStore`] (spec §4.3).
//!
//! Layout under `data_dir`:
//! - `master.key` — the local AES encryption key (spec's "confidential
//!   key-value store" substrate), 0600 permissions on Unix.
//! - `rsa_keys.enc` — encrypted `RsaKeypairRecord` JSON (spec §6 `RSA_KEYS`).
//! - `client_sessions.enc` — encrypted `Vec<ClientSession>` JSON (spec §6
//!   `CLIENT_SESSIONS`).
//! - `state.json` — plaintext `EngineState` (spec §6 "Non-confidential
//!   state").

use std::path::{Path, PathBuf};

use interactsh_crypto::RsaKeys;
use interactsh_types::keypair::{KeypairOrigin, RsaKeypairRecord};
use interactsh_types::{ClientSession, EngineState};
use tracing::{info, warn};

use crate::cipher_at_rest::{self, MasterKey};
use crate::store::{SessionStore, StoreError};

/// A [`SessionStore`] backed by plain files under a data directory.
pub struct FileSessionStore {
    data_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn master_key_path(&self) -> PathBuf {
        self.data_dir.join("master.key")
    }

    fn rsa_keys_path(&self) -> PathBuf {
        self.data_dir.join("rsa_keys.enc")
    }

    fn sessions_path(&self) -> PathBuf {
        self.data_dir.join("client_sessions.enc")
    }

    fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    async fn ensure_data_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| StoreError::Write(format!("create data dir: {e}")))
    }

    async fn load_or_create_master_key(&self) -> Result<MasterKey, StoreError> {
        let path = self.master_key_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.len() == 32 => {
                let mut fixed = [0u8; 32];
                fixed.copy_from_slice(&bytes);
                Ok(MasterKey::from_bytes(fixed))
            }
            Ok(_) => {
                warn!("master key file has unexpected length, regenerating");
                self.write_new_master_key(&path).await
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.write_new_master_key(&path).await
            }
            Err(e) => Err(StoreError::Read(format!("read master key: {e}"))),
        }
    }

    async fn write_new_master_key(&self, path: &Path) -> Result<MasterKey, StoreError> {
        let key = MasterKey::generate();
        write_owner_only(path, key.as_bytes())
            .await
            .map_err(|e| StoreError::Write(format!("write master key: {e}")))?;
        Ok(key)
    }

    async fn read_encrypted(&self, path: &Path, key: &MasterKey) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(blob) => Ok(Some(cipher_at_rest::open(key, &blob)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read(format!("{}: {e}", path.display()))),
        }
    }

    async fn write_encrypted(&self, path: &Path, key: &MasterKey, plaintext: &[u8]) -> Result<(), StoreError> {
        let blob = cipher_at_rest::seal(key, plaintext);
        tokio::fs::write(path, blob)
            .await
            .map_err(|e| StoreError::Write(format!("{}: {e}", path.display())))
    }
}

impl SessionStore for FileSessionStore {
    async fn load_or_generate_keypair(&self) -> Result<(RsaKeys, KeypairOrigin), StoreError> {
        self.ensure_data_dir().await?;
        let master_key = self.load_or_create_master_key().await?;

        match self.read_encrypted(&self.rsa_keys_path(), &master_key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<RsaKeypairRecord>(&bytes) {
                Ok(record) => match RsaKeys::from_record(&record) {
                    Ok(keys) => {
                        info!("resumed RSA keypair from persistence");
                        return Ok((keys, KeypairOrigin::Resumed));
                    }
                    Err(e) => {
                        warn!(error = %e, "persisted RSA keypair record was invalid, regenerating");
                    }
                },
                Err(e) => {
                    warn!(error = %e, "persisted RSA keypair JSON was corrupted, regenerating");
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "failed to read persisted RSA keypair, regenerating");
            }
        }

        let keys = RsaKeys::generate().map_err(|e| StoreError::Write(e.to_string()))?;
        let record = keys.to_record();
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| StoreError::Write(format!("serialize keypair: {e}")))?;
        self.write_encrypted(&self.rsa_keys_path(), &master_key, &bytes)
            .await?;
        info!("generated and persisted a new RSA keypair");
        Ok((keys, KeypairOrigin::Generated))
    }

    async fn save_session(&self, session: &ClientSession) -> Result<(), StoreError> {
        self.ensure_data_dir().await?;
        let mut sessions = self.load_sessions().await?;
        sessions.retain(|s| s.server_url != session.server_url);
        sessions.push(session.clone());
        self.write_sessions(&sessions).await
    }

    async fn load_sessions(&self) -> Result<Vec<ClientSession>, StoreError> {
        self.ensure_data_dir().await?;
        let master_key = self.load_or_create_master_key().await?;
        match self
            .read_encrypted(&self.sessions_path(), &master_key)
            .await?
        {
            None => Ok(Vec::new()),
            Some(bytes) => match serde_json::from_slice::<Vec<ClientSession>>(&bytes) {
                Ok(sessions) => Ok(sessions),
                Err(e) => {
                    warn!(error = %e, "persisted client sessions were corrupted, discarding");
                    Ok(Vec::new())
                }
            },
        }
    }

    async fn delete_session(&self, server_url: &str) -> Result<(), StoreError> {
        let mut sessions = self.load_sessions().await?;
        sessions.retain(|s| s.server_url != server_url);
        self.write_sessions(&sessions).await
    }

    async fn clear_sessions(&self) -> Result<(), StoreError> {
        self.write_sessions(&[]).await
    }

    async fn load_state(&self) -> Result<EngineState, StoreError> {
        match tokio::fs::read(self.state_path()).await {
            Ok(bytes) => match serde_json::from_slice::<EngineState>(&bytes) {
                Ok(state) => Ok(state),
                Err(e) => {
                    warn!(error = %e, "persisted engine state was corrupted, starting fresh");
                    Ok(EngineState::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EngineState::default()),
            Err(e) => Err(StoreError::Read(format!("read state.json: {e}"))),
        }
    }

    async fn save_state(&self, state: &EngineState) -> Result<(), StoreError> {
        self.ensure_data_dir().await?;
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| StoreError::Write(format!("serialize state: {e}")))?;
        tokio::fs::write(self.state_path(), bytes)
            .await
            .map_err(|e| StoreError::Write(format!("write state.json: {e}")))
    }
}

impl FileSessionStore {
    async fn write_sessions(&self, sessions: &[ClientSession]) -> Result<(), StoreError> {
        self.ensure_data_dir().await?;
        let master_key = self.load_or_create_master_key().await?;
        let bytes = serde_json::to_vec(sessions)
            .map_err(|e| StoreError::Write(format!("serialize sessions: {e}")))?;
        self.write_encrypted(&self.sessions_path(), &master_key, &bytes)
            .await
    }
}

/// Create (or truncate) `path` and write `bytes` to it, applying owner-only
/// permissions atomically at creation time on Unix so the master key is
/// never briefly readable under the process umask.
#[cfg(unix)]
async fn write_owner_only(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    file.write_all(bytes).await
}

#[cfg(not(unix))]
async fn write_owner_only(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    #[tokio::test]
    async fn generates_then_resumes_identical_modulus() {
        let dir = temp_dir();
        let store = FileSessionStore::new(dir.path());

        let (keys, origin) = store.load_or_generate_keypair().await.expect("generate");
        assert_eq!(origin, KeypairOrigin::Generated);
        let n_before = keys.to_record().n;

        let store2 = FileSessionStore::new(dir.path());
        let (resumed, origin2) = store2.load_or_generate_keypair().await.expect("resume");
        assert_eq!(origin2, KeypairOrigin::Resumed);
        assert_eq!(resumed.to_record().n, n_before);
    }

    #[tokio::test]
    async fn save_load_delete_session_round_trips() {
        let dir = temp_dir();
        let store = FileSessionStore::new(dir.path());

        let session = ClientSession::new("oast.site", "cid1234567890123456", "secretkey123", None);
        store.save_session(&session).await.expect("save");

        let loaded = store.load_sessions().await.expect("load");
        assert_eq!(loaded, vec![session.clone()]);

        store
            .delete_session(&session.server_url)
            .await
            .expect("delete");
        assert!(store.load_sessions().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn save_session_upserts_by_server_url() {
        let dir = temp_dir();
        let store = FileSessionStore::new(dir.path());

        let first = ClientSession::new("oast.site", "cid1111111111111111", "secretkey111", None);
        let updated = ClientSession::new("oast.site", "cid2222222222222222", "secretkey222", None);
        store.save_session(&first).await.expect("save first");
        store.save_session(&updated).await.expect("save updated");

        let loaded = store.load_sessions().await.expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], updated);
    }

    #[tokio::test]
    async fn corrupted_sessions_file_falls_through_to_empty() {
        let dir = temp_dir();
        let store = FileSessionStore::new(dir.path());
        store.ensure_data_dir().await.expect("mkdir");
        let master_key = store.load_or_create_master_key().await.expect("master key");
        store
            .write_encrypted(&store.sessions_path(), &master_key, b"not json")
            .await
            .expect("write garbage");

        let loaded = store.load_sessions().await.expect("load falls through");
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn state_round_trips() {
        let dir = temp_dir();
        let store = FileSessionStore::new(dir.path());

        let mut state = EngineState::default();
        state.filter = "proto==http".to_string();
        state.interaction_counter = 3;
        store.save_state(&state).await.expect("save state");

        let loaded = store.load_state().await.expect("load state");
        assert_eq!(loaded.filter, "proto==http");
        assert_eq!(loaded.interaction_counter, 3);
    }

    #[tokio::test]
    async fn missing_state_file_returns_default() {
        let dir = temp_dir();
        let store = FileSessionStore::new(dir.path());
        let loaded = store.load_state().await.expect("load default");
        assert_eq!(loaded.interaction_counter, 0);
        assert!(loaded.interactions.is_empty());
    }
}
