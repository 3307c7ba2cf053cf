//! The [`SessionStore`] contract (spec §4.3).

use interactsh_crypto::RsaKeys;
use interactsh_types::keypair::KeypairOrigin;
use interactsh_types::{ClientSession, EngineState};
use thiserror::Error;

/// Errors raised by a [`SessionStore`] implementation. Always convertible
/// into the top-level `EngineError` via `interactsh_types::error::PersistenceError`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read persisted state: {0}")]
    Read(String),

    #[error("failed to write persisted state: {0}")]
    Write(String),

    #[error("persisted state was corrupted and has been discarded: {0}")]
    Corrupted(String),
}

impl From<StoreError> for interactsh_types::error::PersistenceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Read(msg) => interactsh_types::error::PersistenceError::Read(msg),
            StoreError::Write(msg) => interactsh_types::error::PersistenceError::Write(msg),
            StoreError::Corrupted(msg) => {
                interactsh_types::error::PersistenceError::Corrupted(msg)
            }
        }
    }
}

impl From<StoreError> for interactsh_types::EngineError {
    fn from(err: StoreError) -> Self {
        interactsh_types::error::PersistenceError::from(err).into()
    }
}

/// Durable store for the RSA keypair, every live client's credentials, and
/// the non-confidential engine state (spec §4.3).
///
/// Implementations must never surface a corrupted confidential record as a
/// hard failure: [`SessionStore::load_or_generate_keypair`] falls through to
/// generating a fresh keypair, logging the corruption, rather than
/// propagating an error (spec §4.3, §7 `PersistenceCorrupted`).
pub trait SessionStore: Send + Sync {
    /// Load the persisted RSA keypair, or generate and persist a fresh one
    /// if none exists or the stored record is corrupt (spec §4.3).
    fn load_or_generate_keypair(
        &self,
    ) -> impl std::future::Future<Output = Result<(RsaKeys, KeypairOrigin), StoreError>> + Send;

    /// Upsert a client session by `server_url` (spec §4.3).
    fn save_session(
        &self,
        session: &ClientSession,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Load every persisted client session, order irrelevant (spec §4.3).
    fn load_sessions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ClientSession>, StoreError>> + Send;

    /// Remove one persisted session by `server_url` (spec §4.3).
    fn delete_session(
        &self,
        server_url: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Remove every persisted session (spec §4.3).
    fn clear_sessions(&self) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Load the non-confidential engine state file (spec §6), or a default
    /// empty state if none exists yet.
    fn load_state(&self) -> impl std::future::Future<Output = Result<EngineState, StoreError>> + Send;

    /// Persist the non-confidential engine state file (spec §6).
    fn save_state(
        &self,
        state: &EngineState,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
