//! Unified error taxonomy surfaced at the facade boundary (spec §7).

use thiserror::Error;

/// Top-level error type returned by every External Interface Facade operation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Configuration-level errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("engine has not been started")]
    NotStarted,

    #[error("engine has already been started")]
    AlreadyStarted,

    #[error("invalid polling interval: {0}ms (must be between 5000ms and 3600000ms)")]
    InvalidPollingInterval(u64),
}

/// Crypto Core errors (spec §4.1).
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("RSA keypair has not been initialized")]
    KeysNotInitialized,

    #[error("OAEP padding check failed")]
    InvalidPadding,

    #[error("invalid length: {0}")]
    InvalidLength(String),

    #[error("decrypted payload was not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed PEM document: {0}")]
    PemMalformed(String),
}

/// Protocol Client errors (spec §4.2).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("registration failed: {0}")]
    RegistrationFailed(String),

    #[error("deregistration failed: {0}")]
    DeregistrationFailed(String),

    #[error("server rejected credentials (401)")]
    AuthFailure,

    #[error("server-side session expired")]
    SessionExpired,

    #[error("transient poll error: {0}")]
    TransientPollError(String),
}

/// Protocol Client state-machine violations (spec §4.2).
#[derive(Debug, Error)]
pub enum StateError {
    #[error("client is not polling")]
    ClientNotPolling,

    #[error("client is already polling")]
    ClientAlreadyPolling,

    #[error("client is closed")]
    ClientClosed,
}

/// Session Persistence errors (spec §4.3).
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read persisted state: {0}")]
    Read(String),

    #[error("failed to write persisted state: {0}")]
    Write(String),

    #[error("persisted state was corrupted and has been discarded: {0}")]
    Corrupted(String),
}
