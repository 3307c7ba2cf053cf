//! # interactsh-protocol
//!
//! The per-server Protocol Client state machine (spec §4.2): register, poll
//! (background loop + forced single-shot), and deregister against one
//! Interactsh v1 server.

pub mod client;
pub mod state;
pub mod wire;

pub use client::{InteractionEvent, ProtocolClient};
pub use state::ClientState;

use interactsh_types::error::{ProtocolError, StateError};
use thiserror::Error;

/// Errors a `ProtocolClient` can return. Always convertible into the
/// top-level `EngineError` via `interactsh_types::EngineError`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl From<ClientError> for interactsh_types::EngineError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Protocol(e) => e.into(),
            ClientError::State(e) => e.into(),
        }
    }
}
