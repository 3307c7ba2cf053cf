//! # interactsh-types
//!
//! Shared data model for the Interaction Client Engine: the RSA keypair
//! record, per-server client sessions, minted URLs, observed interactions,
//! process-wide engine state, the typed host configuration, the events the
//! engine emits, and the unified error taxonomy.
//!
//! This crate performs no I/O and owns no cryptographic logic — it only
//! defines the shapes other crates operate on.

pub mod config;
pub mod error;
pub mod events;
pub mod interaction;
pub mod keypair;
pub mod session;
pub mod state;
pub mod url;

pub use config::EngineConfig;
pub use error::EngineError;
pub use events::EngineEvent;
pub use interaction::Interaction;
pub use keypair::RsaKeypairRecord;
pub use session::ClientSession;
pub use state::{EngineState, EngineStatus};
pub use url::ActiveUrl;

pub type Result<T> = std::result::Result<T, EngineError>;
