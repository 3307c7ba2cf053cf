//! # interactsh-engine
//!
//! The Multi-Server Manager (spec §4.4) and External Interface Facade
//! (spec §4.5): the library a host embeds to register encrypted sessions
//! with one or more Interactsh servers, mint disposable subdomains, and
//! long-poll each server for out-of-band interactions.
//!
//! This crate owns no transport or TLS stack: the host hands in a ready
//! `reqwest::Client` and a [`interactsh_store::SessionStore`] implementation
//! (spec §1 Non-goals).

pub mod attribution;
pub mod events;
pub mod manager;
pub mod servers;

pub use events::EventBus;
pub use manager::Manager;
pub use servers::{pick_random_server, DEFAULT_SERVERS};

pub use interactsh_types::{
    ActiveUrl, ClientSession, EngineConfig, EngineError, EngineEvent, EngineState, EngineStatus,
    Interaction,
};
