//! # interactsh-store
//!
//! Session Persistence (spec §4.3): a [`SessionStore`] trait plus a
//! filesystem-backed implementation that keeps the RSA keypair and every
//! live client's credentials encrypted at rest, and the non-confidential
//! engine state (interaction log, URL registry, filter) as a plain JSON
//! file alongside it (spec §6 "Persisted state layout").
//!
//! The engine never touches plaintext credentials outside this crate.

pub mod cipher_at_rest;
pub mod file_store;
pub mod store;

pub use file_store::FileSessionStore;
pub use store::{SessionStore, StoreError};
