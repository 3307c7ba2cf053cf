//! # interactsh-crypto
//!
//! Cryptographic primitives for the Interactsh v1 wire protocol (spec §4.1).
//! No algorithm negotiation — RSA-2048/OAEP/SHA-256 and AES-256-CFB are
//! fixed by the protocol.
//!
//! ## Modules
//!
//! - [`rsa_keys`] — keypair generation, persistence round-trip, PEM export
//! - [`aes_cfb`] — AES-256-CFB symmetric decryption, key normalization
//! - [`decrypt`] — the hybrid decrypt_interaction pipeline
//! - [`ids`] — CSPRNG correlation ids, secret keys, and nonces

pub mod aes_cfb;
pub mod decrypt;
pub mod ids;
pub mod rsa_keys;

pub use decrypt::decrypt_interaction;
pub use ids::generate_random_id;
pub use rsa_keys::RsaKeys;

pub use interactsh_types::error::CryptoError;
