//! RSA keypair persistence record (spec §3 "RSAKeypair", §4.3).

use serde::{Deserialize, Serialize};

/// The process-wide RSA-2048 keypair, serialized as decimal-string-encoded
/// arbitrary-precision integers so it round-trips through JSON without
/// losing precision (spec §4.3 "rsa_keypair").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RsaKeypairRecord {
    /// Modulus n, decimal string.
    pub n: String,
    /// Public exponent e, decimal string (always "65537").
    pub e: String,
    /// Private exponent d, decimal string.
    pub d: String,
    /// Prime p, decimal string.
    pub p: String,
    /// Prime q, decimal string.
    pub q: String,
    /// CRT exponent dp = d mod (p-1), decimal string.
    pub dp: String,
    /// CRT exponent dq = d mod (q-1), decimal string.
    pub dq: String,
    /// CRT coefficient qi = q^-1 mod p, decimal string.
    pub qi: String,
}

/// Outcome of `load_or_generate_keypair` (spec §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeypairOrigin {
    /// Loaded from a previously-persisted record.
    Resumed,
    /// No usable record existed; a fresh keypair was generated.
    Generated,
}
