//! RSA-2048/OAEP keypair management (spec §4.1 `initialize_keys`,
//! `export_public_key_pem`, `decrypt_aes_key`).

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use num_bigint::{BigInt, BigUint as StdBigUint};
use num_traits::{One, Zero};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use interactsh_types::keypair::RsaKeypairRecord;

use crate::CryptoError;

/// The process-wide RSA-2048 keypair, generated once with e = 65537 and
/// stable for the lifetime of every live session (spec §3 "RSAKeypair").
pub struct RsaKeys {
    private_key: RsaPrivateKey,
}

impl RsaKeys {
    /// Generate a fresh RSA-2048 keypair with public exponent 65537.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048)
            .map_err(|e| CryptoError::InvalidLength(format!("key generation failed: {e}")))?;
        Ok(Self { private_key })
    }

    /// Reconstruct a keypair from a persisted record (spec §4.3).
    pub fn from_record(record: &RsaKeypairRecord) -> Result<Self, CryptoError> {
        let n = parse_biguint(&record.n)?;
        let e = parse_biguint(&record.e)?;
        let d = parse_biguint(&record.d)?;
        let p = parse_biguint(&record.p)?;
        let q = parse_biguint(&record.q)?;

        let private_key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|e| CryptoError::InvalidLength(format!("malformed keypair record: {e}")))?;
        Ok(Self { private_key })
    }

    /// Serialize this keypair to the persistence record shape (spec §4.3):
    /// n, e, d, p, q plus the CRT coefficients dp, dq, qi, all as decimal
    /// strings.
    pub fn to_record(&self) -> RsaKeypairRecord {
        let n = self.private_key.n();
        let e = self.private_key.e();
        let d = self.private_key.d();
        let primes = self.private_key.primes();
        let p = &primes[0];
        let q = &primes[1];

        let p_std = to_std_biguint(p);
        let q_std = to_std_biguint(q);
        let d_std = to_std_biguint(d);

        let dp = &d_std % (&p_std - StdBigUint::one());
        let dq = &d_std % (&q_std - StdBigUint::one());
        let qi = mod_inverse(&q_std, &p_std);

        RsaKeypairRecord {
            n: n.to_string(),
            e: e.to_string(),
            d: d.to_string(),
            p: p.to_string(),
            q: q.to_string(),
            dp: dp.to_string(),
            dq: dq.to_string(),
            qi: qi.to_string(),
        }
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    /// Export the SPKI DER-wrapped public key as PEM, then Base64-encode the
    /// entire PEM document once more — the Interactsh protocol transmits a
    /// doubly-Base64-encoded PEM and this quirk must be reproduced
    /// bit-exactly for server compatibility (spec §4.1).
    pub fn export_public_key_pem(&self) -> Result<Vec<u8>, CryptoError> {
        let pem = self
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::PemMalformed(e.to_string()))?;
        Ok(B64.encode(pem.as_bytes()).into_bytes())
    }

    /// RSA-OAEP/MGF1-SHA-256 decrypt, empty label (spec §4.1
    /// `decrypt_aes_key`).
    pub fn decrypt_aes_key(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let padding = Oaep::new::<Sha256>();
        self.private_key
            .decrypt(padding, ciphertext)
            .map_err(|_| CryptoError::InvalidPadding)
    }
}

fn parse_biguint(decimal: &str) -> Result<rsa::BigUint, CryptoError> {
    decimal
        .parse::<rsa::BigUint>()
        .map_err(|_| CryptoError::InvalidLength(format!("not a decimal integer: {decimal}")))
}

fn to_std_biguint(value: &rsa::BigUint) -> StdBigUint {
    value
        .to_string()
        .parse::<StdBigUint>()
        .expect("decimal round-trip of a non-negative integer cannot fail")
}

/// Modular inverse of `a` mod `m` via the extended Euclidean algorithm.
/// `m` must be prime (used here to invert `q` mod `p`).
fn mod_inverse(a: &StdBigUint, m: &StdBigUint) -> StdBigUint {
    let (mut old_r, mut r) = (BigInt::from(a.clone()), BigInt::from(m.clone()));
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

    while !r.is_zero() {
        let quotient = &old_r / &r;
        let new_r = &old_r - &quotient * &r;
        old_r = r;
        r = new_r;
        let new_s = &old_s - &quotient * &s;
        old_s = s;
        s = new_s;
    }

    let m_signed = BigInt::from(m.clone());
    let inverse = ((old_s % &m_signed) + &m_signed) % &m_signed;
    inverse
        .to_biguint()
        .expect("modular inverse of a positive modulus is non-negative")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_then_record_round_trips() {
        let keys = RsaKeys::generate().expect("generate");
        let record = keys.to_record();
        let restored = RsaKeys::from_record(&record).expect("restore");
        assert_eq!(keys.private_key.n(), restored.private_key.n());
    }

    #[test]
    fn public_exponent_is_65537() {
        let keys = RsaKeys::generate().expect("generate");
        assert_eq!(keys.private_key.e().to_string(), "65537");
    }

    #[test]
    fn exported_pem_is_doubly_base64() {
        let keys = RsaKeys::generate().expect("generate");
        let outer = keys.export_public_key_pem().expect("export");
        let outer_str = String::from_utf8(outer).expect("ascii");
        let inner = B64.decode(outer_str).expect("outer base64 decodes");
        let inner_str = String::from_utf8(inner).expect("pem is utf8");
        assert!(inner_str.starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn crt_coefficients_are_consistent() {
        let keys = RsaKeys::generate().expect("generate");
        let record = keys.to_record();
        let p: StdBigUint = record.p.parse().expect("p parses");
        let q: StdBigUint = record.q.parse().expect("q parses");
        let qi: StdBigUint = record.qi.parse().expect("qi parses");
        assert_eq!((&qi * &q) % &p, StdBigUint::one());
    }
}
