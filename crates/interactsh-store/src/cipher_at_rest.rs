//! Encryption-at-rest for the two confidential records (spec §4.3
//! "Storage substrate: any confidential key-value store ... encrypted at
//! rest"). Uses the same AES-256-CFB primitive the wire protocol already
//! depends on (interactsh-crypto), keyed by a local, file-permission-
//! restricted master key never derived from or mixed with session secrets.

use aes::Aes256;
use cfb_mode::{Decryptor, Encryptor};
use cipher::{AsyncStreamCipher, KeyIvInit};
use rand::RngCore;
use rand_core::OsRng;
use zeroize::Zeroize;

use crate::store::StoreError;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// The local master key used to encrypt confidential records at rest.
/// Zeroized on drop so it never lingers in process memory.
pub struct MasterKey([u8; KEY_LEN]);

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl MasterKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Encrypt `plaintext` under `key`, returning `iv || ciphertext`.
pub fn seal(key: &MasterKey, plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let mut buf = plaintext.to_vec();
    Encryptor::<Aes256>::new(key.as_bytes().into(), &iv.into()).encrypt(&mut buf);
    let mut out = iv.to_vec();
    out.extend_from_slice(&buf);
    out
}

/// Decrypt a blob produced by [`seal`]. Any malformed blob (too short)
/// surfaces as [`StoreError::Corrupted`] rather than panicking.
pub fn open(key: &MasterKey, blob: &[u8]) -> Result<Vec<u8>, StoreError> {
    if blob.len() < IV_LEN {
        return Err(StoreError::Corrupted(
            "encrypted record shorter than one IV".to_string(),
        ));
    }
    let (iv, ciphertext) = blob.split_at(IV_LEN);
    let mut iv_arr = [0u8; IV_LEN];
    iv_arr.copy_from_slice(iv);
    let mut buf = ciphertext.to_vec();
    Decryptor::<Aes256>::new(key.as_bytes().into(), &iv_arr.into()).decrypt(&mut buf);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let key = MasterKey::generate();
        let plaintext = b"{\"n\":\"123\"}";
        let blob = seal(&key, plaintext);
        let opened = open(&key, &blob).expect("open");
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn truncated_blob_is_corrupted_not_panicking() {
        let key = MasterKey::generate();
        let err = open(&key, &[0u8; 4]).expect_err("truncated blob rejected");
        assert!(matches!(err, StoreError::Corrupted(_)));
    }
}
