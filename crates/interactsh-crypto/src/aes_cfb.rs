//! AES-256-CFB (full 128-bit segment feedback) symmetric decryption
//! (spec §4.1 `decrypt_interaction` step 4; SPEC_FULL §9 hybrid crypto
//! decisions — CFB-8 will not interoperate, only full-block CFB is valid).

use aes::Aes256;
use cfb_mode::Decryptor;
use cipher::{AsyncStreamCipher, KeyIvInit};

use crate::CryptoError;

/// Canonical AES-256 key length.
pub const KEY_SIZE: usize = 32;
/// AES block size, also the CFB IV length.
pub const IV_SIZE: usize = 16;

type Aes256CfbDec = Decryptor<Aes256>;

/// Right-pad with zero bytes (or truncate) a decrypted symmetric key to
/// exactly [`KEY_SIZE`] bytes. Historical Interactsh servers have shipped
/// keys of varying lengths; this is a compatibility requirement, not a
/// choice (spec §4.1, §8, §9).
pub fn normalize_key(mut key: Vec<u8>) -> [u8; KEY_SIZE] {
    key.resize(KEY_SIZE, 0);
    let mut fixed = [0u8; KEY_SIZE];
    fixed.copy_from_slice(&key[..KEY_SIZE]);
    fixed
}

/// Decrypt `ciphertext` in place with AES-256-CFB, where `key` has already
/// been normalized to 32 bytes and `iv` is the 16-byte initialization
/// vector taken from the front of the secure message.
pub fn decrypt(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut buf = ciphertext.to_vec();
    Aes256CfbDec::new(key.into(), iv.into()).decrypt(&mut buf);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfb_mode::Encryptor;

    fn encrypt(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
        let mut buf = plaintext.to_vec();
        Encryptor::<Aes256>::new(key.into(), iv.into()).encrypt(&mut buf);
        buf
    }

    #[test]
    fn round_trips() {
        let key = [0x11u8; KEY_SIZE];
        let iv = [0x22u8; IV_SIZE];
        let plaintext = b"hello interactsh";
        let ciphertext = encrypt(&key, &iv, plaintext);
        let decrypted = decrypt(&key, &iv, &ciphertext).expect("decrypt");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn short_key_is_zero_padded() {
        let key = normalize_key(vec![0xAAu8; 31]);
        assert_eq!(key.len(), KEY_SIZE);
        assert_eq!(key[31], 0);
        assert_eq!(&key[..31], [0xAAu8; 31].as_slice());
    }

    #[test]
    fn long_key_is_truncated() {
        let key = normalize_key(vec![0xBBu8; 33]);
        assert_eq!(key.len(), KEY_SIZE);
        assert_eq!(key, [0xBBu8; KEY_SIZE]);
    }

    #[test]
    fn exact_length_key_is_unchanged() {
        let input = vec![0xCCu8; KEY_SIZE];
        let key = normalize_key(input.clone());
        assert_eq!(key.to_vec(), input);
    }
}
