//! The hybrid RSA-OAEP + AES-256-CFB decryption pipeline (spec §4.1
//! `decrypt_interaction`).

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use crate::aes_cfb::{self, IV_SIZE};
use crate::rsa_keys::RsaKeys;
use crate::CryptoError;

/// Decrypt a single Interactsh interaction payload.
///
/// Steps (spec §4.1): Base64-decode the AES key blob; RSA-OAEP-decrypt it to
/// obtain the symmetric key; Base64-decode the secure message; the first 16
/// bytes are the IV, the remainder is ciphertext; normalize the symmetric
/// key to 32 bytes; AES-256-CFB-decrypt; decode the result as UTF-8.
pub fn decrypt_interaction(
    keys: &RsaKeys,
    encrypted_aes_key_b64: &str,
    secure_message_b64: &str,
) -> Result<String, CryptoError> {
    let encrypted_aes_key = B64
        .decode(encrypted_aes_key_b64)
        .map_err(|e| CryptoError::InvalidLength(format!("aes key is not base64: {e}")))?;
    let symmetric_key = keys.decrypt_aes_key(&encrypted_aes_key)?;
    let normalized_key = aes_cfb::normalize_key(symmetric_key);

    let secure_message = B64
        .decode(secure_message_b64)
        .map_err(|e| CryptoError::InvalidLength(format!("secure message is not base64: {e}")))?;
    if secure_message.len() < IV_SIZE {
        return Err(CryptoError::InvalidLength(
            "secure message shorter than the IV".to_string(),
        ));
    }
    let (iv_slice, ciphertext) = secure_message.split_at(IV_SIZE);
    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(iv_slice);

    let plaintext = aes_cfb::decrypt(&normalized_key, &iv, ciphertext)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfb_mode::Encryptor;
    use cipher::{AsyncStreamCipher, KeyIvInit};
    use rsa::Oaep;
    use sha2::Sha256;

    fn encrypt_interaction(keys: &RsaKeys, symmetric_key: &[u8; 32], iv: &[u8; IV_SIZE], plaintext: &[u8]) -> (String, String) {
        let mut rng = rand::rngs::OsRng;
        let encrypted_key = keys
            .public_key()
            .encrypt(&mut rng, Oaep::new::<Sha256>(), symmetric_key)
            .expect("encrypt aes key");

        let mut buf = plaintext.to_vec();
        Encryptor::<aes::Aes256>::new(symmetric_key.into(), iv.into()).encrypt(&mut buf);
        let mut secure_message = iv.to_vec();
        secure_message.extend_from_slice(&buf);

        (B64.encode(encrypted_key), B64.encode(secure_message))
    }

    #[test]
    fn round_trips_for_arbitrary_message() {
        let keys = RsaKeys::generate().expect("generate");
        let symmetric_key = [0x42u8; 32];
        let iv = [0x09u8; IV_SIZE];
        let plaintext = b"{\"full-id\":\"abc123\"}";

        let (enc_key_b64, secure_message_b64) =
            encrypt_interaction(&keys, &symmetric_key, &iv, plaintext);

        let decrypted = decrypt_interaction(&keys, &enc_key_b64, &secure_message_b64).expect("decrypt");
        assert_eq!(decrypted.as_bytes(), plaintext);
    }

    #[test]
    fn rejects_non_utf8_plaintext() {
        let keys = RsaKeys::generate().expect("generate");
        let symmetric_key = [0x11u8; 32];
        let iv = [0x02u8; IV_SIZE];
        let invalid_utf8 = [0xff, 0xfe, 0xfd];

        let (enc_key_b64, secure_message_b64) =
            encrypt_interaction(&keys, &symmetric_key, &iv, &invalid_utf8);

        let err = decrypt_interaction(&keys, &enc_key_b64, &secure_message_b64)
            .expect_err("non-utf8 plaintext rejected");
        assert!(matches!(err, CryptoError::InvalidUtf8));
    }

    #[test]
    fn rejects_secure_message_shorter_than_iv() {
        let keys = RsaKeys::generate().expect("generate");
        let symmetric_key = [0x11u8; 32];
        let mut rng = rand::rngs::OsRng;
        let encrypted_key = keys
            .public_key()
            .encrypt(&mut rng, Oaep::new::<Sha256>(), &symmetric_key)
            .expect("encrypt aes key");

        let short_message = B64.encode([0u8; 4]);
        let err = decrypt_interaction(&keys, &B64.encode(encrypted_key), &short_message)
            .expect_err("short secure message rejected");
        assert!(matches!(err, CryptoError::InvalidLength(_)));
    }
}
