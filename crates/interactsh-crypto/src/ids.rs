//! CSPRNG correlation identifiers and nonces (spec §4.1 `generate_random_id`).

use rand::RngCore;
use rand_core::OsRng;

/// Lowercase letters plus digits — the alphabet used for correlation ids,
/// secret keys, and nonces.
pub const LOWERCASE_ALNUM: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";
/// Lowercase letters only.
pub const LOWERCASE_ALPHA: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// Generate a CSPRNG string of `length` characters, uniform over the
/// 36-character alnum alphabet, or the 26-character letters-only alphabet
/// when `letters_only` is set.
///
/// Uses rejection sampling against [`rand_core::OsRng`] so every character is
/// drawn uniformly — no modulo bias. `length == 0` returns the empty string.
pub fn generate_random_id(length: usize, letters_only: bool) -> String {
    let alphabet: &[u8] = if letters_only {
        LOWERCASE_ALPHA
    } else {
        LOWERCASE_ALNUM
    };
    generate_with_rng(&mut OsRng, alphabet, length)
}

fn generate_with_rng(rng: &mut impl RngCore, alphabet: &[u8], length: usize) -> String {
    let alphabet_len = alphabet.len() as u32;
    // Largest multiple of alphabet_len that fits in a u8 range sample space;
    // we draw a byte and reject anything at or above this bound to avoid bias.
    let limit = (256u32 / alphabet_len * alphabet_len) as u8;

    let mut out = Vec::with_capacity(length);
    let mut buf = [0u8; 1];
    while out.len() < length {
        rng.fill_bytes(&mut buf);
        if (buf[0] as u32) < limit as u32 {
            let idx = (buf[0] as u32) % alphabet_len;
            out.push(alphabet[idx as usize]);
        }
    }
    // SAFETY: every byte pushed comes from `alphabet`, which is ASCII.
    String::from_utf8(out).expect("alphabet is ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_length_returns_empty_string() {
        assert_eq!(generate_random_id(0, false), "");
        assert_eq!(generate_random_id(0, true), "");
    }

    #[test]
    fn letters_only_produces_only_alpha() {
        let id = generate_random_id(200, true);
        assert!(id.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn alnum_produces_expected_length_and_charset() {
        let id = generate_random_id(64, false);
        assert_eq!(id.len(), 64);
        assert!(id
            .bytes()
            .all(|b| LOWERCASE_ALNUM.contains(&b)));
    }

    #[test]
    fn two_calls_are_distinct() {
        let a = generate_random_id(20, false);
        let b = generate_random_id(20, false);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn any_length_produces_exact_length(len in 0usize..256) {
            let id = generate_random_id(len, false);
            prop_assert_eq!(id.len(), len);
        }

        #[test]
        fn any_length_letters_only_charset(len in 0usize..256) {
            let id = generate_random_id(len, true);
            prop_assert!(id.bytes().all(|b| LOWERCASE_ALPHA.contains(&b)));
        }
    }
}
