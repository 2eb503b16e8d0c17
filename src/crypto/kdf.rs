// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key derivation and hashing.
//!
//! - [`derive_key`]: PBKDF2-HMAC-SHA256, 100 000 iterations, 32-byte output.
//!   Deterministic for a given `(secret, salt)` so login can re-derive the KEK.
//! - [`hash`]: a single SHA-256 pass over `data || salt`, used for password
//!   verification hashes and key fingerprints. Never used to derive keys.

use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::KEY_LEN;

/// PBKDF2 iteration count for every derived key.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Output length of [`hash`].
pub const HASH_LEN: usize = 32;

/// Derive a 32-byte key from a secret and salt.
pub fn derive_key(secret: impl AsRef<[u8]>, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(secret.as_ref(), salt, PBKDF2_ITERATIONS, &mut key[..]);
    key
}

/// SHA-256 over `data || salt`.
pub fn hash(data: impl AsRef<[u8]>, salt: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hasher.update(salt);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_deterministic() {
        let salt = [9u8; 32];
        let a = derive_key("correct horse", &salt);
        let b = derive_key(b"correct horse", &salt);
        assert_eq!(*a, *b);
    }

    #[test]
    fn derive_key_depends_on_salt_and_secret() {
        let a = derive_key("pw", &[1u8; 32]);
        let b = derive_key("pw", &[2u8; 32]);
        let c = derive_key("pw2", &[1u8; 32]);
        assert_ne!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn derive_key_differs_from_plain_hash() {
        let salt = [3u8; 32];
        assert_ne!(*derive_key("pw", &salt), hash("pw", &salt));
    }

    #[test]
    fn hash_matches_known_vector() {
        // SHA-256("abc")
        let expected = [
            0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae,
            0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61,
            0xf2, 0x00, 0x15, 0xad,
        ];
        assert_eq!(hash("abc", b""), expected);
        assert_eq!(hash("ab", b"c"), expected);
    }
}
