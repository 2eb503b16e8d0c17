// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cryptographic Core
//!
//! Primitives every other module builds on:
//!
//! - `cipher` - AES-256-CBC engine (authenticated for data at rest, bare for
//!   the transport envelope)
//! - `kdf` - PBKDF2-HMAC-SHA256 key derivation and salted SHA-256 hashing
//! - `transport_key` - ephemeral RSA transport key pair and its guarded manager
//! - `encoding` - base64 helpers for wire fields and stored records
//!
//! ## Failure Model
//!
//! Every fallible operation returns [`CryptoError`]. A decryption failure is a
//! normal outcome (wrong password, tampered ciphertext, foreign key) and is
//! always recoverable; nothing in this module panics on bad input.

pub mod cipher;
pub mod encoding;
pub mod kdf;
pub mod transport_key;

use rand::{rngs::OsRng, RngCore};

pub use transport_key::{TransportKeyManager, TransportKeyPair};

/// Symmetric key length (DEK, KEK, derived wrapping key, transport session key).
pub const KEY_LEN: usize = 32;

/// CBC initialization vector length (one AES block).
pub const IV_LEN: usize = 16;

/// Salt length for every PBKDF2 and hash salt.
pub const SALT_LEN: usize = 32;

/// Errors raised by the cryptographic core.
///
/// Messages are deliberately generic: they name the failing stage, never the
/// material involved.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid iv length: expected {expected} bytes, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("authentication tag mismatch")]
    TagMismatch,

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid encoding")]
    Encoding,

    #[error("rsa operation failed")]
    Rsa(#[from] rsa::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Fill a fixed-size array from the operating system CSPRNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Constant-time byte comparison.
///
/// Length is not secret; contents are.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

pub(crate) fn check_key(key: &[u8]) -> CryptoResult<()> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_iv(iv: &[u8]) -> CryptoResult<()> {
    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidIvLength {
            expected: IV_LEN,
            actual: iv.len(),
        });
    }
    Ok(())
}
