// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ephemeral RSA transport key pair.
//!
//! Clients fetch the public half, wrap a fresh 32-byte session key and 16-byte
//! IV with RSA-OAEP (SHA-256 for both the digest and MGF1, no label), and send
//! them with every request. The key pair is process state, never persisted.
//!
//! ## Rotation
//!
//! Rotation is lazy: [`TransportKeyManager::get_or_refresh`] regenerates the
//! pair only when it is read and found absent or expired. The previous pair is
//! kept as `retired` until the next rotation, so a client that fetched the
//! public key just before expiry can still complete its request. Request
//! decryption reads [`TransportKeyManager::decryption_keys`], which never
//! generates or rotates.
//!
//! Regeneration runs under a dedicated async mutex: concurrent callers that
//! all observe an expired key wait for one regeneration and receive the same
//! new pair. The published pairs sit behind a separate `RwLock` that is only
//! write-locked to swap in a finished pair, so request decryption never
//! waits for key generation.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tokio::sync::{Mutex, RwLock};
use zeroize::Zeroizing;

use super::{CryptoError, CryptoResult};

/// Default RSA modulus size.
pub const TRANSPORT_KEY_BITS: usize = 4096;

/// Default expiry window in seconds.
pub const TRANSPORT_KEY_TTL_SECS: i64 = 3600;

/// One RSA key pair with its generation time.
pub struct TransportKeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    public_pem: String,
    generated_at: DateTime<Utc>,
}

impl TransportKeyPair {
    /// Generate a new key pair (public exponent 65537).
    ///
    /// CPU-heavy for 4096-bit keys; async callers go through
    /// [`TransportKeyManager`], which runs this on the blocking pool.
    pub fn generate(bits: usize) -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        Ok(Self {
            private_key,
            public_key,
            public_pem,
            generated_at: Utc::now(),
        })
    }

    /// SubjectPublicKeyInfo PEM of the public half.
    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// True when more than `ttl` has elapsed since generation.
    pub fn is_expired(&self, ttl: TimeDelta) -> bool {
        self.is_expired_at(Utc::now(), ttl)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now.signed_duration_since(self.generated_at) > ttl
    }

    /// Unwrap an RSA-OAEP(SHA-256) ciphertext.
    pub fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let plaintext = self.private_key.decrypt(Oaep::new::<Sha256>(), ciphertext)?;
        Ok(Zeroizing::new(plaintext))
    }

    /// Wrap bytes under the public half, as a client would.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let ciphertext = self
            .public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)?;
        Ok(ciphertext)
    }
}

impl fmt::Debug for TransportKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportKeyPair")
            .field("generated_at", &self.generated_at)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct KeyRing {
    current: Option<Arc<TransportKeyPair>>,
    retired: Option<Arc<TransportKeyPair>>,
}

/// Guarded, process-wide holder of the transport key pair.
pub struct TransportKeyManager {
    bits: usize,
    ttl: TimeDelta,
    /// Serializes generation; never taken by readers.
    generation: Mutex<()>,
    /// Published pairs; write-locked only to swap in a finished pair.
    ring: RwLock<KeyRing>,
}

impl TransportKeyManager {
    pub fn new(bits: usize, ttl: TimeDelta) -> Self {
        Self::with_ring(bits, ttl, KeyRing::default())
    }

    fn with_ring(bits: usize, ttl: TimeDelta, ring: KeyRing) -> Self {
        Self {
            bits,
            ttl,
            generation: Mutex::new(()),
            ring: RwLock::new(ring),
        }
    }

    async fn live(&self) -> Option<Arc<TransportKeyPair>> {
        self.ring
            .read()
            .await
            .current
            .as_ref()
            .filter(|current| !current.is_expired(self.ttl))
            .cloned()
    }

    /// Return the live key pair, generating it first if absent or expired.
    ///
    /// This is the only path that creates or rotates keys.
    pub async fn get_or_refresh(&self) -> CryptoResult<Arc<TransportKeyPair>> {
        if let Some(current) = self.live().await {
            return Ok(current);
        }

        let _generating = self.generation.lock().await;
        // Another caller may have rotated while we waited.
        if let Some(current) = self.live().await {
            return Ok(current);
        }

        let bits = self.bits;
        let fresh = tokio::task::spawn_blocking(move || TransportKeyPair::generate(bits))
            .await
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))??;
        let fresh = Arc::new(fresh);

        let mut ring = self.ring.write().await;
        tracing::info!(
            bits,
            generated_at = %fresh.generated_at(),
            rotated = ring.current.is_some(),
            "Transport key pair generated"
        );
        ring.retired = ring.current.replace(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Key pairs that may have been handed out: live first, then retired.
    ///
    /// Empty until the first [`get_or_refresh`](Self::get_or_refresh). Does
    /// not wait for an in-progress rotation.
    pub async fn decryption_keys(&self) -> Vec<Arc<TransportKeyPair>> {
        let ring = self.ring.read().await;
        ring.current
            .iter()
            .chain(ring.retired.iter())
            .cloned()
            .collect()
    }

    /// Whether a key pair has been generated yet.
    pub async fn is_generated(&self) -> bool {
        self.ring.read().await.current.is_some()
    }

    #[cfg(test)]
    pub(crate) fn with_key_pair(pair: Arc<TransportKeyPair>, ttl: TimeDelta) -> Self {
        Self::with_ring(
            2048,
            ttl,
            KeyRing {
                current: Some(pair),
                retired: None,
            },
        )
    }
}

/// 2048-bit pair shared across tests; generation is the slow part.
#[cfg(test)]
pub(crate) fn shared_test_key() -> Arc<TransportKeyPair> {
    use std::sync::OnceLock;

    static KEY: OnceLock<Arc<TransportKeyPair>> = OnceLock::new();
    Arc::clone(KEY.get_or_init(|| {
        Arc::new(TransportKeyPair::generate(2048).expect("test key generation"))
    }))
}
