// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request/Response Transport Codec
//!
//! Every API payload travels inside a hybrid envelope:
//!
//! ```text
//! request  {"key": b64(RSA-OAEP(session_key)), "iv": b64(RSA-OAEP(iv)), "data": b64(AES-CBC(json))}
//! response {"data": b64(AES-CBC(json)), "message": "..."}
//! ```
//!
//! The client picks a fresh 32-byte session key and 16-byte IV per request.
//! The server unwraps them with the transport private key and encrypts its
//! reply under the same pair; the session key is never re-wrapped and never
//! outlives the request.
//!
//! ## Failure Reporting
//!
//! Decoding collapses every failure (base64, RSA, padding, JSON) into
//! [`MalformedRequest`] so callers cannot learn which stage rejected the
//! input.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use zeroize::Zeroizing;

use crate::crypto::{
    cipher, encoding, random_bytes, CryptoError, CryptoResult, TransportKeyPair, IV_LEN, KEY_LEN,
};

/// Inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SealedRequest {
    /// RSA-OAEP wrapped session key (base64)
    pub key: String,
    /// RSA-OAEP wrapped IV (base64)
    pub iv: String,
    /// AES-CBC encrypted JSON payload (base64)
    pub data: String,
}

/// Outbound envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SealedResponse {
    /// AES-CBC encrypted JSON payload (base64)
    pub data: String,
    pub message: String,
}

/// The envelope could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("malformed request")]
pub struct MalformedRequest;

/// Per-request symmetric key and IV.
#[derive(Clone)]
pub struct SessionKey {
    key: Zeroizing<[u8; KEY_LEN]>,
    iv: [u8; IV_LEN],
}

impl SessionKey {
    /// Fresh random key and IV, as a client generates them.
    pub fn generate() -> Self {
        Self {
            key: Zeroizing::new(random_bytes()),
            iv: random_bytes(),
        }
    }

    fn from_slices(key: &[u8], iv: &[u8]) -> Option<Self> {
        Some(Self {
            key: Zeroizing::new(key.try_into().ok()?),
            iv: iv.try_into().ok()?,
        })
    }

    /// Encrypt a reply payload under this session key.
    pub fn seal<T: Serialize>(&self, data: &T) -> CryptoResult<String> {
        let json = Zeroizing::new(serde_json::to_vec(data).map_err(|_| CryptoError::Encoding)?);
        let ciphertext = cipher::cbc_encrypt(json.as_slice(), self.key.as_slice(), &self.iv)?;
        Ok(encoding::encode(ciphertext))
    }

    /// Decrypt a payload sealed under this session key.
    pub fn open(&self, data: &str) -> CryptoResult<Value> {
        let ciphertext = encoding::decode(data)?;
        let json = Zeroizing::new(cipher::cbc_decrypt(
            &ciphertext,
            self.key.as_slice(),
            &self.iv,
        )?);
        serde_json::from_slice(&json).map_err(|_| CryptoError::Encoding)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Parse a raw request body into an envelope.
///
/// Accepts the envelope object itself or a JSON string containing it; older
/// clients encode the body twice.
pub fn parse_envelope(body: &[u8]) -> Result<SealedRequest, MalformedRequest> {
    match serde_json::from_slice::<Value>(body).map_err(|_| MalformedRequest)? {
        Value::String(inner) => serde_json::from_str(&inner).map_err(|_| MalformedRequest),
        object @ Value::Object(_) => serde_json::from_value(object).map_err(|_| MalformedRequest),
        _ => Err(MalformedRequest),
    }
}

/// Open an inbound envelope.
///
/// `keys` are the transport key pairs that may have been handed out (live
/// first); the session key and IV must both unwrap under the same pair.
pub fn decrypt_request(
    request: &SealedRequest,
    keys: &[Arc<TransportKeyPair>],
) -> Result<(Value, SessionKey), MalformedRequest> {
    let wrapped_key = encoding::decode(&request.key).map_err(|_| MalformedRequest)?;
    let wrapped_iv = encoding::decode(&request.iv).map_err(|_| MalformedRequest)?;

    let session = keys
        .iter()
        .find_map(|pair| {
            let key = pair.decrypt(&wrapped_key).ok()?;
            let iv = pair.decrypt(&wrapped_iv).ok()?;
            SessionKey::from_slices(&key, &iv)
        })
        .ok_or(MalformedRequest)?;

    let payload = session.open(&request.data).map_err(|_| MalformedRequest)?;
    Ok((payload, session))
}

/// Seal a reply under the request's session key.
pub fn encrypt_response<T: Serialize>(
    data: &T,
    session: &SessionKey,
    message: impl Into<String>,
) -> CryptoResult<SealedResponse> {
    Ok(SealedResponse {
        data: session.seal(data)?,
        message: message.into(),
    })
}

impl SealedRequest {
    /// Build an envelope the way a client does: fresh session key, wrapped
    /// under `public`, payload encrypted under it.
    pub fn seal<T: Serialize>(
        payload: &T,
        public: &TransportKeyPair,
    ) -> CryptoResult<(Self, SessionKey)> {
        let session = SessionKey::generate();
        let request = Self {
            key: encoding::encode(public.encrypt(session.key.as_slice())?),
            iv: encoding::encode(public.encrypt(&session.iv)?),
            data: session.seal(payload)?,
        };
        Ok((request, session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::transport_key::shared_test_key;
    use serde_json::json;

    #[test]
    fn decrypts_client_sealed_payload() {
        let pair = shared_test_key();
        let payload = json!({"username": "alice"});

        let (request, _) = SealedRequest::seal(&payload, &pair).unwrap();
        let (opened, _) = decrypt_request(&request, &[pair]).unwrap();
        assert_eq!(opened, payload);
    }

    #[test]
    fn response_uses_the_request_session_key() {
        let pair = shared_test_key();
        let (request, client_session) = SealedRequest::seal(&json!({}), &pair).unwrap();
        let (_, server_session) = decrypt_request(&request, &[pair]).unwrap();

        let reply = json!({"success": true, "token": "abc"});
        let response = encrypt_response(&reply, &server_session, "ok").unwrap();
        assert_eq!(response.message, "ok");
        assert_eq!(client_session.open(&response.data).unwrap(), reply);

        let stranger = SessionKey::generate();
        assert!(stranger.open(&response.data).is_err());
    }

    #[test]
    fn every_failure_is_malformed() {
        let pair = shared_test_key();
        let (good, session) = SealedRequest::seal(&json!({"a": 1}), &pair).unwrap();
        let keys = [pair.clone()];

        let bad_base64 = SealedRequest {
            key: "%%%".into(),
            ..good.clone()
        };
        assert_eq!(decrypt_request(&bad_base64, &keys).unwrap_err(), MalformedRequest);

        let swapped = SealedRequest {
            key: good.iv.clone(),
            iv: good.key.clone(),
            ..good.clone()
        };
        assert_eq!(decrypt_request(&swapped, &keys).unwrap_err(), MalformedRequest);

        let not_json = SealedRequest {
            data: encoding::encode(
                cipher::cbc_encrypt(b"{not json", session.key.as_slice(), &session.iv).unwrap(),
            ),
            ..good.clone()
        };
        assert_eq!(decrypt_request(&not_json, &keys).unwrap_err(), MalformedRequest);

        let truncated = SealedRequest {
            data: encoding::encode(b"short"),
            ..good.clone()
        };
        assert_eq!(decrypt_request(&truncated, &keys).unwrap_err(), MalformedRequest);

        assert_eq!(decrypt_request(&good, &[]).unwrap_err(), MalformedRequest);
    }

    #[test]
    fn falls_back_to_retired_key() {
        let retired = shared_test_key();
        let live = Arc::new(TransportKeyPair::generate(2048).unwrap());
        let (request, _) = SealedRequest::seal(&json!({"n": 7}), &retired).unwrap();

        let (opened, _) = decrypt_request(&request, &[live, retired]).unwrap();
        assert_eq!(opened["n"], 7);
    }

    #[test]
    fn parses_plain_and_double_encoded_bodies() {
        let envelope = json!({"key": "a", "iv": "b", "data": "c"});
        let expected = SealedRequest {
            key: "a".into(),
            iv: "b".into(),
            data: "c".into(),
        };

        let plain = serde_json::to_vec(&envelope).unwrap();
        assert_eq!(parse_envelope(&plain).unwrap(), expected);

        let double = serde_json::to_vec(&Value::String(envelope.to_string())).unwrap();
        assert_eq!(parse_envelope(&double).unwrap(), expected);

        assert!(parse_envelope(b"[1,2]").is_err());
        assert!(parse_envelope(b"{\"key\":\"a\"}").is_err());
        assert!(parse_envelope(b"not json").is_err());
    }

    #[test]
    fn accepts_mime_wrapped_fields() {
        let pair = shared_test_key();
        let (mut request, _) = SealedRequest::seal(&json!({"x": "y"}), &pair).unwrap();
        request.key = request
            .key
            .as_bytes()
            .chunks(76)
            .map(|line| format!("{}\n", std::str::from_utf8(line).unwrap()))
            .collect();

        assert!(decrypt_request(&request, &[pair]).is_ok());
    }
}
