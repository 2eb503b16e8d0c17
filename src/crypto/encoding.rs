// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Base64 helpers for envelope fields and stored records.
//!
//! Encoding emits standard, unbroken base64. Decoding tolerates ASCII
//! whitespace so MIME-wrapped input (a line break every 76 characters) from
//! older clients is accepted.

use base64ct::{Base64, Encoding};

use super::{CryptoError, CryptoResult};

/// Encode bytes as standard base64.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    Base64::encode_string(bytes.as_ref())
}

/// Decode standard base64, ignoring embedded whitespace.
pub fn decode(text: &str) -> CryptoResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Base64::decode_vec(&compact).map_err(|_| CryptoError::Encoding)
}

/// `#[serde(with = "...")]` adapter storing byte fields as base64 strings.
///
/// Works for `Vec<u8>` and fixed-size arrays; a length mismatch on
/// deserialization is reported as a serde error.
pub mod base64_field {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&super::encode(value))
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: TryFrom<Vec<u8>>,
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let bytes = super::decode(&text).map_err(D::Error::custom)?;
        let len = bytes.len();
        T::try_from(bytes).map_err(|_| D::Error::custom(format!("unexpected length {len}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "base64_field")]
        iv: [u8; 4],
        #[serde(with = "base64_field")]
        blob: Vec<u8>,
    }

    #[test]
    fn decode_ignores_mime_line_breaks() {
        let wrapped = "aGVsbG8g\nd29ybGQ=\n";
        assert_eq!(decode(wrapped).unwrap(), b"hello world");
        assert_eq!(encode(b"hello world"), "aGVsbG8gd29ybGQ=");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode("not*base64"), Err(CryptoError::Encoding)));
    }

    #[test]
    fn serde_field_adapter_checks_length() {
        let sample = Sample {
            iv: [1, 2, 3, 4],
            blob: vec![0xff; 10],
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("\"iv\":\"AQIDBA==\""));
        assert_eq!(serde_json::from_str::<Sample>(&json).unwrap(), sample);

        let bad = r#"{"iv":"AQID","blob":""}"#;
        assert!(serde_json::from_str::<Sample>(bad).is_err());
    }
}
