// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted record types.
//!
//! Records serialize as JSON; binary fields are base64 strings.

use std::collections::BTreeSet;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::encoding::base64_field;
use crate::crypto::kdf::HASH_LEN;
use crate::crypto::SALT_LEN;
use crate::secrets::SecretBundle;

use super::{StorageError, StorageResult};

/// Root record: identity, password verifier and the envelope tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub username: String,
    pub name: String,
    pub admin: bool,
    /// SHA-256(password || salt_for_password)
    #[serde(with = "base64_field")]
    pub password_hash: [u8; HASH_LEN],
    #[serde(with = "base64_field")]
    pub salt_for_password: [u8; SALT_LEN],
    pub secrets: SecretBundle,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Every crypto material field that must be unique across users.
    pub fn material(&self) -> Vec<(&'static str, &[u8])> {
        let mut fields = self.secrets.material().to_vec();
        fields.push(("salt_for_password", self.salt_for_password.as_slice()));
        fields
    }
}

/// A user's SSH key pair. The private half is stored only sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairRecord {
    pub key_id: Uuid,
    /// Owning username
    pub owner: String,
    pub name: String,
    #[serde(with = "base64_field")]
    pub encrypted_private_key: Vec<u8>,
    /// base64(SHA-256(plaintext private key))
    pub key_hash: String,
    pub public_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Authorized addresses of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlRecord {
    pub username: String,
    pub ip_addresses: BTreeSet<IpAddr>,
    pub updated_at: DateTime<Utc>,
}

impl AccessControlRecord {
    pub fn empty(username: &str) -> Self {
        Self {
            username: username.to_string(),
            ip_addresses: BTreeSet::new(),
            updated_at: Utc::now(),
        }
    }

    /// Add every address, or none of them if any is already present.
    pub(crate) fn grant(&mut self, ips: &BTreeSet<IpAddr>) -> StorageResult<()> {
        if let Some(ip) = ips.iter().find(|ip| self.ip_addresses.contains(ip)) {
            return Err(StorageError::AlreadyExists(format!(
                "access for {} from {ip}",
                self.username
            )));
        }
        self.ip_addresses.extend(ips.iter().copied());
        Ok(())
    }

    /// Remove the given addresses and return those that were present.
    pub(crate) fn revoke(&mut self, ips: &BTreeSet<IpAddr>) -> Vec<IpAddr> {
        ips.iter()
            .copied()
            .filter(|ip| self.ip_addresses.remove(ip))
            .collect()
    }

    pub(crate) fn clear(&mut self) -> usize {
        let count = self.ip_addresses.len();
        self.ip_addresses.clear();
        count
    }
}

/// Toggle-based login slot; one per username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub username: String,
    pub access_token: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Composite index key for the crypto material uniqueness table.
pub(crate) fn material_key(field: &str, bytes: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(field.len() + 1 + bytes.len());
    key.extend_from_slice(field.as_bytes());
    key.push(b'|');
    key.extend_from_slice(bytes);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fixtures;

    #[test]
    fn user_material_covers_bundle_and_password_salt() {
        let user = fixtures::user("alice", true);
        let names: Vec<_> = user.material().iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            [
                "encrypted_dek",
                "iv_for_dek",
                "salt_for_dek",
                "iv_for_kek",
                "salt_for_kek",
                "salt_for_password"
            ]
        );
    }

    #[test]
    fn records_round_trip_through_json() {
        let user = fixtures::user("alice", false);
        let json = serde_json::to_vec(&user).unwrap();
        assert_eq!(serde_json::from_slice::<UserRecord>(&json).unwrap(), user);

        let mut acl = AccessControlRecord::empty("bob");
        acl.ip_addresses.insert("10.0.0.1".parse().unwrap());
        acl.ip_addresses.insert("::1".parse().unwrap());
        let json = serde_json::to_string(&acl).unwrap();
        assert!(json.contains("\"10.0.0.1\""));
        assert_eq!(serde_json::from_str::<AccessControlRecord>(&json).unwrap(), acl);
    }

    #[test]
    fn grant_is_all_or_nothing() {
        let ip = |s: &str| s.parse::<IpAddr>().unwrap();
        let mut acl = AccessControlRecord::empty("bob");
        acl.grant(&BTreeSet::from([ip("10.0.0.1")])).unwrap();

        let overlapping = BTreeSet::from([ip("10.0.0.2"), ip("10.0.0.1")]);
        assert!(matches!(acl.grant(&overlapping), Err(StorageError::AlreadyExists(_))));
        assert_eq!(acl.ip_addresses, BTreeSet::from([ip("10.0.0.1")]));

        let removed = acl.revoke(&BTreeSet::from([ip("10.0.0.1"), ip("10.0.0.9")]));
        assert_eq!(removed, [ip("10.0.0.1")]);
        assert_eq!(acl.clear(), 0);
    }

    #[test]
    fn material_key_separates_fields() {
        assert_ne!(material_key("iv_for_dek", b"x"), material_key("iv_for_kek", b"x"));
        assert_eq!(material_key("a", b"bc"), b"a|bc".to_vec());
    }
}
