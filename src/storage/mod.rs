// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Storage
//!
//! [`CredentialStore`] is the persistence interface the services consume.
//! Every method is a single-statement operation: it either commits in full or
//! leaves the store untouched.
//!
//! ## Backends
//!
//! - [`Database`] - redb file (`custody.redb`), one write transaction per call
//! - [`InMemoryStore`] - `RwLock`-guarded maps for development and tests
//!
//! ## Ownership
//!
//! ```text
//! users/{username}
//!   ├── keys/{username}            (at most one key pair)
//!   ├── access_control/{username}
//!   └── sessions/{username}        (at most one session slot)
//! ```
//!
//! [`CredentialStore::delete_user`] removes the user and every owned record
//! explicitly, including index entries.
//!
//! ## Uniqueness
//!
//! Both backends reject with [`StorageError::AlreadyExists`]: a taken username,
//! any crypto material field already used by another user, a second key pair
//! for the same owner, a duplicate key hash or key name, a second session for
//! the same username, and a duplicate session token.
//!
//! ## Access Control
//!
//! Grants and revocations read, modify and write one record inside a single
//! write transaction (or under the single write lock), so concurrent updates
//! to the same user never overwrite each other.

use std::collections::BTreeSet;
use std::net::IpAddr;

pub mod database;
pub mod memory;
pub mod records;

pub use database::Database;
pub use memory::InMemoryStore;
pub use records::{AccessControlRecord, KeyPairRecord, SessionRecord, UserRecord};

/// Error type for credential storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence interface for users, key pairs, access control and sessions.
///
/// Calls may block on disk I/O; async callers run them on the blocking pool.
pub trait CredentialStore: Send + Sync {
    fn find_user_by_username(&self, username: &str) -> StorageResult<Option<UserRecord>>;

    fn admin_exists(&self) -> StorageResult<bool>;

    /// Insert a user and index its crypto material.
    fn create_user(&self, user: &UserRecord) -> StorageResult<()>;

    /// Remove a user and cascade to its key pair, session and access record.
    fn delete_user(&self, username: &str) -> StorageResult<()>;

    /// Insert a key pair for an existing owner.
    fn create_key(&self, key: &KeyPairRecord) -> StorageResult<()>;

    fn find_key_by_owner(&self, username: &str) -> StorageResult<Option<KeyPairRecord>>;

    fn find_key_by_hash(&self, key_hash: &str) -> StorageResult<Option<KeyPairRecord>>;

    fn find_key_by_name(&self, name: &str) -> StorageResult<Option<KeyPairRecord>>;

    fn find_access_control(&self, username: &str) -> StorageResult<Option<AccessControlRecord>>;

    /// Atomically add addresses to an existing user's access record.
    ///
    /// Fails with `AlreadyExists`, writing nothing, if any address is
    /// already granted.
    fn grant_ips(&self, username: &str, ips: &BTreeSet<IpAddr>) -> StorageResult<()>;

    /// Atomically remove addresses and return those that were granted.
    fn revoke_ips(&self, username: &str, ips: &BTreeSet<IpAddr>) -> StorageResult<Vec<IpAddr>>;

    /// Atomically remove every address and return how many there were.
    fn clear_ips(&self, username: &str) -> StorageResult<usize>;

    fn find_session(&self, username: &str) -> StorageResult<Option<SessionRecord>>;

    fn find_session_by_token(&self, token: &str) -> StorageResult<Option<SessionRecord>>;

    /// Insert the session slot of an existing user.
    fn create_session(&self, session: &SessionRecord) -> StorageResult<()>;

    /// Flip the `active` flag and return the updated slot.
    fn set_session_active(&self, username: &str, active: bool) -> StorageResult<SessionRecord>;

    fn health_check(&self) -> StorageResult<()>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::crypto::random_bytes;
    use crate::secrets::{SecretBundle, ENCRYPTED_DEK_LEN};

    /// A user with random (not password-derived) material; cheap to build.
    pub fn user(username: &str, admin: bool) -> UserRecord {
        let secrets = SecretBundle::from_parts(
            random_bytes::<ENCRYPTED_DEK_LEN>().to_vec(),
            &random_bytes::<16>(),
            &random_bytes::<32>(),
            &random_bytes::<16>(),
            &random_bytes::<32>(),
        )
        .unwrap();

        UserRecord {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            name: format!("{username} display"),
            admin,
            password_hash: random_bytes(),
            salt_for_password: random_bytes(),
            secrets,
            created_at: Utc::now(),
        }
    }

    pub fn key(owner: &str, name: &str, key_hash: &str) -> KeyPairRecord {
        KeyPairRecord {
            key_id: Uuid::new_v4(),
            owner: owner.to_string(),
            name: name.to_string(),
            encrypted_private_key: vec![7; 64],
            key_hash: key_hash.to_string(),
            public_key: Some("ssh-ed25519 AAAA".to_string()),
            created_at: Utc::now(),
        }
    }

    pub fn session(username: &str, token: &str) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            username: username.to_string(),
            access_token: token.to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
