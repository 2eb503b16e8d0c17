// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded credential database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: username → serialized UserRecord
//! - `crypto_material`: `field|bytes` → username (uniqueness index)
//! - `keys`: owner username → serialized KeyPairRecord
//! - `key_hashes`: key hash → owner username
//! - `key_names`: key name → owner username
//! - `access_control`: username → serialized AccessControlRecord
//! - `sessions`: username → serialized SessionRecord
//! - `session_tokens`: access token → username
//!
//! Every write opens one transaction. Returning early with an error drops the
//! transaction uncommitted, which rolls it back.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::Path;

use chrono::Utc;
use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;

use super::records::material_key;
use super::{
    AccessControlRecord, CredentialStore, KeyPairRecord, SessionRecord, StorageError,
    StorageResult, UserRecord,
};

// =============================================================================
// Table Definitions
// =============================================================================

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;
type IndexTable = TableDefinition<'static, &'static str, &'static str>;

const USERS: JsonTable = TableDefinition::new("users");

/// Composite key `field|bytes` → owning username.
const CRYPTO_MATERIAL: TableDefinition<&[u8], &str> = TableDefinition::new("crypto_material");

const KEYS: JsonTable = TableDefinition::new("keys");
const KEY_HASHES: IndexTable = TableDefinition::new("key_hashes");
const KEY_NAMES: IndexTable = TableDefinition::new("key_names");
const ACCESS_CONTROL: JsonTable = TableDefinition::new("access_control");
const SESSIONS: JsonTable = TableDefinition::new("sessions");
const SESSION_TOKENS: IndexTable = TableDefinition::new("session_tokens");

fn decode<T: DeserializeOwned>(bytes: Option<Vec<u8>>) -> StorageResult<Option<T>> {
    bytes
        .map(|b| serde_json::from_slice(&b))
        .transpose()
        .map_err(StorageError::from)
}

// =============================================================================
// Database
// =============================================================================

/// redb-backed [`CredentialStore`].
pub struct Database {
    db: redb::Database,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = redb::Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(CRYPTO_MATERIAL)?;
            let _ = write_txn.open_table(KEYS)?;
            let _ = write_txn.open_table(KEY_HASHES)?;
            let _ = write_txn.open_table(KEY_NAMES)?;
            let _ = write_txn.open_table(ACCESS_CONTROL)?;
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(SESSION_TOKENS)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Credential database opened");
        Ok(Self { db })
    }

    fn get_json<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StorageResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table)?;
        let bytes = table.get(key)?.map(|v| v.value().to_vec());
        decode(bytes)
    }

    /// Read-modify-write one access record inside a single write transaction.
    ///
    /// The record is rewritten only when its address set changed.
    fn update_access_control<R>(
        &self,
        username: &str,
        apply: impl FnOnce(&mut AccessControlRecord) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            if write_txn.open_table(USERS)?.get(username)?.is_none() {
                return Err(StorageError::NotFound(format!("user {username}")));
            }

            let mut table = write_txn.open_table(ACCESS_CONTROL)?;
            let existing = table.get(username)?.map(|v| v.value().to_vec());
            let mut record = decode(existing)?
                .unwrap_or_else(|| AccessControlRecord::empty(username));
            let before = record.ip_addresses.clone();

            let outcome = apply(&mut record)?;
            if record.ip_addresses != before {
                record.updated_at = Utc::now();
                let json = serde_json::to_vec(&record)?;
                table.insert(username, json.as_slice())?;
            }
            outcome
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    fn lookup(&self, index: IndexTable, key: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(index)?;
        let owner = table.get(key)?.map(|v| v.value().to_string());
        Ok(owner)
    }
}

impl CredentialStore for Database {
    fn find_user_by_username(&self, username: &str) -> StorageResult<Option<UserRecord>> {
        self.get_json(USERS, username)
    }

    fn admin_exists(&self) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        for entry in table.iter()? {
            let (_, value) = entry?;
            let user: UserRecord = serde_json::from_slice(value.value())?;
            if user.admin {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn create_user(&self, user: &UserRecord) -> StorageResult<()> {
        let json = serde_json::to_vec(user)?;
        let username = user.username.as_str();

        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            if users.get(username)?.is_some() {
                return Err(StorageError::AlreadyExists(format!("user {username}")));
            }

            let mut material = write_txn.open_table(CRYPTO_MATERIAL)?;
            for (field, bytes) in user.material() {
                let key = material_key(field, bytes);
                if material.get(key.as_slice())?.is_some() {
                    return Err(StorageError::AlreadyExists(format!("crypto material {field}")));
                }
                material.insert(key.as_slice(), username)?;
            }

            users.insert(username, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_user(&self, username: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            let removed = users.remove(username)?.map(|v| v.value().to_vec());
            let user: UserRecord = decode(removed)?
                .ok_or_else(|| StorageError::NotFound(format!("user {username}")))?;

            let mut material = write_txn.open_table(CRYPTO_MATERIAL)?;
            for (field, bytes) in user.material() {
                material.remove(material_key(field, bytes).as_slice())?;
            }

            let mut keys = write_txn.open_table(KEYS)?;
            let removed = keys.remove(username)?.map(|v| v.value().to_vec());
            if let Some(key) = decode::<KeyPairRecord>(removed)? {
                write_txn.open_table(KEY_HASHES)?.remove(key.key_hash.as_str())?;
                write_txn.open_table(KEY_NAMES)?.remove(key.name.as_str())?;
            }

            let mut sessions = write_txn.open_table(SESSIONS)?;
            let removed = sessions.remove(username)?.map(|v| v.value().to_vec());
            if let Some(session) = decode::<SessionRecord>(removed)? {
                write_txn
                    .open_table(SESSION_TOKENS)?
                    .remove(session.access_token.as_str())?;
            }

            write_txn.open_table(ACCESS_CONTROL)?.remove(username)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn create_key(&self, key: &KeyPairRecord) -> StorageResult<()> {
        let json = serde_json::to_vec(key)?;
        let owner = key.owner.as_str();

        let write_txn = self.db.begin_write()?;
        {
            if write_txn.open_table(USERS)?.get(owner)?.is_none() {
                return Err(StorageError::NotFound(format!("user {owner}")));
            }

            let mut keys = write_txn.open_table(KEYS)?;
            if keys.get(owner)?.is_some() {
                return Err(StorageError::AlreadyExists(format!("key pair for {owner}")));
            }

            let mut hashes = write_txn.open_table(KEY_HASHES)?;
            if hashes.get(key.key_hash.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists("key hash".to_string()));
            }

            let mut names = write_txn.open_table(KEY_NAMES)?;
            if names.get(key.name.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("key name {}", key.name)));
            }

            keys.insert(owner, json.as_slice())?;
            hashes.insert(key.key_hash.as_str(), owner)?;
            names.insert(key.name.as_str(), owner)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn find_key_by_owner(&self, username: &str) -> StorageResult<Option<KeyPairRecord>> {
        self.get_json(KEYS, username)
    }

    fn find_key_by_hash(&self, key_hash: &str) -> StorageResult<Option<KeyPairRecord>> {
        match self.lookup(KEY_HASHES, key_hash)? {
            Some(owner) => self.find_key_by_owner(&owner),
            None => Ok(None),
        }
    }

    fn find_key_by_name(&self, name: &str) -> StorageResult<Option<KeyPairRecord>> {
        match self.lookup(KEY_NAMES, name)? {
            Some(owner) => self.find_key_by_owner(&owner),
            None => Ok(None),
        }
    }

    fn find_access_control(&self, username: &str) -> StorageResult<Option<AccessControlRecord>> {
        self.get_json(ACCESS_CONTROL, username)
    }

    fn grant_ips(&self, username: &str, ips: &BTreeSet<IpAddr>) -> StorageResult<()> {
        self.update_access_control(username, |record| record.grant(ips))
    }

    fn revoke_ips(&self, username: &str, ips: &BTreeSet<IpAddr>) -> StorageResult<Vec<IpAddr>> {
        self.update_access_control(username, |record| Ok(record.revoke(ips)))
    }

    fn clear_ips(&self, username: &str) -> StorageResult<usize> {
        self.update_access_control(username, |record| Ok(record.clear()))
    }

    fn find_session(&self, username: &str) -> StorageResult<Option<SessionRecord>> {
        self.get_json(SESSIONS, username)
    }

    fn find_session_by_token(&self, token: &str) -> StorageResult<Option<SessionRecord>> {
        match self.lookup(SESSION_TOKENS, token)? {
            Some(username) => self.find_session(&username),
            None => Ok(None),
        }
    }

    fn create_session(&self, session: &SessionRecord) -> StorageResult<()> {
        let json = serde_json::to_vec(session)?;
        let username = session.username.as_str();

        let write_txn = self.db.begin_write()?;
        {
            if write_txn.open_table(USERS)?.get(username)?.is_none() {
                return Err(StorageError::NotFound(format!("user {username}")));
            }

            let mut sessions = write_txn.open_table(SESSIONS)?;
            if sessions.get(username)?.is_some() {
                return Err(StorageError::AlreadyExists(format!("session for {username}")));
            }

            let mut tokens = write_txn.open_table(SESSION_TOKENS)?;
            if tokens.get(session.access_token.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists("session token".to_string()));
            }

            sessions.insert(username, json.as_slice())?;
            tokens.insert(session.access_token.as_str(), username)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn set_session_active(&self, username: &str, active: bool) -> StorageResult<SessionRecord> {
        let write_txn = self.db.begin_write()?;
        let session = {
            let mut sessions = write_txn.open_table(SESSIONS)?;

            // Read existing value and deserialize before mutating
            let existing = sessions.get(username)?.map(|v| v.value().to_vec());
            let mut session: SessionRecord = decode(existing)?
                .ok_or_else(|| StorageError::NotFound(format!("session for {username}")))?;

            session.active = active;
            session.updated_at = Utc::now();

            let json = serde_json::to_vec(&session)?;
            sessions.insert(username, json.as_slice())?;
            session
        };
        write_txn.commit()?;
        Ok(session)
    }

    fn health_check(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(USERS)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{conformance, fixtures};
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Database) {
        let temp = TempDir::new().unwrap();
        let db = Database::open(&temp.path().join("custody.redb")).unwrap();
        (temp, db)
    }

    #[test]
    fn conforms_to_store_contract() {
        let (_temp, db) = open_temp();
        conformance::run_all(&db);
    }

    #[test]
    fn open_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/custody.redb");
        let db = Database::open(&path).unwrap();
        db.health_check().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn records_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custody.redb");
        let alice = fixtures::user("alice", true);

        {
            let db = Database::open(&path).unwrap();
            db.create_user(&alice).unwrap();
            db.create_session(&fixtures::session("alice", "tok")).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.find_user_by_username("alice").unwrap(), Some(alice));
        assert!(db.admin_exists().unwrap());
        assert_eq!(
            db.find_session_by_token("tok").unwrap().map(|s| s.username),
            Some("alice".to_string())
        );
    }

    #[test]
    fn rejected_user_leaves_no_index_entries() {
        let (_temp, db) = open_temp();
        let first = fixtures::user("first", false);
        db.create_user(&first).unwrap();

        // Shares only the last-checked field, so earlier material inserts
        // happen before the collision is found.
        let mut late_clash = fixtures::user("second", false);
        late_clash.salt_for_password = first.salt_for_password;
        assert!(db.create_user(&late_clash).is_err());

        let mut retry = fixtures::user("third", false);
        retry.secrets = late_clash.secrets.clone();
        db.create_user(&retry).unwrap();
    }
}
