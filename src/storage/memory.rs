// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory credential store for development mode and tests.
//!
//! Mirrors the redb backend table for table. All checks run before any
//! mutation under one write lock, so a rejected call changes nothing.

use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use super::{
    AccessControlRecord, CredentialStore, KeyPairRecord, SessionRecord, StorageError,
    StorageResult, UserRecord,
};

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    crypto_material: HashMap<(&'static str, Vec<u8>), String>,
    keys: HashMap<String, KeyPairRecord>,
    key_hashes: HashMap<String, String>,
    key_names: HashMap<String, String>,
    access_control: HashMap<String, AccessControlRecord>,
    sessions: HashMap<String, SessionRecord>,
    session_tokens: HashMap<String, String>,
}

impl Tables {
    fn require_user(&self, username: &str) -> StorageResult<()> {
        if self.users.contains_key(username) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!("user {username}")))
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StorageError::Poisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StorageError::Poisoned)
    }

    /// Read-modify-write one access record under the write lock.
    fn update_access_control<R>(
        &self,
        username: &str,
        apply: impl FnOnce(&mut AccessControlRecord) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let mut tables = self.write()?;
        tables.require_user(username)?;

        let mut record = tables
            .access_control
            .get(username)
            .cloned()
            .unwrap_or_else(|| AccessControlRecord::empty(username));
        let before = record.ip_addresses.clone();

        let outcome = apply(&mut record)?;
        if record.ip_addresses != before {
            record.updated_at = Utc::now();
            tables.access_control.insert(username.to_string(), record);
        }
        Ok(outcome)
    }
}

impl CredentialStore for InMemoryStore {
    fn find_user_by_username(&self, username: &str) -> StorageResult<Option<UserRecord>> {
        Ok(self.read()?.users.get(username).cloned())
    }

    fn admin_exists(&self) -> StorageResult<bool> {
        Ok(self.read()?.users.values().any(|user| user.admin))
    }

    fn create_user(&self, user: &UserRecord) -> StorageResult<()> {
        let mut tables = self.write()?;

        if tables.users.contains_key(&user.username) {
            return Err(StorageError::AlreadyExists(format!("user {}", user.username)));
        }
        for (field, bytes) in user.material() {
            if tables.crypto_material.contains_key(&(field, bytes.to_vec())) {
                return Err(StorageError::AlreadyExists(format!("crypto material {field}")));
            }
        }

        for (field, bytes) in user.material() {
            tables
                .crypto_material
                .insert((field, bytes.to_vec()), user.username.clone());
        }
        tables.users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    fn delete_user(&self, username: &str) -> StorageResult<()> {
        let mut tables = self.write()?;

        let user = tables
            .users
            .remove(username)
            .ok_or_else(|| StorageError::NotFound(format!("user {username}")))?;

        for (field, bytes) in user.material() {
            tables.crypto_material.remove(&(field, bytes.to_vec()));
        }
        if let Some(key) = tables.keys.remove(username) {
            tables.key_hashes.remove(&key.key_hash);
            tables.key_names.remove(&key.name);
        }
        if let Some(session) = tables.sessions.remove(username) {
            tables.session_tokens.remove(&session.access_token);
        }
        tables.access_control.remove(username);
        Ok(())
    }

    fn create_key(&self, key: &KeyPairRecord) -> StorageResult<()> {
        let mut tables = self.write()?;

        tables.require_user(&key.owner)?;
        if tables.keys.contains_key(&key.owner) {
            return Err(StorageError::AlreadyExists(format!("key pair for {}", key.owner)));
        }
        if tables.key_hashes.contains_key(&key.key_hash) {
            return Err(StorageError::AlreadyExists("key hash".to_string()));
        }
        if tables.key_names.contains_key(&key.name) {
            return Err(StorageError::AlreadyExists(format!("key name {}", key.name)));
        }

        tables.key_hashes.insert(key.key_hash.clone(), key.owner.clone());
        tables.key_names.insert(key.name.clone(), key.owner.clone());
        tables.keys.insert(key.owner.clone(), key.clone());
        Ok(())
    }

    fn find_key_by_owner(&self, username: &str) -> StorageResult<Option<KeyPairRecord>> {
        Ok(self.read()?.keys.get(username).cloned())
    }

    fn find_key_by_hash(&self, key_hash: &str) -> StorageResult<Option<KeyPairRecord>> {
        let tables = self.read()?;
        Ok(tables
            .key_hashes
            .get(key_hash)
            .and_then(|owner| tables.keys.get(owner))
            .cloned())
    }

    fn find_key_by_name(&self, name: &str) -> StorageResult<Option<KeyPairRecord>> {
        let tables = self.read()?;
        Ok(tables
            .key_names
            .get(name)
            .and_then(|owner| tables.keys.get(owner))
            .cloned())
    }

    fn find_access_control(&self, username: &str) -> StorageResult<Option<AccessControlRecord>> {
        Ok(self.read()?.access_control.get(username).cloned())
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
        Ok(self.read()?.sessions.get(username).cloned())
    }

    fn find_session_by_token(&self, token: &str) -> StorageResult<Option<SessionRecord>> {
        let tables = self.read()?;
        Ok(tables
            .session_tokens
            .get(token)
            .and_then(|username| tables.sessions.get(username))
            .cloned())
    }

    fn create_session(&self, session: &SessionRecord) -> StorageResult<()> {
        let mut tables = self.write()?;

        tables.require_user(&session.username)?;
        if tables.sessions.contains_key(&session.username) {
            return Err(StorageError::AlreadyExists(format!(
                "session for {}",
                session.username
            )));
        }
        if tables.session_tokens.contains_key(&session.access_token) {
            return Err(StorageError::AlreadyExists("session token".to_string()));
        }

        tables
            .session_tokens
            .insert(session.access_token.clone(), session.username.clone());
        tables
            .sessions
            .insert(session.username.clone(), session.clone());
        Ok(())
    }

    fn set_session_active(&self, username: &str, active: bool) -> StorageResult<SessionRecord> {
        let mut tables = self.write()?;
        let session = tables
            .sessions
            .get_mut(username)
            .ok_or_else(|| StorageError::NotFound(format!("session for {username}")))?;

        session.active = active;
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    fn health_check(&self) -> StorageResult<()> {
        self.read().map(|_| ())
    }
}
