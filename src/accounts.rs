// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account registration, password verification and the login session slot.
//!
//! Each user has at most one [`SessionRecord`]. Login creates it on first use
//! and afterwards only flips it back to active, returning the same token;
//! logout flips it inactive. Sessions are never deleted except by account
//! deletion.
//!
//! Methods block (PBKDF2, storage); async callers use `spawn_blocking`.

use chrono::Utc;
use uuid::Uuid;

use crate::audit::AuditEventType;
use crate::audit_log;
use crate::crypto::{constant_time_eq, kdf, random_bytes};
use crate::error::{ServiceError, ServiceResult};
use crate::secrets::SecretBundle;
use crate::storage::{CredentialStore, SessionRecord, StorageError, UserRecord};

/// Salted-hash password check, constant time.
pub fn verify_password(user: &UserRecord, password: &str) -> bool {
    let candidate = kdf::hash(password, &user.salt_for_password);
    constant_time_eq(&candidate, &user.password_hash)
}

/// Account and session operations over a [`CredentialStore`].
pub struct AccountService<'a> {
    store: &'a dyn CredentialStore,
}

impl<'a> AccountService<'a> {
    pub fn new(store: &'a dyn CredentialStore) -> Self {
        Self { store }
    }

    /// Create a user with a fresh envelope hierarchy.
    ///
    /// The first user ever registered becomes the admin.
    pub fn register(&self, username: &str, password: &str, name: &str) -> ServiceResult<UserRecord> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ServiceError::MalformedRequest);
        }
        if self.store.find_user_by_username(username)?.is_some() {
            return Err(ServiceError::conflict("Username already taken"));
        }

        let admin = !self.store.admin_exists()?;
        let (secrets, _dek) = SecretBundle::generate(password)?;
        let salt_for_password = random_bytes();

        let user = UserRecord {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            name: name.to_string(),
            admin,
            password_hash: kdf::hash(password, &salt_for_password),
            salt_for_password,
            secrets,
            created_at: Utc::now(),
        };
        self.store.create_user(&user)?;

        audit_log!(AuditEventType::UserRegistered, username);
        tracing::info!(username, admin, "User registered");
        Ok(user)
    }

    /// Look up a user and check the password. Any mismatch is `Unauthorized`.
    pub fn authenticate(&self, username: &str, password: &str) -> ServiceResult<UserRecord> {
        let user = self
            .store
            .find_user_by_username(username)?
            .ok_or(ServiceError::Unauthorized)?;

        if !verify_password(&user, password) {
            return Err(ServiceError::Unauthorized);
        }
        Ok(user)
    }

    /// Verify credentials and activate the user's session slot.
    pub fn login(&self, username: &str, password: &str) -> ServiceResult<SessionRecord> {
        let user = match self.authenticate(username, password) {
            Ok(user) => user,
            Err(err) => {
                crate::audit::AuditEvent::new(AuditEventType::LoginFailed)
                    .with_user(username)
                    .failed("invalid credentials")
                    .emit();
                return Err(err);
            }
        };

        // The hierarchy must still open under this password.
        drop(user.secrets.unwrap_dek(password)?);

        let session = match self.store.find_session(username)? {
            Some(session) if session.active => session,
            Some(_) => self.store.set_session_active(username, true)?,
            None => self.open_session(username)?,
        };

        audit_log!(AuditEventType::LoginSucceeded, username);
        Ok(session)
    }

    /// Create the session slot, or activate it if a concurrent login got there
    /// first.
    fn open_session(&self, username: &str) -> ServiceResult<SessionRecord> {
        let now = Utc::now();
        let session = SessionRecord {
            username: username.to_string(),
            access_token: Uuid::new_v4().simple().to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        };

        match self.store.create_session(&session) {
            Ok(()) => Ok(session),
            Err(StorageError::AlreadyExists(_)) => {
                Ok(self.store.set_session_active(username, true)?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Deactivate the session slot.
    pub fn logout(&self, username: &str) -> ServiceResult<()> {
        if self.store.find_session(username)?.is_none() {
            return Err(ServiceError::not_found("No session for user"));
        }
        self.store.set_session_active(username, false)?;

        audit_log!(AuditEventType::LoggedOut, username);
        Ok(())
    }

    pub fn is_logged_in(&self, username: &str) -> ServiceResult<bool> {
        Ok(self
            .store
            .find_session(username)?
            .is_some_and(|session| session.active))
    }

    pub fn is_admin(&self, username: &str) -> ServiceResult<bool> {
        self.store
            .find_user_by_username(username)?
            .map(|user| user.admin)
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    /// Re-verify the password, then delete the user and everything it owns.
    pub fn delete_account(&self, username: &str, password: &str) -> ServiceResult<()> {
        self.authenticate(username, password)?;
        self.store.delete_user(username)?;

        audit_log!(AuditEventType::UserDeleted, username);
        tracing::info!(username, "User deleted");
        Ok(())
    }
}
