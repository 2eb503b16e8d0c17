// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token resolution.

use super::{AuthError, AuthenticatedUser, Role};
use crate::accounts::verify_password;
use crate::audit::{AuditEvent, AuditEventType};
use crate::error::ServiceResult;
use crate::storage::{CredentialStore, SessionRecord, UserRecord};

/// Resolves bearer tokens against the session and user tables.
///
/// Blocking (storage, password hashing); run it from `spawn_blocking`.
pub struct SessionAuthenticator<'a> {
    store: &'a dyn CredentialStore,
}

impl<'a> SessionAuthenticator<'a> {
    pub fn new(store: &'a dyn CredentialStore) -> Self {
        Self { store }
    }

    fn lookup(&self, token: Option<&str>) -> ServiceResult<(UserRecord, SessionRecord)> {
        let token = token.ok_or(AuthError::MissingToken)?;
        let session = self
            .store
            .find_session_by_token(token)?
            .ok_or(AuthError::UnknownToken)?;
        let user = self
            .store
            .find_user_by_username(&session.username)?
            .ok_or(AuthError::UnknownToken)?;
        Ok((user, session))
    }

    /// Resolve a token regardless of whether the session is active.
    pub fn resolve(&self, token: Option<&str>) -> ServiceResult<(AuthenticatedUser, SessionRecord)> {
        let (user, session) = self.lookup(token)?;
        Ok((identity(&user), session))
    }

    /// Resolve a token to a logged-in user.
    pub fn require_active(&self, token: Option<&str>) -> ServiceResult<AuthenticatedUser> {
        let (user, session) = self.lookup(token)?;
        if !session.active {
            return Err(AuthError::InactiveSession.into());
        }
        Ok(identity(&user))
    }

    /// Resolve a token to a logged-in admin and re-verify their password.
    pub fn require_admin(&self, token: Option<&str>, password: &str) -> ServiceResult<AuthenticatedUser> {
        let (user, session) = self.lookup(token)?;
        if !session.active {
            return Err(AuthError::InactiveSession.into());
        }
        if !user.admin {
            AuditEvent::new(AuditEventType::PermissionDenied)
                .with_user(user.username.as_str())
                .failed("admin role required")
                .emit();
            return Err(AuthError::InsufficientPermissions.into());
        }
        if !verify_password(&user, password) {
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(identity(&user))
    }
}

fn identity(user: &UserRecord) -> AuthenticatedUser {
    AuthenticatedUser {
        username: user.username.clone(),
        name: user.name.clone(),
        role: Role::from_admin_flag(user.admin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountService;
    use crate::error::ServiceError;
    use crate::storage::InMemoryStore;

    struct Fixture {
        store: InMemoryStore,
        root_token: String,
        alice_token: String,
    }

    fn setup() -> Fixture {
        let store = InMemoryStore::new();
        let accounts = AccountService::new(&store);
        accounts.register("root", "rootpw", "Root").unwrap();
        accounts.register("alice", "pw1", "Alice").unwrap();
        let root_token = accounts.login("root", "rootpw").unwrap().access_token;
        let alice_token = accounts.login("alice", "pw1").unwrap().access_token;
        Fixture {
            store,
            root_token,
            alice_token,
        }
    }

    #[test]
    fn active_session_resolves_user() {
        let fx = setup();
        let auth = SessionAuthenticator::new(&fx.store);

        let alice = auth.require_active(Some(&fx.alice_token)).unwrap();
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.name, "Alice");
        assert!(!alice.is_admin());
    }

    #[test]
    fn missing_or_unknown_token_is_unauthorized() {
        let fx = setup();
        let auth = SessionAuthenticator::new(&fx.store);

        assert!(matches!(auth.require_active(None), Err(ServiceError::Unauthorized)));
        assert!(matches!(
            auth.require_active(Some("not-a-token")),
            Err(ServiceError::Unauthorized)
        ));
    }

    #[test]
    fn logged_out_session_resolves_but_is_not_active() {
        let fx = setup();
        AccountService::new(&fx.store).logout("alice").unwrap();
        let auth = SessionAuthenticator::new(&fx.store);

        let (user, session) = auth.resolve(Some(&fx.alice_token)).unwrap();
        assert_eq!(user.username, "alice");
        assert!(!session.active);
        assert!(matches!(
            auth.require_active(Some(&fx.alice_token)),
            Err(ServiceError::Unauthorized)
        ));
    }

    #[test]
    fn admin_requires_role_and_password() {
        let fx = setup();
        let auth = SessionAuthenticator::new(&fx.store);

        let root = auth.require_admin(Some(&fx.root_token), "rootpw").unwrap();
        assert!(root.is_admin());

        assert!(matches!(
            auth.require_admin(Some(&fx.root_token), "wrong"),
            Err(ServiceError::Unauthorized)
        ));
        assert!(matches!(
            auth.require_admin(Some(&fx.alice_token), "pw1"),
            Err(ServiceError::Unauthorized)
        ));
    }

    #[test]
    fn deleted_user_token_stops_resolving() {
        let fx = setup();
        AccountService::new(&fx.store)
            .delete_account("alice", "pw1")
            .unwrap();

        let auth = SessionAuthenticator::new(&fx.store);
        assert!(auth.resolve(Some(&fx.alice_token)).is_err());
    }
}
