// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Each variant carries a stable `error_code` for logs. Clients only ever see
//! the `Unauthorized` kind these convert into.

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No token header present
    #[error("access token is required")]
    MissingToken,
    /// Token does not resolve to a session and user
    #[error("access token is not recognised")]
    UnknownToken,
    /// Session slot exists but is logged out
    #[error("session is not active")]
    InactiveSession,
    /// Password re-verification failed
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Operation requires the admin role
    #[error("insufficient permissions for this operation")]
    InsufficientPermissions,
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::UnknownToken => "unknown_token",
            AuthError::InactiveSession => "inactive_session",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InsufficientPermissions => "insufficient_permissions",
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        tracing::debug!(error_code = err.error_code(), "Authentication rejected");
        ServiceError::Unauthorized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn every_auth_error_is_unauthorized() {
        for err in [
            AuthError::MissingToken,
            AuthError::UnknownToken,
            AuthError::InactiveSession,
            AuthError::InvalidCredentials,
            AuthError::InsufficientPermissions,
        ] {
            let service: ServiceError = err.into();
            assert_eq!(service.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(service.public_message(), "Unauthorized");
        }
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(AuthError::MissingToken.error_code(), "missing_token");
        assert_eq!(
            AuthError::InsufficientPermissions.error_code(),
            "insufficient_permissions"
        );
    }
}
