// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session-token authentication for the custody API.
//!
//! ## Auth Flow
//!
//! 1. Client logs in through the sealed `/login` endpoint and receives an
//!    opaque session token
//! 2. Client sends it on later requests, as `access_token: <token>` or
//!    `Authorization: Bearer <token>`
//! 3. Server resolves token → session slot → user, and checks:
//!    - the slot is active (protected operations)
//!    - the user is an admin and re-enters their password (grant/revoke)
//!
//! Every failure is reported to the client as a plain `Unauthorized`; the
//! specific reason is only logged.

pub mod error;
pub mod extractor;
pub mod roles;
pub mod session;

use serde::Serialize;

pub use error::AuthError;
pub use extractor::{AccessToken, ACCESS_TOKEN_HEADER};
pub use roles::Role;
pub use session::SessionAuthenticator;

/// Identity resolved from a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub username: String,
    pub name: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
