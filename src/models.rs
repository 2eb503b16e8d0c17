// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response payloads carried *inside* the sealed envelope. All
//! types derive `ToSchema` for the OpenAPI document; the wire form of every
//! sealed endpoint is still [`SealedRequest`](crate::transport::SealedRequest)
//! in and [`SealedResponse`](crate::transport::SealedResponse) out.
//!
//! Request types holding a password or key material zeroize on drop.
//!
//! ## Model Categories
//!
//! - **Accounts**: register, login, session flags, deletion
//! - **Keys**: private key custody
//! - **Access**: IP grants and queries
//! - **Transport**: the public transport key

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use zeroize::{Zeroize, ZeroizeOnDrop};

// =============================================================================
// Accounts
// =============================================================================

#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    /// Display name
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body of endpoints that only need the session token.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EmptyRequest {}

/// Password re-entry for `delete_user` and `get_key`.
#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct PasswordRequest {
    pub password: String,
}

/// Inner reply carrying only the outcome flag.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub access_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IsAdminResponse {
    pub success: bool,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IsLoggedInResponse {
    pub success: bool,
    pub is_logged_in: bool,
}

// =============================================================================
// Keys
// =============================================================================

#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct PutKeyRequest {
    pub password: String,
    /// PEM/OpenSSH private key text
    pub private_key: String,
    #[serde(default)]
    pub public_key: Option<String>,
    /// Defaults to the username
    #[serde(default)]
    pub key_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PutKeyResponse {
    pub success: bool,
    pub key_name: String,
}

#[derive(Serialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct GetKeyResponse {
    pub success: bool,
    pub ssh_key: String,
}

// =============================================================================
// Access
// =============================================================================

#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct GrantAccessRequest {
    /// Grantee
    pub username: String,
    pub ip_addresses: Vec<String>,
    /// Admin password re-entry
    pub password: String,
    /// When set, the admin's key is provisioned to each granted host
    #[serde(default)]
    pub remote_username: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GrantAccessResponse {
    pub success: bool,
    pub granted: Vec<String>,
    /// Number of provisioning jobs accepted by the worker
    pub dispatched: usize,
}

#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct RevokeAccessRequest {
    pub username: String,
    pub ip_addresses: Vec<String>,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeAccessResponse {
    pub success: bool,
    /// Addresses that were granted and are now removed
    pub revoked: Vec<String>,
}

#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct RevokeAllRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeAllResponse {
    pub success: bool,
    pub revoked: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HasAccessRequest {
    pub username: String,
    pub ip_address: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HasAccessResponse {
    pub success: bool,
    pub has_access: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GetAllIpsRequest {
    pub username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GetAllIpsResponse {
    pub success: bool,
    pub ip_addresses: Vec<String>,
}

// =============================================================================
// Transport
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PublicKeyData {
    /// SubjectPublicKeyInfo PEM
    pub public_key: String,
}

/// Reply of `GET /get_rsa_key` (not sealed).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PublicKeyResponse {
    pub data: PublicKeyData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_default() {
        let put: PutKeyRequest =
            serde_json::from_str(r#"{"password":"pw","private_key":"k"}"#).unwrap();
        assert!(put.public_key.is_none());
        assert!(put.key_name.is_none());

        let grant: GrantAccessRequest = serde_json::from_str(
            r#"{"username":"bob","ip_addresses":["10.0.0.1"],"password":"pw"}"#,
        )
        .unwrap();
        assert!(grant.remote_username.is_none());

        let register: RegisterRequest =
            serde_json::from_str(r#"{"username":"a","password":"b"}"#).unwrap();
        assert_eq!(register.name, "");
    }

    #[test]
    fn empty_request_accepts_any_object() {
        assert!(serde_json::from_str::<EmptyRequest>("{}").is_ok());
        assert!(serde_json::from_str::<EmptyRequest>(r#"{"extra":1}"#).is_ok());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        assert!(serde_json::from_str::<LoginRequest>(r#"{"username":"a"}"#).is_err());
        assert!(serde_json::from_str::<HasAccessRequest>(r#"{"username":"a"}"#).is_err());
    }

    #[test]
    fn public_key_response_shape() {
        let json = serde_json::to_value(PublicKeyResponse {
            data: PublicKeyData {
                public_key: "PEM".into(),
            },
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"data": {"public_key": "PEM"}}));
    }
}
