// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access-control endpoints.
//!
//! Grants and revocations are admin-only and re-verify the admin's password.
//! Queries are open to any logged-in user for their own username.

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::State;
use zeroize::Zeroizing;

use super::envelope::{run_blocking, Sealed, SealedReply};
use crate::access::AccessControlService;
use crate::auth::{AccessToken, AuthError, AuthenticatedUser, SessionAuthenticator};
use crate::custody::KeyCustodyService;
use crate::error::ServiceResult;
use crate::models::{
    GetAllIpsRequest, GetAllIpsResponse, GrantAccessRequest, GrantAccessResponse,
    HasAccessRequest, HasAccessResponse, RevokeAccessRequest, RevokeAccessResponse,
    RevokeAllRequest, RevokeAllResponse,
};
use crate::provisioning::{ProvisioningJob, ProvisioningQueue};
use crate::state::AppState;
use crate::storage::CredentialStore;
use crate::transport::{SealedRequest, SealedResponse};

fn to_strings(ips: &[IpAddr]) -> Vec<String> {
    ips.iter().map(ToString::to_string).collect()
}

fn require_self_or_admin(user: &AuthenticatedUser, username: &str) -> ServiceResult<()> {
    if user.is_admin() || user.username == username {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermissions.into())
    }
}

/// Queue one provisioning job per granted host using the admin's own key.
///
/// Returns how many jobs the worker accepted. The grant has already been
/// committed, so key problems are logged rather than returned.
fn dispatch_grant(
    store: &dyn CredentialStore,
    queue: &ProvisioningQueue,
    admin: &AuthenticatedUser,
    password: &str,
    grantee: &str,
    remote_username: &str,
    granted: &[IpAddr],
) -> ServiceResult<usize> {
    if store.find_key_by_owner(&admin.username)?.is_none() {
        tracing::debug!(admin = %admin.username, "Admin has no stored key, skipping provisioning");
        return Ok(0);
    }

    let ssh_key = match KeyCustodyService::new(store).get_key(&admin.username, password) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(admin = %admin.username, error = %e, "Could not unwrap admin key for provisioning");
            return Ok(0);
        }
    };

    let dispatched = granted
        .iter()
        .filter(|ip| {
            queue.dispatch(ProvisioningJob {
                username: grantee.to_string(),
                ssh_key: Zeroizing::new(ssh_key.to_vec()),
                ip_address: **ip,
                remote_username: remote_username.to_string(),
            })
        })
        .count();
    Ok(dispatched)
}

/// Grant a user access to one or more hosts.
///
/// With `remote_username`, the admin's stored key is provisioned to each
/// newly granted host.
#[utoipa::path(
    post,
    path = "/grant_access",
    tag = "Access",
    security(("access_token" = [])),
    request_body(content = SealedRequest, description = "Sealed GrantAccessRequest"),
    responses(
        (status = 200, description = "Access granted", body = SealedResponse),
        (status = 401, description = "Not an admin, or bad password", body = SealedResponse),
        (status = 404, description = "Grantee not found", body = SealedResponse),
        (status = 409, description = "An address is already granted", body = SealedResponse)
    )
)]
pub async fn grant_access(
    State(state): State<AppState>,
    token: AccessToken,
    Sealed { payload, session }: Sealed<GrantAccessRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let queue = state.provisioning.clone();
    let result = run_blocking(move || {
        let admin = SessionAuthenticator::new(store.as_ref())
            .require_admin(token.as_deref(), &payload.password)?;
        let granted = AccessControlService::new(store.as_ref())
            .grant(&payload.username, &payload.ip_addresses)?;

        let dispatched = match payload.remote_username.as_deref() {
            Some(remote_username) => dispatch_grant(
                store.as_ref(),
                &queue,
                &admin,
                &payload.password,
                &payload.username,
                remote_username,
                &granted,
            )?,
            None => 0,
        };

        Ok(GrantAccessResponse {
            success: true,
            granted: to_strings(&granted),
            dispatched,
        })
    })
    .await;

    SealedReply::from_result(result, &session, "Access granted")
}

#[utoipa::path(
    post,
    path = "/revoke_access",
    tag = "Access",
    security(("access_token" = [])),
    request_body(content = SealedRequest, description = "Sealed RevokeAccessRequest"),
    responses(
        (status = 200, description = "Access revoked", body = SealedResponse),
        (status = 401, description = "Not an admin, or bad password", body = SealedResponse),
        (status = 404, description = "User not found", body = SealedResponse)
    )
)]
pub async fn revoke_access(
    State(state): State<AppState>,
    token: AccessToken,
    Sealed { payload, session }: Sealed<RevokeAccessRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        SessionAuthenticator::new(store.as_ref())
            .require_admin(token.as_deref(), &payload.password)?;
        let revoked = AccessControlService::new(store.as_ref())
            .revoke(&payload.username, &payload.ip_addresses)?;
        Ok(RevokeAccessResponse {
            success: true,
            revoked: to_strings(&revoked),
        })
    })
    .await;

    SealedReply::from_result(result, &session, "Access revoked")
}

#[utoipa::path(
    post,
    path = "/revoke_all",
    tag = "Access",
    security(("access_token" = [])),
    request_body(content = SealedRequest, description = "Sealed RevokeAllRequest"),
    responses(
        (status = 200, description = "Access revoked", body = SealedResponse),
        (status = 401, description = "Not an admin, or bad password", body = SealedResponse),
        (status = 404, description = "User not found", body = SealedResponse)
    )
)]
pub async fn revoke_all(
    State(state): State<AppState>,
    token: AccessToken,
    Sealed { payload, session }: Sealed<RevokeAllRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        SessionAuthenticator::new(store.as_ref())
            .require_admin(token.as_deref(), &payload.password)?;
        let revoked = AccessControlService::new(store.as_ref()).revoke_all(&payload.username)?;
        Ok(RevokeAllResponse {
            success: true,
            revoked,
        })
    })
    .await;

    SealedReply::from_result(result, &session, "Access revoked")
}

#[utoipa::path(
    post,
    path = "/has_access",
    tag = "Access",
    security(("access_token" = [])),
    request_body(content = SealedRequest, description = "Sealed HasAccessRequest"),
    responses(
        (status = 200, description = "Access details", body = SealedResponse),
        (status = 401, description = "Bad session, or another user's access", body = SealedResponse),
        (status = 404, description = "User not found", body = SealedResponse)
    )
)]
pub async fn has_access(
    State(state): State<AppState>,
    token: AccessToken,
    Sealed { payload, session }: Sealed<HasAccessRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        let user = SessionAuthenticator::new(store.as_ref()).require_active(token.as_deref())?;
        require_self_or_admin(&user, &payload.username)?;
        let has_access = AccessControlService::new(store.as_ref())
            .has_access(&payload.username, &payload.ip_address)?;
        Ok(HasAccessResponse {
            success: true,
            has_access,
        })
    })
    .await;

    SealedReply::from_result(result, &session, "Access details")
}

#[utoipa::path(
    post,
    path = "/get_all_ips",
    tag = "Access",
    security(("access_token" = [])),
    request_body(content = SealedRequest, description = "Sealed GetAllIpsRequest"),
    responses(
        (status = 200, description = "Granted addresses, sorted", body = SealedResponse),
        (status = 401, description = "Bad session, or another user's access", body = SealedResponse)
    )
)]
pub async fn get_all_ips(
    State(state): State<AppState>,
    token: AccessToken,
    Sealed { payload, session }: Sealed<GetAllIpsRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        let user = SessionAuthenticator::new(store.as_ref()).require_active(token.as_deref())?;
        require_self_or_admin(&user, &payload.username)?;
        let ips = AccessControlService::new(store.as_ref()).get_all_ips(&payload.username)?;
        Ok(GetAllIpsResponse {
            success: true,
            ip_addresses: to_strings(&ips),
        })
    })
    .await;

    SealedReply::from_result(result, &session, "Access details")
}
