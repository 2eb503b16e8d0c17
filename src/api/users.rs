// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account endpoints: registration, login/logout, session and role queries,
//! account deletion.

use std::sync::Arc;

use axum::extract::State;

use super::envelope::{run_blocking, Sealed, SealedReply};
use crate::accounts::AccountService;
use crate::auth::{AccessToken, SessionAuthenticator};
use crate::models::{
    EmptyRequest, IsAdminResponse, IsLoggedInResponse, LoginRequest, LoginResponse,
    PasswordRequest, RegisterRequest, StatusResponse,
};
use crate::state::AppState;
use crate::transport::{SealedRequest, SealedResponse};

/// Register a new user. The first registered user becomes the admin.
#[utoipa::path(
    post,
    path = "/register",
    tag = "Users",
    request_body(content = SealedRequest, description = "Sealed RegisterRequest"),
    responses(
        (status = 200, description = "User created", body = SealedResponse),
        (status = 400, description = "Malformed request"),
        (status = 409, description = "Username already taken", body = SealedResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Sealed { payload, session }: Sealed<RegisterRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        AccountService::new(store.as_ref()).register(
            &payload.username,
            &payload.password,
            &payload.name,
        )?;
        Ok(StatusResponse { success: true })
    })
    .await;

    SealedReply::from_result(result, &session, "User created")
}

/// Verify credentials and return the session token.
///
/// A repeated login returns the same token.
#[utoipa::path(
    post,
    path = "/login",
    tag = "Users",
    request_body(content = SealedRequest, description = "Sealed LoginRequest"),
    responses(
        (status = 200, description = "Login successful", body = SealedResponse),
        (status = 401, description = "Invalid credentials", body = SealedResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Sealed { payload, session }: Sealed<LoginRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        let record =
            AccountService::new(store.as_ref()).login(&payload.username, &payload.password)?;
        Ok(LoginResponse {
            success: true,
            access_token: record.access_token,
        })
    })
    .await;

    SealedReply::from_result(result, &session, "Login successful")
}

#[utoipa::path(
    post,
    path = "/logout",
    tag = "Users",
    security(("access_token" = [])),
    request_body(content = SealedRequest, description = "Sealed empty object"),
    responses(
        (status = 200, description = "Log out successful", body = SealedResponse),
        (status = 401, description = "Missing, unknown or inactive session", body = SealedResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    token: AccessToken,
    Sealed { session, .. }: Sealed<EmptyRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        let user = SessionAuthenticator::new(store.as_ref()).require_active(token.as_deref())?;
        AccountService::new(store.as_ref()).logout(&user.username)?;
        Ok(StatusResponse { success: true })
    })
    .await;

    SealedReply::from_result(result, &session, "Log out successful")
}

#[utoipa::path(
    post,
    path = "/is_admin",
    tag = "Users",
    security(("access_token" = [])),
    request_body(content = SealedRequest, description = "Sealed empty object"),
    responses(
        (status = 200, description = "Admin flag of the caller", body = SealedResponse),
        (status = 401, description = "Missing, unknown or inactive session", body = SealedResponse)
    )
)]
pub async fn is_admin(
    State(state): State<AppState>,
    token: AccessToken,
    Sealed { session, .. }: Sealed<EmptyRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        let user = SessionAuthenticator::new(store.as_ref()).require_active(token.as_deref())?;
        let is_admin = AccountService::new(store.as_ref()).is_admin(&user.username)?;
        Ok(IsAdminResponse {
            success: true,
            is_admin,
        })
    })
    .await;

    SealedReply::from_result(result, &session, "")
}

/// Whether the token's session slot is active. Works after logout.
#[utoipa::path(
    post,
    path = "/is_logged_in",
    tag = "Users",
    security(("access_token" = [])),
    request_body(content = SealedRequest, description = "Sealed empty object"),
    responses(
        (status = 200, description = "Session state", body = SealedResponse),
        (status = 401, description = "Missing or unknown token", body = SealedResponse)
    )
)]
pub async fn is_logged_in(
    State(state): State<AppState>,
    token: AccessToken,
    Sealed { session, .. }: Sealed<EmptyRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        let (user, _) = SessionAuthenticator::new(store.as_ref()).resolve(token.as_deref())?;
        let is_logged_in = AccountService::new(store.as_ref()).is_logged_in(&user.username)?;
        Ok(IsLoggedInResponse {
            success: true,
            is_logged_in,
        })
    })
    .await;

    SealedReply::from_result(result, &session, "")
}

/// Delete the caller's account, key and grants after re-checking the password.
#[utoipa::path(
    post,
    path = "/delete_user",
    tag = "Users",
    security(("access_token" = [])),
    request_body(content = SealedRequest, description = "Sealed PasswordRequest"),
    responses(
        (status = 200, description = "User deleted", body = SealedResponse),
        (status = 401, description = "Bad session or password", body = SealedResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    token: AccessToken,
    Sealed { payload, session }: Sealed<PasswordRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        let user = SessionAuthenticator::new(store.as_ref()).require_active(token.as_deref())?;
        AccountService::new(store.as_ref()).delete_account(&user.username, &payload.password)?;
        Ok(StatusResponse { success: true })
    })
    .await;

    SealedReply::from_result(result, &session, "User deleted")
}
