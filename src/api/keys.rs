// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::extract::State;

use super::envelope::{run_blocking, Sealed, SealedReply};
use crate::auth::{AccessToken, SessionAuthenticator};
use crate::custody::{KeyCustodyService, NewKey};
use crate::error::ServiceError;
use crate::models::{GetKeyResponse, PasswordRequest, PutKeyRequest, PutKeyResponse};
use crate::state::AppState;
use crate::transport::{SealedRequest, SealedResponse};

/// Store the caller's SSH private key under their envelope hierarchy.
#[utoipa::path(
    post,
    path = "/put_key",
    tag = "Keys",
    security(("access_token" = [])),
    request_body(content = SealedRequest, description = "Sealed PutKeyRequest"),
    responses(
        (status = 200, description = "Key stored", body = SealedResponse),
        (status = 401, description = "Bad session or password", body = SealedResponse),
        (status = 409, description = "Key, fingerprint or name already stored", body = SealedResponse)
    )
)]
pub async fn put_key(
    State(state): State<AppState>,
    token: AccessToken,
    Sealed { payload, session }: Sealed<PutKeyRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        let user = SessionAuthenticator::new(store.as_ref()).require_active(token.as_deref())?;
        let record = KeyCustodyService::new(store.as_ref()).put_key(
            &user.username,
            &payload.password,
            NewKey {
                private_key: payload.private_key.as_bytes(),
                public_key: payload.public_key.as_deref(),
                key_name: payload.key_name.as_deref(),
            },
        )?;
        Ok(PutKeyResponse {
            success: true,
            key_name: record.name,
        })
    })
    .await;

    SealedReply::from_result(result, &session, "Successfully stored the key")
}

/// Return the caller's decrypted SSH private key.
#[utoipa::path(
    post,
    path = "/get_key",
    tag = "Keys",
    security(("access_token" = [])),
    request_body(content = SealedRequest, description = "Sealed PasswordRequest"),
    responses(
        (status = 200, description = "Decrypted key", body = SealedResponse),
        (status = 401, description = "Bad session or password", body = SealedResponse),
        (status = 404, description = "No key stored", body = SealedResponse)
    )
)]
pub async fn get_key(
    State(state): State<AppState>,
    token: AccessToken,
    Sealed { payload, session }: Sealed<PasswordRequest>,
) -> SealedReply {
    let store = Arc::clone(&state.store);
    let result = run_blocking(move || {
        let user = SessionAuthenticator::new(store.as_ref()).require_active(token.as_deref())?;
        let plaintext =
            KeyCustodyService::new(store.as_ref()).get_key(&user.username, &payload.password)?;
        let ssh_key = std::str::from_utf8(&plaintext)
            .map_err(|_| ServiceError::Internal("stored key is not UTF-8".into()))?
            .to_owned();
        Ok(GetKeyResponse {
            success: true,
            ssh_key,
        })
    })
    .await;

    SealedReply::from_result(result, &session, "")
}
