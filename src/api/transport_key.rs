// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::error::{ApiError, ServiceError};
use crate::models::{PublicKeyData, PublicKeyResponse};
use crate::state::AppState;

/// Publish the transport public key.
///
/// Generates the key pair on first use and rotates it once expired. Clients
/// wrap each request's session key under this key.
#[utoipa::path(
    get,
    path = "/get_rsa_key",
    tag = "Transport",
    responses(
        (status = 200, description = "Current transport public key", body = PublicKeyResponse),
        (status = 500, description = "Key generation failed")
    )
)]
pub async fn get_rsa_key(State(state): State<AppState>) -> Result<Json<PublicKeyResponse>, ApiError> {
    let pair = state
        .transport
        .get_or_refresh()
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    Ok(Json(PublicKeyResponse {
        data: PublicKeyData {
            public_key: pair.public_key_pem().to_string(),
        },
    }))
}
