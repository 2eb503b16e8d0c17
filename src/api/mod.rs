// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        EmptyRequest, GetAllIpsRequest, GetAllIpsResponse, GetKeyResponse, GrantAccessRequest,
        GrantAccessResponse, HasAccessRequest, HasAccessResponse, IsAdminResponse,
        IsLoggedInResponse, LoginRequest, LoginResponse, PasswordRequest, PublicKeyData,
        PublicKeyResponse, PutKeyRequest, PutKeyResponse, RegisterRequest, RevokeAccessRequest,
        RevokeAccessResponse, RevokeAllRequest, RevokeAllResponse, StatusResponse,
    },
    state::AppState,
    transport::{SealedRequest, SealedResponse},
};

pub mod access;
pub mod envelope;
pub mod health;
pub mod keys;
pub mod transport_key;
pub mod users;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        // Transport bootstrap (not sealed)
        .route("/get_rsa_key", get(transport_key::get_rsa_key))
        // Accounts
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/logout", post(users::logout))
        .route("/is_admin", post(users::is_admin))
        .route("/is_logged_in", post(users::is_logged_in))
        .route("/delete_user", post(users::delete_user))
        // Key custody
        .route("/put_key", post(keys::put_key))
        .route("/get_key", post(keys::get_key))
        // Access control
        .route("/grant_access", post(access::grant_access))
        .route("/revoke_access", post(access::revoke_access))
        .route("/revoke_all", post(access::revoke_all))
        .route("/has_access", post(access::has_access))
        .route("/get_all_ips", post(access::get_all_ips))
        // Health
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        transport_key::get_rsa_key,
        users::register,
        users::login,
        users::logout,
        users::is_admin,
        users::is_logged_in,
        users::delete_user,
        keys::put_key,
        keys::get_key,
        access::grant_access,
        access::revoke_access,
        access::revoke_all,
        access::has_access,
        access::get_all_ips,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            SealedRequest,
            SealedResponse,
            PublicKeyData,
            PublicKeyResponse,
            RegisterRequest,
            LoginRequest,
            EmptyRequest,
            PasswordRequest,
            StatusResponse,
            LoginResponse,
            IsAdminResponse,
            IsLoggedInResponse,
            PutKeyRequest,
            PutKeyResponse,
            GetKeyResponse,
            GrantAccessRequest,
            GrantAccessResponse,
            RevokeAccessRequest,
            RevokeAccessResponse,
            RevokeAllRequest,
            RevokeAllResponse,
            HasAccessRequest,
            HasAccessResponse,
            GetAllIpsRequest,
            GetAllIpsResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    tags(
        (name = "Transport", description = "Transport key distribution"),
        (name = "Users", description = "Registration, sessions and account deletion"),
        (name = "Keys", description = "SSH private key custody"),
        (name = "Access", description = "Per-user host access grants"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
