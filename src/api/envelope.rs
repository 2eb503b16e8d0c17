// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sealed request extractor and sealed reply.
//!
//! [`Sealed<T>`] opens the transport envelope and deserializes the inner
//! payload into `T`. Until a session key is recovered, rejections are plain
//! [`ApiError`] JSON; once it exists, every reply (including a payload that
//! does not match `T`) is sealed under it.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;

use crate::error::{ApiError, ServiceError, ServiceResult};
use crate::state::AppState;
use crate::transport::{decrypt_request, encrypt_response, parse_envelope, SealedResponse, SessionKey};

/// Decrypted request payload plus the session key to answer with.
pub struct Sealed<T> {
    pub payload: T,
    pub session: SessionKey,
}

impl<T> FromRequest<AppState> for Sealed<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|_| ApiError::bad_request("Malformed request").into_response())?;

        let envelope = parse_envelope(&body).map_err(|e| ApiError::from(e).into_response())?;
        let keys = state.transport.decryption_keys().await;

        let (value, session) =
            tokio::task::spawn_blocking(move || decrypt_request(&envelope, &keys))
                .await
                .map_err(|e| ApiError::from(ServiceError::from(e)).into_response())?
                .map_err(|e| {
                    tracing::debug!("Rejected sealed request");
                    ApiError::from(e).into_response()
                })?;

        match serde_json::from_value::<T>(value) {
            Ok(payload) => Ok(Self { payload, session }),
            Err(e) => {
                tracing::debug!(error = %e, "Sealed payload has the wrong shape");
                Err(SealedReply::failure(ServiceError::MalformedRequest, &session).into_response())
            }
        }
    }
}

/// Reply sealed under the request's session key.
#[derive(Debug)]
pub struct SealedReply {
    status: StatusCode,
    body: Result<SealedResponse, ApiError>,
}

impl SealedReply {
    pub fn ok<T: Serialize>(data: &T, session: &SessionKey, message: &str) -> Self {
        Self::with_status(StatusCode::OK, data, session, message)
    }

    /// Sealed `{"success": false}` with the error's status and public message.
    pub fn failure(err: ServiceError, session: &SessionKey) -> Self {
        if err.status().is_server_error() {
            tracing::error!(error = %err, "Request failed");
        }
        Self::with_status(
            err.status(),
            &json!({ "success": false }),
            session,
            err.public_message(),
        )
    }

    /// `ok` on success, `failure` otherwise.
    pub fn from_result<T: Serialize>(
        result: ServiceResult<T>,
        session: &SessionKey,
        message: &str,
    ) -> Self {
        match result {
            Ok(data) => Self::ok(&data, session, message),
            Err(err) => Self::failure(err, session),
        }
    }

    fn with_status<T: Serialize>(
        status: StatusCode,
        data: &T,
        session: &SessionKey,
        message: &str,
    ) -> Self {
        let body = encrypt_response(data, session, message).map_err(|e| {
            tracing::error!(error = %e, "Failed to seal response");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        });
        Self { status, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for SealedReply {
    fn into_response(self) -> Response {
        match self.body {
            Ok(body) => (self.status, Json(body)).into_response(),
            Err(err) => err.into_response(),
        }
    }
}

/// Run blocking service work (PBKDF2, RSA, storage) off the async runtime.
pub async fn run_blocking<F, R>(work: F) -> ServiceResult<R>
where
    F: FnOnce() -> ServiceResult<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support;
    use crate::transport::SealedRequest;
    use crate::crypto::transport_key::shared_test_key;
    use axum::body::{to_bytes, Body};
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize)]
    struct Probe {
        username: String,
    }

    fn post(body: impl Into<Body>) -> Request {
        Request::builder()
            .method("POST")
            .uri("/probe")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn extracts_payload_and_session() {
        let temp = TempDir::new().unwrap();
        let (state, _worker) = test_support::state(temp.path());

        let (request, client) =
            SealedRequest::seal(&json!({"username": "alice"}), &shared_test_key()).unwrap();
        let body = serde_json::to_vec(&request).unwrap();

        let sealed = Sealed::<Probe>::from_request(post(body), &state).await.unwrap();
        assert_eq!(sealed.payload.username, "alice");

        let reply = SealedReply::ok(&json!({"success": true}), &sealed.session, "ok");
        let response = reply.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: SealedResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(client.open(&envelope.data).unwrap(), json!({"success": true}));
    }

    #[tokio::test]
    async fn garbage_body_is_plain_bad_request() {
        let temp = TempDir::new().unwrap();
        let (state, _worker) = test_support::state(temp.path());

        let response = Sealed::<Probe>::from_request(post("not json"), &state)
            .await
            .err()
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"error":"Malformed request"}"#);
    }

    #[tokio::test]
    async fn wrong_payload_shape_is_sealed_bad_request() {
        let temp = TempDir::new().unwrap();
        let (state, _worker) = test_support::state(temp.path());

        let (request, client) =
            SealedRequest::seal(&json!({"name": "no username"}), &shared_test_key()).unwrap();
        let body = serde_json::to_vec(&request).unwrap();

        let response = Sealed::<Probe>::from_request(post(body), &state)
            .await
            .err()
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: SealedResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.message, "Malformed request");
        assert_eq!(client.open(&envelope.data).unwrap(), json!({"success": false}));
    }

    #[test]
    fn failure_carries_public_message_and_status() {
        let session = SessionKey::generate();
        let reply = SealedReply::failure(ServiceError::conflict("Username already taken"), &session);
        assert_eq!(reply.status(), StatusCode::CONFLICT);
        let body = reply.body.unwrap();
        assert_eq!(body.message, "Username already taken");
        assert_eq!(session.open(&body.data).unwrap(), json!({"success": false}));
    }
}
