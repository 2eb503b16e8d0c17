// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error kinds shared by the services and the HTTP layer.
//!
//! [`ServiceError`] is the taxonomy every service returns. Crypto and storage
//! errors are converted into it at the service boundary, and only its fixed
//! [`public_message`](ServiceError::public_message) ever reaches a client.
//!
//! [`ApiError`] is the plain JSON error used when no session key exists to
//! seal a reply (an unreadable envelope, or a non-sealed endpoint).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::crypto::CryptoError;
use crate::storage::StorageError;
use crate::transport::MalformedRequest;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("cryptographic failure: {0}")]
    CryptoFailure(#[from] CryptoError),

    #[error("malformed request")]
    MalformedRequest,

    #[error("unauthorized")]
    Unauthorized,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    StorageFailure(StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::MalformedRequest => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized | ServiceError::CryptoFailure(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::StorageFailure(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing text. Never carries the underlying cause.
    pub fn public_message(&self) -> &str {
        match self {
            ServiceError::MalformedRequest => "Malformed request",
            ServiceError::Unauthorized | ServiceError::CryptoFailure(_) => "Unauthorized",
            ServiceError::Conflict(message) | ServiceError::NotFound(message) => message,
            ServiceError::StorageFailure(_) | ServiceError::Internal(_) => "Internal server error",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(_) => ServiceError::conflict("Resource already exists"),
            StorageError::NotFound(_) => ServiceError::not_found("Resource not found"),
            other => ServiceError::StorageFailure(other),
        }
    }
}

impl From<MalformedRequest> for ServiceError {
    fn from(_: MalformedRequest) -> Self {
        ServiceError::MalformedRequest
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<MalformedRequest> for ApiError {
    fn from(_: MalformedRequest) -> Self {
        ApiError::bad_request("Malformed request")
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        if err.status().is_server_error() {
            tracing::error!(error = %err, "Request failed");
        }
        ApiError::new(err.status(), err.public_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
