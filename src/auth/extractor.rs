// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the session token.
//!
//! ```rust,ignore
//! async fn handler(AccessToken(token): AccessToken, sealed: Sealed<Body>) -> SealedReply {
//!     // token is Option<String>; resolved inside the handler so failures
//!     // can be reported in the sealed reply
//! }
//! ```

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

/// Header carrying the session token.
pub const ACCESS_TOKEN_HEADER: &str = "access_token";

/// Session token from the request headers, if any.
///
/// `access_token` takes precedence over `Authorization: Bearer`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessToken(pub Option<String>);

impl AccessToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AccessToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|token| !token.is_empty());

        let from_bearer = || {
            parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|token| !token.is_empty())
        };

        Ok(AccessToken(from_header.or_else(from_bearer).map(str::to_owned)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> AccessToken {
        let (mut parts, _) = request.into_parts();
        AccessToken::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn reads_access_token_header() {
        let request = Request::builder()
            .header(ACCESS_TOKEN_HEADER, "abc123")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, AccessToken(Some("abc123".into())));
    }

    #[tokio::test]
    async fn falls_back_to_bearer() {
        let request = Request::builder()
            .header(AUTHORIZATION, "Bearer xyz")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.as_deref(), Some("xyz"));

        let both = Request::builder()
            .header(ACCESS_TOKEN_HEADER, "primary")
            .header(AUTHORIZATION, "Bearer secondary")
            .body(())
            .unwrap();
        assert_eq!(extract(both).await.as_deref(), Some("primary"));
    }

    #[tokio::test]
    async fn absent_or_blank_is_none() {
        assert_eq!(extract(Request::new(())).await, AccessToken(None));

        let blank = Request::builder()
            .header(ACCESS_TOKEN_HEADER, "  ")
            .header(AUTHORIZATION, "Basic Zm9v")
            .body(())
            .unwrap();
        assert_eq!(extract(blank).await, AccessToken(None));
    }
}
