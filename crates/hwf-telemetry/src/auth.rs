//! Server-token authentication for telemetry routes.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hwf_core::error_builder;
use std::sync::Arc;
use tracing::debug;

/// The token every caller must present. Fixed for the process lifetime.
#[derive(Clone)]
pub struct ServerToken(String);

impl ServerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn verify(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();

        expected.len() == candidate.len()
            && expected
                .iter()
                .zip(candidate)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

impl std::fmt::Debug for ServerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ServerToken(***)")
    }
}

/// Marker inserted into request extensions once the token checked out.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated;

/// Token from `Authorization: token <t>`, `Authorization: Bearer <t>` or the
/// `token` query parameter, in that order.
pub fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        if let Some((scheme, token)) = value.trim().split_once(' ') {
            if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
                return Some(token.trim().to_string());
            }
        }
    }

    parts.uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    })
}

fn unauthorized_response() -> Response {
    error_builder::unauthorized()
        .detail("A valid server token is required to submit telemetry")
        .build()
        .into_response()
}

pub async fn token_auth_middleware(
    token: Arc<ServerToken>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (mut parts, body) = req.into_parts();

    match extract_token(&parts) {
        Some(candidate) if token.verify(&candidate) => {
            parts.extensions.insert(Authenticated);
            Ok(next.run(Request::from_parts(parts, body)).await)
        }
        Some(_) => {
            debug!("Rejected request to {} with invalid token", parts.uri.path());
            Ok(unauthorized_response())
        }
        None => {
            debug!("Rejected request to {} without token", parts.uri.path());
            Ok(unauthorized_response())
        }
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .copied()
            .ok_or_else(unauthorized_response)
    }
}
