//! The authenticated identity as seen by handlers and inner gates.
//!
//! [`crate::auth::middleware::authenticate`] inserts a [`CurrentIdentity`] into the request
//! extensions once a bearer token resolves. Handlers take it as an extractor; on a route the
//! authentication gate does not cover, extraction fails with 401.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::instrument;

use crate::errors::{Error, Result};
use crate::types::{IdentityId, Role};

/// Identity admitted by the authentication gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentIdentity {
    pub id: IdentityId,
    pub role: Role,
}

/// Bearer token the current request was admitted with.
///
/// Deliberately not `Debug`, so it cannot end up in a span or log line by accident.
#[derive(Clone)]
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CurrentIdentity>()
            .copied()
            .ok_or(Error::Unauthenticated { message: None })
    }
}

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<BearerToken>()
            .cloned()
            .ok_or(Error::Unauthenticated { message: None })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched as `Bearer` or `bearer`. A missing header, another scheme, a
/// non-ASCII value and an empty token are all unauthenticated.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str> {
    let header = headers.get(AUTHORIZATION).ok_or(Error::Unauthenticated { message: None })?;

    let value = header.to_str().map_err(|_| Error::Unauthenticated {
        message: Some("Malformed authorization header".to_string()),
    })?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Authorization header must use the Bearer scheme".to_string()),
        })?
        .trim();

    if token.is_empty() {
        return Err(Error::Unauthenticated {
            message: Some("Bearer token is empty".to_string()),
        });
    }

    Ok(token)
}
