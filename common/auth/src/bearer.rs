use axum::http::HeaderValue;

use crate::error::{AuthError, AuthResult};

const BEARER_SCHEME: &str = "Bearer";

/// Splits an `Authorization` value into its token. Only the exact two-part
/// `Bearer <token>` form is accepted; anything else is malformed and must be
/// rejected before any token lookup happens.
pub fn parse_bearer(value: &HeaderValue) -> AuthResult<&str> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::MalformedAuthorization)?;

    let mut parts = raw.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(BEARER_SCHEME), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedAuthorization),
    }
}
