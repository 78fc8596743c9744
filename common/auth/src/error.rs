use std::time::Duration;

use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use thiserror::Error;
use tracing::error;

pub type AuthResult<T> = Result<T, AuthError>;
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by the backing store collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store call exceeded {0:?}")]
    Timeout(Duration),
    #[error("edit conflict")]
    Conflict,
    #[error("storage failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header malformed")]
    MalformedAuthorization,
    #[error("invalid or expired authentication token")]
    InvalidToken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no token matches the supplied plaintext")]
    TokenNotFound,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("secure random source unavailable: {0}")]
    Entropy(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => ApiError::not_found(),
            StoreError::Conflict => ApiError::BadRequest {
                code: "edit_conflict",
                message: Some("unable to update the record due to an edit conflict".into()),
            },
            other => {
                error!(error = %other, "store failure surfaced as server fault");
                ApiError::Internal
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::MalformedAuthorization | AuthError::InvalidToken => ApiError::InvalidToken,
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::TokenNotFound => ApiError::not_found(),
            AuthError::EmptyPassword => {
                ApiError::bad_request("invalid_password", "password must not be empty")
            }
            AuthError::Store(err) => err.into(),
            other @ (AuthError::Hash(_) | AuthError::Entropy(_)) => {
                error!(error = %other, "credential processing failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_never_leak_detail() {
        let api: ApiError = AuthError::Store(StoreError::Timeout(Duration::from_secs(3))).into();
        assert_eq!(api, ApiError::Internal);
    }

    #[test]
    fn token_not_found_is_plain_not_found() {
        let api: ApiError = AuthError::TokenNotFound.into();
        assert_eq!(api, ApiError::not_found());
        let api: ApiError = StoreError::NotFound.into();
        assert_eq!(api, ApiError::not_found());
    }

    #[test]
    fn malformed_header_reads_as_invalid_token() {
        let api: ApiError = AuthError::MalformedAuthorization.into();
        assert_eq!(api, ApiError::InvalidToken);
    }
}
