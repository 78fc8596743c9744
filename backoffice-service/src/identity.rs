//! Request identity resolution.
//!
//! `authenticate` runs for every request inside the fixed pipeline and
//! attaches exactly one [`RequestContext`] to the request extensions.
//! Handlers and route guards read it back through the extractors below.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common_auth::{parse_bearer, AuthError, Employee, Identity, Scope};
use common_http_errors::ApiError;
use tracing::{debug, error};

use crate::app::AppState;
use crate::tokens::TokenService;

/// Per-request context carrying the resolved identity.
#[derive(Clone, Debug)]
pub struct RequestContext {
    identity: Arc<Identity>,
}

impl RequestContext {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Arc::new(identity),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<RequestContext>() {
            Some(context) => Ok(context.clone()),
            None => {
                // Route mounted outside the pipeline; a wiring bug, not a client fault.
                error!(path = %parts.uri.path(), "request reached a handler without resolved identity");
                Err(ApiError::Internal)
            }
        }
    }
}

/// A non-anonymous caller.
#[derive(Clone, Debug)]
pub struct AuthenticatedEmployee(pub Employee);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedEmployee
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = RequestContext::from_request_parts(parts, state).await?;
        match context.identity() {
            Identity::Employee(employee) => Ok(AuthenticatedEmployee(employee.clone())),
            Identity::Anonymous => Err(ApiError::AuthenticationRequired),
        }
    }
}

/// Maps the `Authorization` header onto an identity.
///
/// A missing or blank header is anonymous. A malformed one is rejected
/// before any token lookup happens.
pub async fn resolve_identity(tokens: &TokenService, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Identity::Anonymous);
    };
    if value.as_bytes().iter().all(u8::is_ascii_whitespace) {
        return Ok(Identity::Anonymous);
    }

    let plaintext = parse_bearer(value).map_err(|_| ApiError::InvalidToken)?;

    match tokens.verify(Scope::Authentication, plaintext).await {
        Ok(employee) => Ok(Identity::Employee(employee)),
        Err(AuthError::TokenNotFound) => Err(ApiError::InvalidToken),
        Err(err) => Err(err.into()),
    }
}

pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let identity = match resolve_identity(&state.tokens, request.headers()).await {
        Ok(identity) => identity,
        Err(err) => {
            if err == ApiError::InvalidToken {
                state.metrics.guard_rejection("authenticate");
                debug!(guard = "authenticate", "rejected bearer credential");
            }
            return vary_on_authorization(err.into_response());
        }
    };

    if request.extensions().get::<RequestContext>().is_some() {
        error!("identity resolved twice for one request");
        return vary_on_authorization(ApiError::Internal.into_response());
    }
    request.extensions_mut().insert(RequestContext::new(identity));

    vary_on_authorization(next.run(request).await)
}

fn vary_on_authorization(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common_auth::{EmployeeDraft, EmployeeStore, InMemoryStore};
    use std::time::Duration;

    async fn tokens_with_employee() -> (TokenService, Employee) {
        let store = InMemoryStore::new();
        let employee = store
            .create(EmployeeDraft {
                name: "Ada".into(),
                surname: "Lovelace".into(),
                password_hash: "unused".into(),
                is_admin: false,
                phone_number: "555-0110".into(),
                enrolled: Utc::now(),
            })
            .await
            .unwrap();
        (TokenService::new(Arc::new(store), Duration::from_secs(3)), employee)
    }

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let (tokens, _) = tokens_with_employee().await;
        let identity = resolve_identity(&tokens, &HeaderMap::new()).await.unwrap();
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn blank_header_is_anonymous() {
        let (tokens, _) = tokens_with_employee().await;
        for raw in ["", "   "] {
            let identity = resolve_identity(&tokens, &headers(raw)).await.unwrap();
            assert!(identity.is_anonymous(), "{raw:?}");
        }
    }

    #[tokio::test]
    async fn malformed_header_is_invalid_token() {
        let (tokens, _) = tokens_with_employee().await;
        for raw in ["Bearer", "Basic abc", "Bearer a b", "bearer", "Token ABC"] {
            assert_eq!(
                resolve_identity(&tokens, &headers(raw)).await,
                Err(ApiError::InvalidToken),
                "{raw}"
            );
        }
    }

    #[tokio::test]
    async fn unknown_and_wrong_scope_tokens_are_invalid() {
        let (tokens, employee) = tokens_with_employee().await;
        let activation = tokens
            .issue(employee.id, chrono::Duration::hours(1), Scope::Activation)
            .await
            .unwrap();

        assert_eq!(
            resolve_identity(&tokens, &headers("Bearer ABCDEFGHIJKLMNOPQRSTUVWXYZ")).await,
            Err(ApiError::InvalidToken)
        );
        assert_eq!(
            resolve_identity(&tokens, &headers(&format!("Bearer {}", activation.plaintext))).await,
            Err(ApiError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn valid_session_token_resolves_employee() {
        let (tokens, employee) = tokens_with_employee().await;
        let session = tokens
            .issue(employee.id, chrono::Duration::hours(1), Scope::Authentication)
            .await
            .unwrap();

        let identity = resolve_identity(&tokens, &headers(&format!("Bearer {}", session.plaintext)))
            .await
            .unwrap();
        assert_eq!(identity.employee().map(|e| e.id), Some(employee.id));
    }

    #[tokio::test]
    async fn extractor_without_context_is_a_server_fault() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let err = RequestContext::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err, ApiError::Internal);
    }

    #[tokio::test]
    async fn anonymous_context_rejects_authenticated_extractor() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        parts.extensions.insert(RequestContext::new(Identity::Anonymous));
        let err = AuthenticatedEmployee::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::AuthenticationRequired);
    }
}
