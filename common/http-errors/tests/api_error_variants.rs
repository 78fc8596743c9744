use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use common_http_errors::ApiError;
use http_body_util::BodyExt;
use serde_json::Value;

async fn body_json(err: ApiError) -> (StatusCode, Value) {
    let resp = err.into_response();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[test]
fn invalid_token_sets_www_authenticate() {
    let resp = ApiError::InvalidToken.into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "invalid_token");
}

#[test]
fn authentication_required_is_distinct_from_invalid_token() {
    let resp = ApiError::AuthenticationRequired.into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "authentication_required");
}

#[test]
fn inactive_account_variant() {
    let resp = ApiError::InactiveAccount.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "inactive_account");
}

#[tokio::test]
async fn not_permitted_names_the_permission() {
    let (status, body) =
        body_json(ApiError::NotPermitted { permission: "products:write".into() }).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "not_permitted");
    assert_eq!(body["permission"], "products:write");
}

#[test]
fn bad_request_variant() {
    let resp = ApiError::bad_request("invalid_payload", "missing field `id`").into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "invalid_payload");
}

#[test]
fn rate_limited_variant() {
    let resp = ApiError::RateLimited.into_response();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "rate_limit_exceeded");
}

#[tokio::test]
async fn internal_variant_renders_no_detail() {
    let (status, body) = body_json(ApiError::Internal).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "internal_error");
    assert!(body.get("permission").is_none());
    assert_eq!(
        body["message"],
        "the server encountered a problem and could not process your request"
    );
}
