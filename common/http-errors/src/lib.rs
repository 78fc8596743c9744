use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

/// Every rejection the back office can hand to a client.
///
/// Variants never carry internal detail: storage and runtime faults collapse
/// into [`ApiError::Internal`], which renders a fixed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest { code: &'static str, message: Option<String> },
    /// Authorization header present but malformed, unknown, expired or out of scope.
    InvalidToken,
    /// Anonymous identity on a route that needs one.
    AuthenticationRequired,
    InvalidCredentials,
    InactiveAccount,
    NotPermitted { permission: String },
    NotFound { code: &'static str },
    RateLimited,
    Internal,
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest { code, message: Some(message.into()) }
    }

    pub fn not_found() -> Self {
        Self::NotFound { code: "not_found" }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::InvalidToken
            | ApiError::AuthenticationRequired
            | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::InactiveAccount | ApiError::NotPermitted { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. } => *code,
            ApiError::InvalidToken => "invalid_token",
            ApiError::AuthenticationRequired => "authentication_required",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::InactiveAccount => "inactive_account",
            ApiError::NotPermitted { .. } => "not_permitted",
            ApiError::NotFound { code } => *code,
            ApiError::RateLimited => "rate_limit_exceeded",
            ApiError::Internal => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest { message: Some(message), .. } => message.clone(),
            ApiError::BadRequest { message: None, .. } => "invalid request".to_string(),
            ApiError::InvalidToken => "invalid or missing authentication token".to_string(),
            ApiError::AuthenticationRequired => {
                "you must be authenticated to access this resource".to_string()
            }
            ApiError::InvalidCredentials => "invalid authentication credentials".to_string(),
            ApiError::InactiveAccount => {
                "your user account must be activated to access this resource".to_string()
            }
            ApiError::NotPermitted { .. } => {
                "your user account doesn't have the necessary permissions to access this resource"
                    .to_string()
            }
            ApiError::NotFound { .. } => "the requested resource could not be found".to_string(),
            ApiError::RateLimited => "rate limit exceeded".to_string(),
            ApiError::Internal => {
                "the server encountered a problem and could not process your request".to_string()
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let permission = match &self {
            ApiError::NotPermitted { permission } => Some(permission.clone()),
            _ => None,
        };
        let body = ErrorBody { code: code.to_string(), message: self.message(), permission };

        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        if matches!(self, ApiError::InvalidToken) {
            resp.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
