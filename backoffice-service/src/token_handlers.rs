use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use common_auth::{AuthError, EmployeeId, Token};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::employee_handlers::malformed_body;
use crate::identity::AuthenticatedEmployee;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub id: EmployeeId,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthenticationTokenResponse {
    pub authentication_token: Token,
}

pub async fn create_authentication_token(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthenticationTokenResponse>)> {
    let Json(request) = payload.map_err(malformed_body)?;
    if request.password.is_empty() {
        state.record_login_metric("invalid_request");
        return Err(ApiError::bad_request("invalid_password", "password must be provided"));
    }

    match state
        .accounts
        .create_authentication_token(request.id, &request.password)
        .await
    {
        Ok(token) => {
            state.record_login_metric("success");
            info!(employee_id = request.id, "issued authentication token");
            Ok((
                StatusCode::CREATED,
                Json(AuthenticationTokenResponse {
                    authentication_token: token,
                }),
            ))
        }
        Err(AuthError::InvalidCredentials) => {
            state.record_login_metric("invalid_credentials");
            Err(ApiError::InvalidCredentials)
        }
        Err(err) => {
            state.record_login_metric("error");
            Err(err.into())
        }
    }
}

/// Ends every session of the caller, not only the one presented.
pub async fn delete_authentication_tokens(
    State(state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
) -> ApiResult<StatusCode> {
    state.accounts.logout(employee.id).await?;
    info!(employee_id = employee.id, "logged out");
    Ok(StatusCode::NO_CONTENT)
}
