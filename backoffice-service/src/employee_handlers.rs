use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use common_auth::{permissions::EMPLOYEES_WRITE, Employee, EmployeeId, EmployeeProfile, PermissionSet, Token};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::credentials::NewEmployee;
use crate::identity::AuthenticatedEmployee;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EmployeeEnvelope {
    pub employee: Employee,
}

#[derive(Debug, Serialize)]
pub struct EmployeesEnvelope {
    pub employees: Vec<Employee>,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub employee: Employee,
    pub activation_token: Token,
}

#[derive(Debug, Serialize)]
pub struct PermissionsEnvelope {
    pub permissions: PermissionSet,
}

#[derive(Deserialize)]
pub struct ActivationRequest {
    pub token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct GrantRequest {
    pub code: String,
}

pub(crate) fn malformed_body(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request("invalid_payload", rejection.body_text())
}

pub(crate) fn malformed_path(rejection: PathRejection) -> ApiError {
    ApiError::bad_request("invalid_path", rejection.body_text())
}

fn validate_new_employee(input: &NewEmployee) -> ApiResult<()> {
    if input.name.trim().is_empty() {
        return Err(ApiError::bad_request("invalid_employee", "name must be provided"));
    }
    if input.surname.trim().is_empty() {
        return Err(ApiError::bad_request("invalid_employee", "surname must be provided"));
    }
    if input.password.is_empty() {
        return Err(ApiError::bad_request("invalid_password", "password must not be empty"));
    }
    Ok(())
}

pub async fn register_employee(
    State(state): State<AppState>,
    payload: Result<Json<NewEmployee>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegistrationResponse>)> {
    let Json(input) = payload.map_err(malformed_body)?;
    validate_new_employee(&input)?;

    let (employee, activation_token) = state
        .accounts
        .register_and_issue_activation_token(input)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            employee,
            activation_token,
        }),
    ))
}

pub async fn activate_employee(
    State(state): State<AppState>,
    payload: Result<Json<ActivationRequest>, JsonRejection>,
) -> ApiResult<Json<EmployeeEnvelope>> {
    let Json(request) = payload.map_err(malformed_body)?;
    if request.token.trim().is_empty() {
        return Err(ApiError::bad_request("invalid_token_format", "token must be provided"));
    }

    let employee = state.accounts.activate_by_token(request.token.trim()).await?;
    Ok(Json(EmployeeEnvelope { employee }))
}

pub async fn current_employee(
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
) -> Json<EmployeeEnvelope> {
    Json(EmployeeEnvelope { employee })
}

pub async fn get_employee(
    State(state): State<AppState>,
    path: Result<Path<EmployeeId>, PathRejection>,
) -> ApiResult<Json<EmployeeEnvelope>> {
    let Path(id) = path.map_err(malformed_path)?;
    let employee = state.credentials.get(id).await?;
    Ok(Json(EmployeeEnvelope { employee }))
}

pub async fn list_employees(State(state): State<AppState>) -> ApiResult<Json<EmployeesEnvelope>> {
    let employees = state.credentials.list().await?;
    Ok(Json(EmployeesEnvelope { employees }))
}

/// Employees may edit their own profile. Editing anyone else's requires
/// `employees:write`.
pub async fn update_employee(
    State(state): State<AppState>,
    AuthenticatedEmployee(caller): AuthenticatedEmployee,
    path: Result<Path<EmployeeId>, PathRejection>,
    payload: Result<Json<EmployeeProfile>, JsonRejection>,
) -> ApiResult<Json<EmployeeEnvelope>> {
    let Path(id) = path.map_err(malformed_path)?;
    let Json(profile) = payload.map_err(malformed_body)?;

    if caller.id != id
        && !state
            .permissions
            .get_all_for_user(caller.id)
            .await?
            .include(EMPLOYEES_WRITE)
    {
        return Err(ApiError::NotPermitted {
            permission: EMPLOYEES_WRITE.to_string(),
        });
    }
    if profile.name.trim().is_empty() || profile.surname.trim().is_empty() {
        return Err(ApiError::bad_request("invalid_employee", "name and surname must be provided"));
    }

    let employee = state.credentials.update_profile(id, &profile).await?;
    info!(employee_id = id, updated_by = caller.id, "employee profile updated");
    Ok(Json(EmployeeEnvelope { employee }))
}

/// Only the employee themself may change their password; every session they
/// hold ends with it.
pub async fn change_password(
    State(state): State<AppState>,
    AuthenticatedEmployee(caller): AuthenticatedEmployee,
    path: Result<Path<EmployeeId>, PathRejection>,
    payload: Result<Json<PasswordChangeRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path.map_err(malformed_path)?;
    let Json(request) = payload.map_err(malformed_body)?;

    if caller.id != id {
        return Err(ApiError::NotPermitted {
            permission: "self".to_string(),
        });
    }
    if request.new_password.is_empty() {
        return Err(ApiError::bad_request("invalid_password", "password must not be empty"));
    }

    state
        .accounts
        .change_password(id, &request.current_password, request.new_password)
        .await?;
    info!(employee_id = id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_employee(
    State(state): State<AppState>,
    AuthenticatedEmployee(caller): AuthenticatedEmployee,
    path: Result<Path<EmployeeId>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path.map_err(malformed_path)?;
    state.credentials.delete(id).await?;
    info!(employee_id = id, deleted_by = caller.id, "employee deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_permissions(
    State(state): State<AppState>,
    path: Result<Path<EmployeeId>, PathRejection>,
) -> ApiResult<Json<PermissionsEnvelope>> {
    let Path(id) = path.map_err(malformed_path)?;
    // Distinguish an unknown employee from one with no grants.
    state.credentials.get(id).await?;
    let permissions = state.permissions.get_all_for_user(id).await?;
    Ok(Json(PermissionsEnvelope { permissions }))
}

pub async fn grant_permission(
    State(state): State<AppState>,
    AuthenticatedEmployee(caller): AuthenticatedEmployee,
    path: Result<Path<EmployeeId>, PathRejection>,
    payload: Result<Json<GrantRequest>, JsonRejection>,
) -> ApiResult<Json<PermissionsEnvelope>> {
    let Path(id) = path.map_err(malformed_path)?;
    let Json(request) = payload.map_err(malformed_body)?;

    state.permissions.add_for_user(id, &request.code).await?;
    info!(employee_id = id, permission = %request.code, granted_by = caller.id, "permission granted");

    let permissions = state.permissions.get_all_for_user(id).await?;
    Ok(Json(PermissionsEnvelope { permissions }))
}

pub async fn revoke_permission(
    State(state): State<AppState>,
    AuthenticatedEmployee(caller): AuthenticatedEmployee,
    path: Result<Path<(EmployeeId, String)>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path((id, code)) = path.map_err(malformed_path)?;
    state.permissions.remove_for_user(id, &code).await?;
    info!(employee_id = id, permission = %code, revoked_by = caller.id, "permission revoked");
    Ok(StatusCode::NO_CONTENT)
}
