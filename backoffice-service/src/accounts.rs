//! Account lifecycle flows built from the token service, credential store and
//! permission registry: registration, activation, login, logout and password
//! changes.

use common_auth::{AuthError, AuthResult, Employee, EmployeeId, Scope, StoreError, Token, TokenConfig};
use tracing::{info, warn};

use crate::credentials::{CredentialStore, NewEmployee};
use crate::permissions::PermissionRegistry;
use crate::tokens::TokenService;

#[derive(Clone)]
pub struct AccountService {
    credentials: CredentialStore,
    tokens: TokenService,
    permissions: PermissionRegistry,
    token_config: TokenConfig,
    default_permissions: Vec<String>,
}

impl AccountService {
    pub fn new(
        credentials: CredentialStore,
        tokens: TokenService,
        permissions: PermissionRegistry,
        token_config: TokenConfig,
        default_permissions: Vec<String>,
    ) -> Self {
        Self {
            credentials,
            tokens,
            permissions,
            token_config,
            default_permissions,
        }
    }

    /// Creates an unactivated employee, grants the default permission set and
    /// issues the activation token the employee will redeem.
    pub async fn register_and_issue_activation_token(
        &self,
        input: NewEmployee,
    ) -> AuthResult<(Employee, Token)> {
        let employee = self.credentials.register(input).await?;

        for code in &self.default_permissions {
            self.permissions.add_for_user(employee.id, code).await?;
        }

        let token = self
            .tokens
            .issue(employee.id, self.token_config.activation_ttl, Scope::Activation)
            .await?;

        info!(employee_id = employee.id, "registered employee");
        Ok((employee, token))
    }

    /// Redeems an activation token. The token is consumed before the flag is
    /// set, and every other outstanding activation token of that employee is
    /// purged afterwards, so a replay finds nothing.
    pub async fn activate_by_token(&self, plaintext: &str) -> AuthResult<Employee> {
        let employee_id = self.tokens.redeem(Scope::Activation, plaintext).await?;

        let employee = self.credentials.mark_activated(employee_id).await?;
        self.tokens.invalidate(Scope::Activation, employee.id).await?;

        info!(employee_id = employee.id, "activated employee");
        Ok(employee)
    }

    /// Exchanges an id/password pair for a session token. An unknown id and a
    /// wrong password are indistinguishable to the caller.
    pub async fn create_authentication_token(
        &self,
        id: EmployeeId,
        password: &str,
    ) -> AuthResult<Token> {
        let employee = match self.credentials.get(id).await {
            Ok(employee) => employee,
            Err(AuthError::Store(StoreError::NotFound)) => return Err(AuthError::InvalidCredentials),
            Err(err) => return Err(err),
        };

        if !self.credentials.verify_password(&employee, password).await? {
            warn!(employee_id = id, "rejected authentication attempt");
            return Err(AuthError::InvalidCredentials);
        }

        self.tokens
            .issue(employee.id, self.token_config.authentication_ttl, Scope::Authentication)
            .await
    }

    /// Ends every session of `employee_id`.
    pub async fn logout(&self, employee_id: EmployeeId) -> AuthResult<()> {
        self.tokens.invalidate(Scope::Authentication, employee_id).await
    }

    /// Verifies the current password, stores a fresh hash of the new one and
    /// ends every existing session.
    pub async fn change_password(
        &self,
        employee_id: EmployeeId,
        current_password: &str,
        new_password: String,
    ) -> AuthResult<()> {
        let employee = self.credentials.get(employee_id).await?;
        if !self
            .credentials
            .verify_password(&employee, current_password)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        self.credentials.set_password(employee_id, new_password).await?;
        self.tokens
            .invalidate(Scope::Authentication, employee_id)
            .await
    }
}
