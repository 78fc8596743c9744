use std::sync::Arc;

use anyhow::Result;
use axum::extract::FromRef;
use common_auth::{
    permissions::PERMISSIONS_WRITE, AuthError, AuthResult, EmployeeStore, PermissionStore,
    StoreError, TokenStore,
};
use tracing::{info, warn};

use crate::accounts::AccountService;
use crate::config::ServiceConfig;
use crate::credentials::CredentialStore;
use crate::guards::GuardPipeline;
use crate::metrics::ServiceMetrics;
use crate::permissions::PermissionRegistry;
use crate::rate_limit::RateLimiter;
use crate::tokens::TokenService;

#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialStore,
    pub tokens: TokenService,
    pub permissions: PermissionRegistry,
    pub accounts: AccountService,
    pub limiter: Arc<RateLimiter>,
    pub config: Arc<ServiceConfig>,
    pub metrics: Arc<ServiceMetrics>,
}

impl FromRef<AppState> for Arc<ServiceConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<ServiceMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        employees: Arc<dyn EmployeeStore>,
        tokens: Arc<dyn TokenStore>,
        permissions: Arc<dyn PermissionStore>,
    ) -> Result<Self> {
        let timeout = config.store_timeout;
        let credentials = CredentialStore::new(employees, timeout);
        let tokens = TokenService::new(tokens, timeout);
        let permissions = PermissionRegistry::new(permissions, timeout);
        let accounts = AccountService::new(
            credentials.clone(),
            tokens.clone(),
            permissions.clone(),
            config.tokens.clone(),
            config.default_permissions.clone(),
        );

        Ok(Self {
            credentials,
            tokens,
            permissions,
            accounts,
            limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            config: Arc::new(config),
            metrics: Arc::new(ServiceMetrics::new()?),
        })
    }

    /// Grants `permissions:write` to every id in `permission_admin_ids`. Ids
    /// with no matching employee are skipped. Returns how many grants applied.
    pub async fn grant_permission_admins(&self) -> AuthResult<usize> {
        let mut granted = 0;
        for &id in &self.config.permission_admin_ids {
            match self.permissions.add_for_user(id, PERMISSIONS_WRITE).await {
                Ok(()) => {
                    info!(employee_id = id, "granted permission admin");
                    granted += 1;
                }
                Err(AuthError::Store(StoreError::NotFound)) => {
                    warn!(employee_id = id, "permission admin id has no employee; skipped");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(granted)
    }

    pub fn record_login_metric(&self, outcome: &str) {
        self.metrics.login_attempt(outcome);
    }

    pub fn require_authenticated(&self) -> GuardPipeline {
        GuardPipeline::authenticated(self.metrics.clone())
    }

    pub fn require_activated_user(&self) -> GuardPipeline {
        GuardPipeline::activated(self.metrics.clone())
    }

    pub fn require_permission(&self, code: &str) -> GuardPipeline {
        GuardPipeline::permission(code, self.permissions.clone(), self.metrics.clone())
    }
}
