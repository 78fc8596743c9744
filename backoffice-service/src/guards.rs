//! Per-route authorization guards.
//!
//! A route declares the strongest requirement it needs and the pipeline
//! carries every weaker one in front of it, so each requirement is checked
//! in order on every request.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common_auth::Identity;
use common_http_errors::ApiError;
use tracing::debug;

use crate::identity::RequestContext;
use crate::metrics::ServiceMetrics;
use crate::permissions::PermissionRegistry;

/// Admit-or-reject capability shared by every guard.
#[async_trait]
pub trait Guard: Send + Sync {
    fn name(&self) -> &'static str;

    async fn admit(&self, identity: &Identity) -> Result<(), ApiError>;
}

pub struct RequireAuthenticated;

#[async_trait]
impl Guard for RequireAuthenticated {
    fn name(&self) -> &'static str {
        "require_authenticated"
    }

    async fn admit(&self, identity: &Identity) -> Result<(), ApiError> {
        if identity.is_anonymous() {
            return Err(ApiError::AuthenticationRequired);
        }
        Ok(())
    }
}

pub struct RequireActivated;

#[async_trait]
impl Guard for RequireActivated {
    fn name(&self) -> &'static str {
        "require_activated"
    }

    async fn admit(&self, identity: &Identity) -> Result<(), ApiError> {
        match identity {
            Identity::Anonymous => Err(ApiError::AuthenticationRequired),
            Identity::Employee(employee) if !employee.activated => Err(ApiError::InactiveAccount),
            Identity::Employee(_) => Ok(()),
        }
    }
}

/// Looks up the caller's permission set on every request.
pub struct RequirePermission {
    code: String,
    registry: PermissionRegistry,
}

impl RequirePermission {
    pub fn new(code: impl Into<String>, registry: PermissionRegistry) -> Self {
        Self {
            code: code.into(),
            registry,
        }
    }
}

#[async_trait]
impl Guard for RequirePermission {
    fn name(&self) -> &'static str {
        "require_permission"
    }

    async fn admit(&self, identity: &Identity) -> Result<(), ApiError> {
        let employee = match identity {
            Identity::Anonymous => return Err(ApiError::AuthenticationRequired),
            Identity::Employee(employee) if !employee.activated => {
                return Err(ApiError::InactiveAccount)
            }
            Identity::Employee(employee) => employee,
        };

        let granted = self.registry.get_all_for_user(employee.id).await?;
        if granted.include(&self.code) {
            Ok(())
        } else {
            debug!(employee_id = employee.id, permission = %self.code, "permission missing");
            Err(ApiError::NotPermitted {
                permission: self.code.clone(),
            })
        }
    }
}

/// Ordered guard list attached to a group of routes.
#[derive(Clone)]
pub struct GuardPipeline {
    guards: Arc<[Arc<dyn Guard>]>,
    metrics: Arc<ServiceMetrics>,
}

impl GuardPipeline {
    pub fn builder(metrics: Arc<ServiceMetrics>) -> GuardPipelineBuilder {
        GuardPipelineBuilder {
            guards: Vec::new(),
            metrics,
        }
    }

    pub fn authenticated(metrics: Arc<ServiceMetrics>) -> Self {
        Self::builder(metrics).require(RequireAuthenticated).build()
    }

    pub fn activated(metrics: Arc<ServiceMetrics>) -> Self {
        Self::builder(metrics)
            .require(RequireAuthenticated)
            .require(RequireActivated)
            .build()
    }

    pub fn permission(
        code: impl Into<String>,
        registry: PermissionRegistry,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self::builder(metrics)
            .require(RequireAuthenticated)
            .require(RequireActivated)
            .require(RequirePermission::new(code, registry))
            .build()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.guards.iter().map(|guard| guard.name()).collect()
    }

    /// Runs the guards in order and stops at the first rejection.
    pub async fn admit(&self, identity: &Identity) -> Result<(), ApiError> {
        for guard in self.guards.iter() {
            if let Err(err) = guard.admit(identity).await {
                self.metrics.guard_rejection(guard.name());
                debug!(
                    guard = guard.name(),
                    employee_id = identity.employee().map(|e| e.id),
                    code = err.code(),
                    "guard rejected request"
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

pub struct GuardPipelineBuilder {
    guards: Vec<Arc<dyn Guard>>,
    metrics: Arc<ServiceMetrics>,
}

impl GuardPipelineBuilder {
    pub fn require<G>(mut self, guard: G) -> Self
    where
        G: Guard + 'static,
    {
        self.guards.push(Arc::new(guard));
        self
    }

    pub fn build(self) -> GuardPipeline {
        GuardPipeline {
            guards: self.guards.into(),
            metrics: self.metrics,
        }
    }
}

/// Route layer applying a [`GuardPipeline`] to the resolved identity.
pub async fn enforce_guards(
    State(pipeline): State<GuardPipeline>,
    context: RequestContext,
    request: Request,
    next: Next,
) -> Response {
    match pipeline.admit(context.identity()).await {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}
