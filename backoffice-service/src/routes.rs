//! Router assembly.
//!
//! Every `/api/v1` request passes the fixed chain, outermost first: panic
//! containment, rate limiting, identity resolution. Route groups then attach
//! their own [`GuardPipeline`](crate::guards::GuardPipeline).

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::config::ServiceConfig;
use crate::employee_handlers::{
    activate_employee, change_password, current_employee, delete_employee, get_employee,
    grant_permission, list_employees, list_permissions, register_employee, revoke_permission,
    update_employee,
};
use crate::guards::enforce_guards;
use crate::identity::authenticate;
use crate::metrics::metrics_endpoint;
use crate::rate_limit::rate_limit;
use crate::recovery::PanicResponder;
use crate::token_handlers::{create_authentication_token, delete_authentication_tokens};
use common_auth::permissions::PERMISSIONS_WRITE;

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub environment: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Healthcheck {
    pub status: &'static str,
    pub system_info: SystemInfo,
}

pub async fn healthcheck(State(config): State<Arc<ServiceConfig>>) -> Json<Healthcheck> {
    Json(Healthcheck {
        status: "available",
        system_info: SystemInfo {
            environment: config.environment.as_str(),
            version: env!("CARGO_PKG_VERSION"),
        },
    })
}

fn api_routes(state: &AppState) -> Router<AppState> {
    let open = Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/employees", post(register_employee))
        .route("/employees/activated", put(activate_employee))
        .route("/tokens/authentication", post(create_authentication_token));

    let authenticated = Router::new()
        .route("/tokens/authentication", delete(delete_authentication_tokens))
        .route("/employees/me", get(current_employee))
        .route_layer(middleware::from_fn_with_state(
            state.require_authenticated(),
            enforce_guards,
        ));

    let activated = Router::new()
        .route("/employees", get(list_employees))
        .route(
            "/employees/:id",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
        .route("/employees/:id/password", put(change_password))
        .route("/employees/:id/permissions", get(list_permissions))
        .route_layer(middleware::from_fn_with_state(
            state.require_activated_user(),
            enforce_guards,
        ));

    let permission_admin = Router::new()
        .route("/employees/:id/permissions", post(grant_permission))
        .route("/employees/:id/permissions/:code", delete(revoke_permission))
        .route_layer(middleware::from_fn_with_state(
            state.require_permission(PERMISSIONS_WRITE),
            enforce_guards,
        ));

    open.merge(authenticated)
        .merge(activated)
        .merge(permission_admin)
}

/// Wraps `router` in the fixed request chain.
pub fn with_pipeline(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(PanicResponder::new(state.metrics.clone())))
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
            .layer(middleware::from_fn_with_state(state.clone(), authenticate)),
    )
}

pub fn build_router(state: AppState) -> Router {
    let api = with_pipeline(api_routes(&state), &state);

    Router::new()
        .nest("/api/v1", api)
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}
