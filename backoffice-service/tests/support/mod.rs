use std::{env, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use backoffice_service::{config::ServiceConfig, AppState};
use common_auth::InMemoryStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::util::ServiceExt;

/// Defaults with the limiter switched off so flows can issue many requests.
#[allow(dead_code)]
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.rate_limit.enabled = false;
    config
}

#[allow(dead_code)]
pub fn in_memory_state(config: ServiceConfig) -> Result<(AppState, InMemoryStore)> {
    let store = InMemoryStore::new();
    let state = AppState::new(
        config,
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
    )?;
    Ok((state, store))
}

#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn error_code(&self) -> Option<&str> {
        self.headers.get("x-error-code").and_then(|v| v.to_str().ok())
    }
}

#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Result<TestResponse> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&value)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    Ok(TestResponse { status, headers, body })
}

#[allow(dead_code)]
pub struct Onboarded {
    pub id: i64,
    pub password: String,
    pub session: String,
}

/// Registers, activates and logs in a fresh employee over HTTP.
#[allow(dead_code)]
pub async fn onboard(app: &Router, name: &str) -> Result<Onboarded> {
    let password = format!("{name}-secret");
    let registered = send(
        app,
        Method::POST,
        "/api/v1/employees",
        None,
        Some(json!({ "name": name, "surname": "Tester", "password": password })),
    )
    .await?;
    anyhow::ensure!(registered.status == StatusCode::CREATED, "registration failed: {:?}", registered.body);

    let id = registered.body["employee"]["id"].as_i64().context("employee id")?;
    let activation = registered.body["activation_token"]["token"]
        .as_str()
        .context("activation token")?
        .to_string();

    let activated = send(
        app,
        Method::PUT,
        "/api/v1/employees/activated",
        None,
        Some(json!({ "token": activation })),
    )
    .await?;
    anyhow::ensure!(activated.status == StatusCode::OK, "activation failed: {:?}", activated.body);

    let session = login(app, id, &password).await?;
    Ok(Onboarded { id, password, session })
}

#[allow(dead_code)]
pub async fn login(app: &Router, id: i64, password: &str) -> Result<String> {
    let response = send(
        app,
        Method::POST,
        "/api/v1/tokens/authentication",
        None,
        Some(json!({ "id": id, "password": password })),
    )
    .await?;
    anyhow::ensure!(response.status == StatusCode::CREATED, "login failed: {:?}", response.body);
    Ok(response.body["authentication_token"]["token"]
        .as_str()
        .context("session token")?
        .to_string())
}

#[allow(dead_code)]
pub struct TestDatabase {
    pool: PgPool,
}

#[allow(dead_code)]
impl TestDatabase {
    pub async fn setup() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("BACKOFFICE_TEST_DATABASE_URL") else {
            eprintln!(
                "Skipping backoffice-service Postgres tests: set BACKOFFICE_TEST_DATABASE_URL to run them.",
            );
            return Ok(None);
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Some(Self { pool }))
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }
}
