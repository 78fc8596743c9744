use anyhow::{anyhow, Context, Result};
use common_auth::{EmployeeId, TokenConfig, KNOWN_PERMISSIONS};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Tokens added to the bucket per second.
    pub refill_per_second: f64,
    /// Bucket capacity.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refill_per_second: 2.0,
            burst: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub run_migrations: bool,
    pub rate_limit: RateLimitConfig,
    pub store_timeout: Duration,
    pub tokens: TokenConfig,
    /// Codes granted to every employee at registration.
    pub default_permissions: Vec<String>,
    /// Employees granted `permissions:write` at startup.
    pub permission_admin_ids: Vec<EmployeeId>,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            host: "0.0.0.0".to_string(),
            port: 8081,
            environment: Environment::Development,
            run_migrations: false,
            rate_limit: RateLimitConfig::default(),
            store_timeout: Duration::from_secs(3),
            tokens: TokenConfig::new(),
            default_permissions: vec!["products:read".to_string()],
            permission_admin_ids: Vec::new(),
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

pub fn load_service_config() -> Result<ServiceConfig> {
    let defaults = ServiceConfig::default();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let host = env::var("HOST").unwrap_or(defaults.host);
    let port = parse_from_env("PORT")?.unwrap_or(defaults.port);

    let environment = env::var("APP_ENV")
        .ok()
        .map(|value| parse_environment(&value))
        .transpose()
        .context("Failed to parse APP_ENV")?
        .unwrap_or(defaults.environment);

    let run_migrations = bool_from_env("RUN_MIGRATIONS").unwrap_or(false);

    let rate_limit = RateLimitConfig {
        enabled: bool_from_env("RATE_LIMIT_ENABLED").unwrap_or(true),
        refill_per_second: parse_from_env("RATE_LIMIT_RPS")?
            .unwrap_or(defaults.rate_limit.refill_per_second),
        burst: parse_from_env("RATE_LIMIT_BURST")?.unwrap_or(defaults.rate_limit.burst),
    };
    if rate_limit.refill_per_second <= 0.0 || rate_limit.burst == 0 {
        return Err(anyhow!(
            "RATE_LIMIT_RPS and RATE_LIMIT_BURST must both be positive"
        ));
    }

    let store_timeout = parse_from_env::<u64>("STORE_TIMEOUT_MS")?
        .map(Duration::from_millis)
        .unwrap_or(defaults.store_timeout);

    let mut tokens = TokenConfig::new();
    if let Some(hours) = ttl_hours_from_env("ACTIVATION_TOKEN_TTL_HOURS")? {
        tokens = tokens.with_activation_ttl(hours);
    }
    if let Some(hours) = ttl_hours_from_env("AUTH_TOKEN_TTL_HOURS")? {
        tokens = tokens.with_authentication_ttl(hours);
    }

    let default_permissions = env::var("DEFAULT_PERMISSIONS")
        .ok()
        .map(|value| parse_codes(&value))
        .transpose()
        .context("Failed to parse DEFAULT_PERMISSIONS")?
        .unwrap_or(defaults.default_permissions);

    let permission_admin_ids = env::var("PERMISSION_ADMIN_IDS")
        .ok()
        .map(|value| parse_ids(&value))
        .transpose()
        .context("Failed to parse PERMISSION_ADMIN_IDS")?
        .unwrap_or_default();

    let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or(defaults.cors_allowed_origins);

    Ok(ServiceConfig {
        database_url,
        host,
        port,
        environment,
        run_migrations,
        rate_limit,
        store_timeout,
        tokens,
        default_permissions,
        permission_admin_ids,
        cors_allowed_origins,
    })
}

fn bool_from_env(key: &str) -> Option<bool> {
    env::var(key).ok().map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_from_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow!("Invalid {key} '{value}': {err}")),
        Err(_) => Ok(None),
    }
}

fn ttl_hours_from_env(key: &str) -> Result<Option<chrono::Duration>> {
    match parse_from_env::<i64>(key)? {
        Some(hours) if hours <= 0 => Err(anyhow!("{key} must be positive, got {hours}")),
        Some(hours) => Ok(Some(chrono::Duration::hours(hours))),
        None => Ok(None),
    }
}

fn parse_environment(value: &str) -> Result<Environment> {
    match value.trim().to_ascii_lowercase().as_str() {
        "development" => Ok(Environment::Development),
        "staging" => Ok(Environment::Staging),
        "production" => Ok(Environment::Production),
        other => Err(anyhow!(
            "Unsupported environment '{other}'. Use development, staging, or production."
        )),
    }
}

fn parse_codes(value: &str) -> Result<Vec<String>> {
    let mut codes = Vec::new();
    for item in value.split(|c| c == ',' || c == ';' || c == ' ') {
        let code = item.trim();
        if code.is_empty() {
            continue;
        }
        if !KNOWN_PERMISSIONS.contains(&code) {
            return Err(anyhow!("Unknown permission code '{code}'"));
        }
        if !codes.iter().any(|existing| existing == code) {
            codes.push(code.to_string());
        }
    }
    Ok(codes)
}

fn parse_ids(value: &str) -> Result<Vec<EmployeeId>> {
    let mut ids = Vec::new();
    for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let id = item
            .parse::<EmployeeId>()
            .map_err(|err| anyhow!("Invalid employee id '{item}': {err}"))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}
