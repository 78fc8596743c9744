use anyhow::Result;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::app::AppState;

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    guard_rejections: IntCounterVec,
    panics_recovered: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "backoffice_login_attempts_total",
                "Count of authentication token requests grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let guard_rejections = IntCounterVec::new(
            Opts::new(
                "backoffice_guard_rejections_total",
                "Requests short-circuited by a request guard",
            ),
            &["guard"],
        )?;
        registry.register(Box::new(guard_rejections.clone()))?;

        let panics_recovered = IntCounter::new(
            "backoffice_panics_recovered_total",
            "Handler panics turned into server-fault responses",
        )?;
        registry.register(Box::new(panics_recovered.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            guard_rejections,
            panics_recovered,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn guard_rejection(&self, guard: &str) {
        self.guard_rejections.with_label_values(&[guard]).inc();
    }

    pub fn panic_recovered(&self) {
        self.panics_recovered.inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "Unable to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render_in_text_format() {
        let metrics = ServiceMetrics::new().expect("metrics");
        metrics.login_attempt("success");
        metrics.guard_rejection("require_activated");
        metrics.panic_recovered();

        let families = metrics.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("backoffice_login_attempts_total{outcome=\"success\"} 1"));
        assert!(text.contains("backoffice_guard_rejections_total{guard=\"require_activated\"} 1"));
        assert!(text.contains("backoffice_panics_recovered_total 1"));
    }
}
