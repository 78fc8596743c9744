use std::any::Any;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, Response},
    response::IntoResponse,
};
use common_http_errors::ApiError;
use tower_http::catch_panic::ResponseForPanic;
use tracing::error;

use crate::metrics::ServiceMetrics;

/// Outermost guard: turns a handler panic into a generic server fault and
/// asks the transport to drop the connection afterwards.
#[derive(Clone)]
pub struct PanicResponder {
    metrics: Arc<ServiceMetrics>,
}

impl PanicResponder {
    pub fn new(metrics: Arc<ServiceMetrics>) -> Self {
        Self { metrics }
    }
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Self::ResponseBody> {
        let detail = if let Some(message) = err.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = err.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        error!(panic = %detail, "recovered from handler panic");
        self.metrics.panic_recovered();

        let mut response = ApiError::Internal.into_response();
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
        response
    }
}
