//! HTTP surface for the cvlens gateway.
//!
//! - `POST /analyze` – Accepts `{ "fileContent": string }`, forwards the text to the upstream
//!   provider, and answers `200 { "results": ... }` with the upstream body unmodified. Missing or
//!   empty content yields `400 { "error" }`; any other method yields `405 { "error" }`. Upstream
//!   failures are relayed with the upstream status (500 when no response arrived) as
//!   `{ "error", "details" }`, plus a `retry-after` header when the upstream supplied one.
//! - `GET /metrics` – Gateway traffic counters.

use crate::gateway::{AnalysisEnvelope, AnalysisGateway, GatewayError};
use crate::metrics::{GatewayMetrics, MetricsSnapshot};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Shared state handed to every handler.
struct AppState<G: ?Sized> {
    gateway: Arc<G>,
    metrics: Arc<GatewayMetrics>,
}

impl<G: ?Sized> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Build the HTTP router exposing the gateway surface.
pub fn create_router<G>(gateway: Arc<G>, metrics: Arc<GatewayMetrics>) -> Router
where
    G: AnalysisGateway + ?Sized + 'static,
{
    Router::new()
        .route(
            "/analyze",
            post(analyze::<G>).fallback(method_not_allowed),
        )
        .route("/metrics", get(get_metrics::<G>))
        .with_state(AppState { gateway, metrics })
}

/// Request body for `POST /analyze`.
#[derive(Deserialize)]
struct AnalyzeRequest {
    /// Extracted document text.
    #[serde(rename = "fileContent", default)]
    file_content: Option<String>,
}

/// Forward extracted text for analysis.
async fn analyze<G>(
    State(state): State<AppState<G>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisEnvelope>, AppError>
where
    G: AnalysisGateway + ?Sized,
{
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected malformed analyze request");
            return Err(AppError::BadRequest("file content is required"));
        }
    };
    let Some(text) = request.file_content.filter(|text| !text.trim().is_empty()) else {
        return Err(AppError::BadRequest("file content is required"));
    };

    state.metrics.record_request();
    match state.gateway.forward(&text).await {
        Ok(envelope) => {
            state.metrics.record_success();
            Ok(Json(envelope))
        }
        Err(error) => {
            state.metrics.record_failure(error.status);
            tracing::warn!(
                status = %error.http_status(),
                connection = error.is_connection(),
                error = %error,
                "Analyze request failed"
            );
            Err(AppError::Gateway(error))
        }
    }
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn get_metrics<G>(State(state): State<AppState<G>>) -> Json<MetricsSnapshot>
where
    G: AnalysisGateway + ?Sized,
{
    Json(state.metrics.snapshot())
}

enum AppError {
    BadRequest(&'static str),
    MethodNotAllowed,
    Gateway(GatewayError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({ "error": "method not allowed" })),
            )
                .into_response(),
            Self::Gateway(error) => {
                let mut response = (
                    error.http_status(),
                    Json(json!({
                        "error": error.message,
                        "details": error.details,
                    })),
                )
                    .into_response();
                if let Some(delay) = error.retry_after {
                    let secs = delay.as_secs().saturating_add(u64::from(delay.subsec_nanos() > 0));
                    if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                        response.headers_mut().insert(RETRY_AFTER, value);
                    }
                }
                response
            }
        }
    }
}
