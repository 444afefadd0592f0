//! Shared types for the analysis gateway contract.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

/// Normalized representation of any failure at the gateway boundary.
///
/// `status` is `None` when no HTTP response was received (connect failure, timeout).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GatewayError {
    /// HTTP status reported by the upstream or proxy, if a response arrived.
    pub status: Option<StatusCode>,
    /// Human-readable summary of the failure.
    pub message: String,
    /// Raw upstream error body, forwarded verbatim for diagnostics.
    pub details: Option<Value>,
    /// Delay hint taken from a `retry-after` response header.
    pub retry_after: Option<Duration>,
}

impl GatewayError {
    /// Failure without any HTTP response.
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            details: None,
            retry_after: None,
        }
    }

    /// Local rejection of a request that never reached the upstream.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::from_status(StatusCode::BAD_REQUEST, message, None)
    }

    /// Failure carrying an HTTP status and optional diagnostic body.
    pub fn from_status(
        status: StatusCode,
        message: impl Into<String>,
        details: Option<Value>,
    ) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            details,
            retry_after: None,
        }
    }

    /// Attach a `retry-after` hint.
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Status to report over HTTP; failures without a response map to 500.
    pub fn http_status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Whether the failure happened before any HTTP response was received.
    pub fn is_connection(&self) -> bool {
        self.status.is_none()
    }
}

/// Structured payload produced by the upstream provider, passed through unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult(pub Value);

impl AnalysisResult {
    /// Borrow the raw JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the raw JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Success body exchanged between the gateway and its callers: `{ "results": ... }`.
///
/// The envelope is kept as raw JSON so that a caller can detect a success response that
/// violates the contract (missing or null `results`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnalysisEnvelope(Value);

impl AnalysisEnvelope {
    /// Wrap an upstream body as `{ "results": body }`.
    pub fn wrap(results: Value) -> Self {
        Self(json!({ "results": results }))
    }

    /// Adopt a body received from the gateway as-is.
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Extract the `results` payload, if present and non-null.
    pub fn into_results(self) -> Option<AnalysisResult> {
        match self.0 {
            Value::Object(mut body) => match body.remove("results") {
                None | Some(Value::Null) => None,
                Some(results) => Some(AnalysisResult(results)),
            },
            _ => None,
        }
    }
}

/// Largest `retry-after` hint kept as-is; anything beyond is saturated to this value.
pub const MAX_RETRY_AFTER_HINT: Duration = Duration::from_secs(24 * 60 * 60);

/// Parse a `retry-after` header expressed in (possibly fractional) seconds.
///
/// HTTP-date values and negative or malformed numbers yield `None`. Hints larger than
/// [`MAX_RETRY_AFTER_HINT`] (including values too large for [`Duration`]) saturate to it.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER_HINT));
    }
    let secs = raw
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)?;
    Some(
        Duration::try_from_secs_f64(secs)
            .map_or(MAX_RETRY_AFTER_HINT, |hint| hint.min(MAX_RETRY_AFTER_HINT)),
    )
}

/// Decode a response body as JSON, falling back to a JSON string for non-JSON payloads.
pub(crate) fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
