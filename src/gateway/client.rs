//! Client side of the gateway: reaches the local proxy's `POST /analyze`.

use super::AnalysisGateway;
use super::types::{AnalysisEnvelope, GatewayError, decode_body, parse_retry_after};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Serialize)]
struct AnalyzePayload<'a> {
    #[serde(rename = "fileContent")]
    file_content: &'a str,
}

/// Default request timeout for gateway calls. Sits above the proxy's own 10 second upstream
/// timeout so the proxy gets to report upstream stalls itself.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for a running cvlens gateway.
pub struct HttpGatewayClient {
    http: Client,
    endpoint: String,
}

impl HttpGatewayClient {
    /// Build a client for the gateway rooted at `base_url` (e.g. `http://127.0.0.1:4200`)
    /// using [`DEFAULT_GATEWAY_TIMEOUT`].
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, DEFAULT_GATEWAY_TIMEOUT)
    }

    /// Build a client whose requests fail as connection errors after `timeout`.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("cvlens-submit/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/analyze", base_url.trim_end_matches('/')),
        })
    }

    /// Fully qualified `/analyze` URL this client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisGateway for HttpGatewayClient {
    async fn forward(&self, text: &str) -> Result<AnalysisEnvelope, GatewayError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&AnalyzePayload { file_content: text })
            .send()
            .await
            .map_err(|error| {
                tracing::debug!(endpoint = %self.endpoint, error = %error, "Gateway unreachable");
                GatewayError::connection(format!("failed to reach gateway: {error}"))
            })?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.bytes().await.map_err(|error| {
            GatewayError::connection(format!("failed to read gateway response: {error}"))
        })?;

        if status.is_success() {
            // A body that is not JSON still counts as a success response; the orchestrator
            // rejects it once it finds no `results`.
            let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            return Ok(AnalysisEnvelope::from_value(value));
        }

        let (message, details) = match decode_body(&body) {
            Value::Object(mut fields) => {
                let message = fields
                    .remove("error")
                    .and_then(|error| error.as_str().map(str::to_owned));
                let details = fields.remove("details").filter(|value| !value.is_null());
                (message, details)
            }
            Value::Null => (None, None),
            other => (None, Some(other)),
        };
        let message = message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("gateway request failed")
                .to_string()
        });

        Err(GatewayError::from_status(status, message, details).with_retry_after(retry_after))
    }
}
