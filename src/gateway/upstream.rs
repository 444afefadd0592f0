//! Upstream adapter for the OpenAI-compatible chat-completions endpoint.

use super::AnalysisGateway;
use super::types::{AnalysisEnvelope, GatewayError, decode_body, parse_retry_after};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

const SYSTEM_PROMPT: &str = "You are an expert in CV analysis.";
const USER_PROMPT_PREFIX: &str = "Analyze this CV: ";
const CHAT_COMPLETIONS_PATH: &str = "v1/chat/completions";

/// Settings injected into [`UpstreamGateway`] at construction.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL of the provider, without the `/v1/...` suffix.
    pub base_url: String,
    /// Bearer credential.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Hard timeout for each upstream call.
    pub timeout: Duration,
}

impl From<&Config> for GatewayConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.upstream_url.clone(),
            api_key: config.upstream_api_key.clone(),
            model: config.upstream_model.clone(),
            timeout: config.upstream_timeout,
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: std::borrow::Cow<'a, str>,
}

/// Forwards document text to the upstream provider with a fixed request shape.
///
/// Stateless apart from the pooled HTTP client, so one instance is shared across all requests.
pub struct UpstreamGateway {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl UpstreamGateway {
    /// Build a gateway from explicit configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("cvlens/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        let endpoint = format!(
            "{}/{CHAT_COMPLETIONS_PATH}",
            config.base_url.trim_end_matches('/')
        );
        tracing::debug!(
            endpoint = %endpoint,
            model = %config.model,
            timeout_secs = config.timeout.as_secs_f64(),
            has_api_key = !config.api_key.is_empty(),
            "Initialized upstream gateway"
        );

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key,
            model: config.model,
        })
    }

    fn build_request<'a>(&'a self, text: &'a str) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("{USER_PROMPT_PREFIX}{text}").into(),
                },
            ],
        }
    }
}

#[async_trait]
impl AnalysisGateway for UpstreamGateway {
    async fn forward(&self, text: &str) -> Result<AnalysisEnvelope, GatewayError> {
        if text.trim().is_empty() {
            return Err(GatewayError::bad_request("file content is required"));
        }

        let request_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::debug!(%request_id, text_len = text.len(), "Forwarding analysis request");

        let response = match self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(text))
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                let message = describe_transport_error(&error);
                tracing::warn!(
                    %request_id,
                    error = %error,
                    "Upstream request failed without response"
                );
                return Err(GatewayError::connection(message));
            }
        };

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.bytes().await.map_err(|error| {
            tracing::warn!(%request_id, %status, error = %error, "Failed to read upstream body");
            GatewayError::connection(describe_transport_error(&error))
        })?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if status.is_success() {
            tracing::info!(%request_id, %status, elapsed_ms, "Upstream analysis succeeded");
            return Ok(AnalysisEnvelope::wrap(decode_body(&body)));
        }

        let details = decode_body(&body);
        tracing::warn!(
            %request_id,
            %status,
            elapsed_ms,
            retry_after_secs = retry_after.map(|delay| delay.as_secs_f64()),
            details = %details,
            "Upstream analysis failed"
        );
        let details = (!details.is_null()).then_some(details);
        Err(
            GatewayError::from_status(status, failure_message(status), details)
                .with_retry_after(retry_after),
        )
    }
}

fn failure_message(status: StatusCode) -> &'static str {
    if status == StatusCode::TOO_MANY_REQUESTS {
        "analysis rate-limited by upstream provider"
    } else {
        "analysis request failed"
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "upstream request timed out".to_string()
    } else if error.is_connect() {
        format!("failed to reach upstream provider: {error}")
    } else {
        format!("upstream request failed: {error}")
    }
}
