//! Analysis gateway: the boundary between the pipeline and the upstream provider.
//!
//! [`UpstreamGateway`] runs inside the proxy server and talks to the OpenAI-compatible
//! provider. [`HttpGatewayClient`] is what the orchestrator uses to reach that proxy over HTTP.
//! Both normalize every failure into a [`GatewayError`].

mod client;
pub mod types;
mod upstream;

use async_trait::async_trait;

pub use client::{DEFAULT_GATEWAY_TIMEOUT, HttpGatewayClient};
pub use types::{
    AnalysisEnvelope, AnalysisResult, GatewayError, MAX_RETRY_AFTER_HINT, parse_retry_after,
};
pub use upstream::{GatewayConfig, UpstreamGateway};

/// Interface implemented by anything that can forward extracted text for analysis.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// Submit document text and return the success envelope or a normalized failure.
    async fn forward(&self, text: &str) -> Result<AnalysisEnvelope, GatewayError>;
}
