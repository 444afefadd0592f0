//! Terminal failure taxonomy for the analysis pipeline.

use crate::ingest::IngestError;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Terminal outcome of a failed analysis.
///
/// Only [`AnalysisError::RateLimited`] is ever preceded by retries; every other class ends the
/// pipeline on first occurrence.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The submitted document was rejected before anything was sent upstream.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] IngestError),
    /// Upstream kept rate-limiting until the attempt budget ran out.
    #[error("rate-limited, retries exhausted after {attempts} attempts")]
    RateLimited {
        /// Attempts issued, including the initial one.
        attempts: u32,
        /// Error body of the final rate-limit response.
        details: Option<Value>,
    },
    /// Upstream or gateway answered with a 5xx status.
    #[error("upstream internal error ({status})")]
    UpstreamInternal {
        /// Status received.
        status: StatusCode,
        /// Error body, if any.
        details: Option<Value>,
    },
    /// Any other HTTP error status.
    #[error("analysis error ({status}): {message}")]
    AnalysisFailed {
        /// Status received.
        status: StatusCode,
        /// Message reported by the gateway.
        message: String,
        /// Error body, if any.
        details: Option<Value>,
    },
    /// No HTTP response was received.
    #[error("connection error: {0}")]
    ConnectionFailure(String),
    /// A success response did not carry a `results` payload.
    #[error("contract violation: success response is missing results")]
    ContractViolation,
    /// The caller aborted the pipeline.
    #[error("analysis cancelled")]
    Cancelled,
}

impl AnalysisError {
    /// Short, user-displayable description of the failure class.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput(IngestError::InvalidFileType { .. }) => {
                "Please upload a PDF, DOCX or plain-text file."
            }
            Self::InvalidInput(IngestError::EmptyContent(_)) => {
                "The file does not contain any readable text."
            }
            Self::InvalidInput(IngestError::Read { .. }) => "The file could not be read.",
            Self::InvalidInput(IngestError::Cancelled) | Self::Cancelled => {
                "The analysis was cancelled."
            }
            Self::RateLimited { .. } => "Too many requests. Please try again later.",
            Self::UpstreamInternal { .. } => "Internal server error. Please try again later.",
            Self::AnalysisFailed { .. } => "An error occurred during analysis. Please try again.",
            Self::ConnectionFailure(_) => {
                "A connection error occurred. Please check your connection."
            }
            Self::ContractViolation => "The server response is invalid. Please try again.",
        }
    }

    /// Whether the failure happened without any HTTP response.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailure(_))
    }

    /// Diagnostic body forwarded from the upstream, when available.
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::RateLimited { details, .. }
            | Self::UpstreamInternal { details, .. }
            | Self::AnalysisFailed { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}
