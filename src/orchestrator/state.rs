//! Request, state, and status types driven by the orchestrator.

use super::error::AnalysisError;
use crate::gateway::AnalysisResult;
use crate::ingest::ExtractedContent;
use std::time::Duration;

/// One in-flight analysis: the content plus its attempt counter.
#[derive(Debug)]
pub struct AnalysisRequest {
    content: ExtractedContent,
    attempt: u32,
}

impl AnalysisRequest {
    /// Total attempts allowed per request (1 initial + 2 retries).
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Start a request at attempt zero.
    pub fn new(content: ExtractedContent) -> Self {
        Self {
            content,
            attempt: 0,
        }
    }

    /// Content being analyzed.
    pub fn content(&self) -> &ExtractedContent {
        &self.content
    }

    /// Zero-based index of the current attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// One-based attempt number, for display.
    pub fn attempt_number(&self) -> u32 {
        self.attempt + 1
    }

    /// Whether another attempt may follow the current one.
    pub fn has_retry_budget(&self) -> bool {
        self.attempt < Self::MAX_ATTEMPTS - 1
    }

    /// Move to the next attempt. Callers check [`Self::has_retry_budget`] first.
    pub(crate) fn advance(&mut self) {
        debug_assert!(self.has_retry_budget());
        self.attempt += 1;
    }
}

/// States of the retry state machine.
///
/// `Idle → Submitting → {Succeeded | Retrying | Failed}`, with `Retrying → Submitting`
/// bounded by [`AnalysisRequest::MAX_ATTEMPTS`]. `Succeeded` and `Failed` are terminal and
/// carry the outcome.
#[derive(Debug)]
pub enum AnalysisState {
    /// Nothing submitted yet.
    Idle,
    /// A gateway call is in flight.
    Submitting,
    /// Waiting out a rate-limit hint before the next attempt.
    Retrying {
        /// Delay to wait before resubmitting.
        wait: Duration,
    },
    /// Terminal success.
    Succeeded(AnalysisResult),
    /// Terminal failure.
    Failed(AnalysisError),
}

/// User-facing progress updates emitted while an analysis runs.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisStatus {
    /// Attempt `attempt` (one-based) is being submitted.
    Submitting {
        /// One-based attempt number.
        attempt: u32,
    },
    /// Attempt `attempt` was rate-limited; the next one starts after `wait_seconds`.
    Retrying {
        /// One-based number of the rate-limited attempt.
        attempt: u32,
        /// Delay before the next attempt, in seconds.
        wait_seconds: f64,
    },
    /// The analysis failed terminally.
    Failed {
        /// Failure reason, naming the failure class.
        reason: String,
        /// User-displayable message.
        message: String,
    },
    /// The analysis succeeded.
    Succeeded,
}

impl AnalysisStatus {
    /// Message suitable for direct display.
    pub fn message(&self) -> String {
        match self {
            Self::Submitting { attempt: 1 } => "Submitting document for analysis...".to_string(),
            Self::Submitting { attempt } => format!(
                "Resubmitting document (attempt {attempt} of {}).",
                AnalysisRequest::MAX_ATTEMPTS
            ),
            Self::Retrying {
                attempt,
                wait_seconds,
            } => format!(
                "Too many requests. Attempt {attempt} of {}; retrying in {wait_seconds:.1}s.",
                AnalysisRequest::MAX_ATTEMPTS
            ),
            Self::Failed { message, .. } => message.clone(),
            Self::Succeeded => "Analysis complete.".to_string(),
        }
    }
}
