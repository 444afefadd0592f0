//! Retry policy: classifies gateway failures and picks the backoff delay.

use super::error::AnalysisError;
use super::state::AnalysisRequest;
use crate::gateway::GatewayError;
use reqwest::StatusCode;
use std::time::Duration;

/// Delay used when a rate-limit response carries no `retry-after` hint.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
/// Ceiling applied to upstream-supplied hints.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// What to do after a failed attempt.
#[derive(Debug)]
pub enum RetryDecision {
    /// Wait this long, then resubmit.
    RetryAfter(Duration),
    /// Stop with this error.
    Terminal(AnalysisError),
}

/// Hint-driven retry policy.
///
/// Only rate-limit responses are retried. The wait is the upstream hint verbatim, or
/// [`DEFAULT_RETRY_DELAY`] when absent, clamped to `max_delay`. No jitter, no exponential growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay used when no hint is provided.
    pub default_delay: Duration,
    /// Upper bound on any honored delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            default_delay: DEFAULT_RETRY_DELAY,
            max_delay: DEFAULT_MAX_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Replace the delay ceiling.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Classify a failed attempt. The attempt budget is checked before any retry is granted.
    pub fn decide(&self, request: &AnalysisRequest, error: GatewayError) -> RetryDecision {
        let Some(status) = error.status else {
            return RetryDecision::Terminal(AnalysisError::ConnectionFailure(error.message));
        };

        if status == StatusCode::TOO_MANY_REQUESTS {
            if request.has_retry_budget() {
                let wait = error
                    .retry_after
                    .unwrap_or(self.default_delay)
                    .min(self.max_delay);
                return RetryDecision::RetryAfter(wait);
            }
            return RetryDecision::Terminal(AnalysisError::RateLimited {
                attempts: request.attempt_number(),
                details: error.details,
            });
        }

        if status.is_server_error() {
            return RetryDecision::Terminal(AnalysisError::UpstreamInternal {
                status,
                details: error.details,
            });
        }

        RetryDecision::Terminal(AnalysisError::AnalysisFailed {
            status,
            message: error.message,
            details: error.details,
        })
    }
}
