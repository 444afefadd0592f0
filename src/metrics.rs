use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::StatusCode;

/// Thread-safe counters describing gateway traffic.
#[derive(Default)]
pub struct GatewayMetrics {
    requests_forwarded: AtomicU64,
    upstream_successes: AtomicU64,
    upstream_failures: AtomicU64,
    rate_limited: AtomicU64,
}

impl GatewayMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request accepted for forwarding.
    pub fn record_request(&self) {
        self.requests_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful upstream analysis.
    pub fn record_success(&self) {
        self.upstream_successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed upstream analysis; `None` means no response was received.
    pub fn record_failure(&self, status: Option<StatusCode>) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
        if status == Some(StatusCode::TOO_MANY_REQUESTS) {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_forwarded: self.requests_forwarded.load(Ordering::Relaxed),
            upstream_successes: self.upstream_successes.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of gateway counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Requests forwarded upstream since startup.
    pub requests_forwarded: u64,
    /// Upstream calls that returned a success status.
    pub upstream_successes: u64,
    /// Upstream calls that failed, with or without a response.
    pub upstream_failures: u64,
    /// Subset of failures that were rate-limit responses.
    pub rate_limited: u64,
}
