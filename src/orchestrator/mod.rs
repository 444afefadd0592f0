//! Resilient request orchestration: the bounded, hint-driven retry state machine.

mod error;
mod policy;
mod service;
mod state;

pub use error::AnalysisError;
pub use policy::{DEFAULT_MAX_RETRY_DELAY, DEFAULT_RETRY_DELAY, RetryDecision, RetryPolicy};
pub use service::Orchestrator;
pub use state::{AnalysisRequest, AnalysisState, AnalysisStatus};
