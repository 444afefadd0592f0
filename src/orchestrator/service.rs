//! Orchestrator driving the retry state machine over an [`AnalysisGateway`].

use super::error::AnalysisError;
use super::policy::{RetryDecision, RetryPolicy};
use super::state::{AnalysisRequest, AnalysisState, AnalysisStatus};
use crate::cancel::CancelSignal;
use crate::gateway::{AnalysisEnvelope, AnalysisGateway, AnalysisResult, GatewayError};
use crate::ingest::{ExtractedContent, UploadedDocument, ingest};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Runs one analysis per call: submit, classify, wait out rate limits, and terminate.
///
/// Calls are independent; each owns its own [`AnalysisRequest`] and nothing is shared between
/// them besides the gateway handle. Attempts within a call are strictly sequential.
pub struct Orchestrator<G: ?Sized> {
    gateway: Arc<G>,
    policy: RetryPolicy,
}

impl<G> Orchestrator<G>
where
    G: AnalysisGateway + ?Sized,
{
    /// Build an orchestrator with the default retry policy.
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Retry policy in effect.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Analyze extracted content without status updates or cancellation.
    pub async fn analyze(
        &self,
        content: ExtractedContent,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_observed(content, None, &CancelSignal::never())
            .await
    }

    /// Ingest a document and analyze it. Invalid documents fail before the gateway is called.
    pub async fn submit(
        &self,
        document: UploadedDocument,
        updates: Option<&UnboundedSender<AnalysisStatus>>,
        cancel: &CancelSignal,
    ) -> Result<AnalysisResult, AnalysisError> {
        let content = match ingest(document) {
            Ok(content) => content,
            Err(error) => {
                let error = AnalysisError::from(error);
                emit(updates, failed_status(&error));
                return Err(error);
            }
        };
        self.analyze_observed(content, updates, cancel).await
    }

    /// Analyze extracted content, emitting [`AnalysisStatus`] updates and honoring `cancel`
    /// while a gateway call or retry wait is pending.
    pub async fn analyze_observed(
        &self,
        content: ExtractedContent,
        updates: Option<&UnboundedSender<AnalysisStatus>>,
        cancel: &CancelSignal,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut request = AnalysisRequest::new(content);
        let mut state = AnalysisState::Idle;

        loop {
            state = match state {
                AnalysisState::Idle => AnalysisState::Submitting,
                AnalysisState::Submitting => {
                    emit(
                        updates,
                        AnalysisStatus::Submitting {
                            attempt: request.attempt_number(),
                        },
                    );
                    tracing::info!(
                        attempt = request.attempt_number(),
                        max_attempts = AnalysisRequest::MAX_ATTEMPTS,
                        fingerprint = %request.content().fingerprint(),
                        "Submitting analysis request"
                    );

                    let response = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(None),
                        response = self.gateway.forward(request.content().as_str()) => {
                            response.map_err(Some)
                        }
                    };
                    match response {
                        Err(None) => AnalysisState::Failed(AnalysisError::Cancelled),
                        Err(Some(error)) => self.after_failure(&request, error),
                        Ok(envelope) => after_success(envelope),
                    }
                }
                AnalysisState::Retrying { wait } => {
                    emit(
                        updates,
                        AnalysisStatus::Retrying {
                            attempt: request.attempt_number(),
                            wait_seconds: wait.as_secs_f64(),
                        },
                    );
                    tracing::warn!(
                        attempt = request.attempt_number(),
                        wait_secs = wait.as_secs_f64(),
                        "Rate limited; waiting before retry"
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => AnalysisState::Failed(AnalysisError::Cancelled),
                        _ = tokio::time::sleep(wait) => {
                            request.advance();
                            AnalysisState::Submitting
                        }
                    }
                }
                AnalysisState::Succeeded(result) => {
                    emit(updates, AnalysisStatus::Succeeded);
                    tracing::info!(attempts = request.attempt_number(), "Analysis succeeded");
                    return Ok(result);
                }
                AnalysisState::Failed(error) => {
                    emit(updates, failed_status(&error));
                    tracing::error!(
                        attempts = request.attempt_number(),
                        error = %error,
                        "Analysis failed"
                    );
                    return Err(error);
                }
            };
        }
    }

    fn after_failure(&self, request: &AnalysisRequest, error: GatewayError) -> AnalysisState {
        tracing::debug!(
            attempt = request.attempt_number(),
            status = ?error.status,
            error = %error,
            "Gateway call failed"
        );
        match self.policy.decide(request, error) {
            RetryDecision::RetryAfter(wait) => AnalysisState::Retrying { wait },
            RetryDecision::Terminal(error) => AnalysisState::Failed(error),
        }
    }
}

/// A success response must carry results; anything else breaks the gateway contract.
fn after_success(envelope: AnalysisEnvelope) -> AnalysisState {
    match envelope.into_results() {
        Some(result) => AnalysisState::Succeeded(result),
        None => AnalysisState::Failed(AnalysisError::ContractViolation),
    }
}

fn failed_status(error: &AnalysisError) -> AnalysisStatus {
    AnalysisStatus::Failed {
        reason: error.to_string(),
        message: error.user_message().to_string(),
    }
}

fn emit(updates: Option<&UnboundedSender<AnalysisStatus>>, status: AnalysisStatus) {
    if let Some(sender) = updates {
        // A dropped receiver only means nobody is watching.
        let _ = sender.send(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancellation;
    use crate::ingest::DocumentKind;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::{Mutex, mpsc};
    use tokio::time::Instant;

    type Scripted = Result<Value, GatewayError>;

    /// Gateway that replays a fixed script and records when each call arrived.
    struct ScriptedGateway {
        script: Mutex<VecDeque<Scripted>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedGateway {
        fn new(script: impl IntoIterator<Item = Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            })
        }

        async fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().await.clone()
        }

        async fn call_count(&self) -> usize {
            self.calls.lock().await.len()
        }
    }

    #[async_trait]
    impl AnalysisGateway for ScriptedGateway {
        async fn forward(&self, _text: &str) -> Result<AnalysisEnvelope, GatewayError> {
            self.calls.lock().await.push(Instant::now());
            match self.script.lock().await.pop_front() {
                Some(Ok(body)) => Ok(AnalysisEnvelope::from_value(body)),
                Some(Err(error)) => Err(error),
                None => panic!("gateway called more often than scripted"),
            }
        }
    }

    /// Gateway whose calls never complete.
    struct HangingGateway;

    #[async_trait]
    impl AnalysisGateway for HangingGateway {
        async fn forward(&self, _text: &str) -> Result<AnalysisEnvelope, GatewayError> {
            std::future::pending().await
        }
    }

    fn content() -> ExtractedContent {
        ExtractedContent::new("Jane Doe\nRust engineer", DocumentKind::PlainText).expect("content")
    }

    fn ok() -> Scripted {
        Ok(json!({ "results": { "summary": "strong candidate" } }))
    }

    fn too_many(hint_secs: Option<u64>) -> Scripted {
        Err(
            GatewayError::from_status(StatusCode::TOO_MANY_REQUESTS, "rate limited", None)
                .with_retry_after(hint_secs.map(Duration::from_secs)),
        )
    }

    fn gaps(times: &[Instant]) -> Vec<Duration> {
        times.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }

    fn assert_gap(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(50),
            "expected ~{expected:?}, waited {actual:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_attempt() {
        let gateway = ScriptedGateway::new([ok()]);
        let result = Orchestrator::new(gateway.clone())
            .analyze(content())
            .await
            .expect("success");

        assert_eq!(result.into_value(), json!({ "summary": "strong candidate" }));
        assert_eq!(gateway.call_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn two_rate_limits_then_success_uses_three_attempts_and_hints() {
        let gateway = ScriptedGateway::new([too_many(Some(5)), too_many(None), ok()]);
        let result = Orchestrator::new(gateway.clone()).analyze(content()).await;

        assert!(result.is_ok(), "unexpected failure: {result:?}");
        let times = gateway.call_times().await;
        assert_eq!(times.len(), 3);
        let gaps = gaps(&times);
        assert_gap(gaps[0], Duration::from_secs(5));
        assert_gap(gaps[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn one_rate_limit_then_success() {
        let gateway = ScriptedGateway::new([too_many(Some(1)), ok()]);
        let result = Orchestrator::new(gateway.clone()).analyze(content()).await;

        assert!(result.is_ok());
        let times = gateway.call_times().await;
        assert_eq!(times.len(), 2);
        assert_gap(gaps(&times)[0], Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn third_rate_limit_exhausts_budget() {
        let gateway = ScriptedGateway::new([too_many(None), too_many(None), too_many(None)]);
        let error = Orchestrator::new(gateway.clone())
            .analyze(content())
            .await
            .expect_err("exhausted");

        assert!(matches!(error, AnalysisError::RateLimited { attempts: 3, .. }));
        assert!(error.to_string().contains("retries exhausted"));
        assert_eq!(gateway.call_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_fails_after_one_attempt() {
        let gateway = ScriptedGateway::new([Err(GatewayError::from_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            "analysis request failed",
            Some(json!({ "error": "boom" })),
        ))]);
        let error = Orchestrator::new(gateway.clone())
            .analyze(content())
            .await
            .expect_err("500");

        assert!(matches!(error, AnalysisError::UpstreamInternal { .. }));
        assert_eq!(error.details(), Some(&json!({ "error": "boom" })));
        assert_eq!(gateway.call_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_failure_is_distinct_from_http_errors() {
        let gateway = ScriptedGateway::new([Err(GatewayError::connection("refused"))]);
        let connection = Orchestrator::new(gateway)
            .analyze(content())
            .await
            .expect_err("connection");

        let gateway = ScriptedGateway::new([Err(GatewayError::from_status(
            StatusCode::BAD_REQUEST,
            "file content is required",
            None,
        ))]);
        let http = Orchestrator::new(gateway.clone())
            .analyze(content())
            .await
            .expect_err("http");

        assert!(connection.is_connection_failure());
        assert!(matches!(http, AnalysisError::AnalysisFailed { .. }));
        assert_ne!(connection.user_message(), http.user_message());
        assert_eq!(gateway.call_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_without_results_is_a_contract_violation() {
        let gateway = ScriptedGateway::new([Ok(json!({ "data": {} }))]);
        let error = Orchestrator::new(gateway.clone())
            .analyze(content())
            .await
            .expect_err("contract");

        assert!(matches!(error, AnalysisError::ContractViolation));
        assert_eq!(gateway.call_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_then_server_error_stops_immediately() {
        let gateway = ScriptedGateway::new([
            too_many(Some(1)),
            Err(GatewayError::from_status(StatusCode::BAD_GATEWAY, "bad gateway", None)),
        ]);
        let error = Orchestrator::new(gateway.clone())
            .analyze(content())
            .await
            .expect_err("502");

        assert!(matches!(error, AnalysisError::UpstreamInternal { .. }));
        assert_eq!(gateway.call_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_delay_is_capped_by_policy() {
        let gateway = ScriptedGateway::new([too_many(Some(600)), ok()]);
        let orchestrator = Orchestrator::new(gateway.clone())
            .with_policy(RetryPolicy::default().with_max_delay(Duration::from_secs(30)));
        orchestrator.analyze(content()).await.expect("success");

        let times = gateway.call_times().await;
        assert_gap(gaps(&times)[0], Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn emits_status_updates_in_order() {
        let gateway = ScriptedGateway::new([too_many(Some(3)), ok()]);
        let (sender, mut receiver) = mpsc::unbounded_channel();
        Orchestrator::new(gateway)
            .analyze_observed(content(), Some(&sender), &CancelSignal::never())
            .await
            .expect("success");
        drop(sender);

        let mut updates = Vec::new();
        while let Some(update) = receiver.recv().await {
            updates.push(update);
        }
        assert_eq!(
            updates,
            vec![
                AnalysisStatus::Submitting { attempt: 1 },
                AnalysisStatus::Retrying {
                    attempt: 1,
                    wait_seconds: 3.0
                },
                AnalysisStatus::Submitting { attempt: 2 },
                AnalysisStatus::Succeeded,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_status_carries_reason_and_message() {
        let gateway = ScriptedGateway::new([Err(GatewayError::connection("refused"))]);
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let _ = Orchestrator::new(gateway)
            .analyze_observed(content(), Some(&sender), &CancelSignal::never())
            .await;
        drop(sender);

        let mut last = None;
        while let Some(update) = receiver.recv().await {
            last = Some(update);
        }
        match last {
            Some(AnalysisStatus::Failed { reason, message }) => {
                assert!(reason.starts_with("connection error"));
                assert!(message.contains("connection"));
            }
            other => panic!("unexpected final status: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_pending_retry_wait() {
        let gateway = ScriptedGateway::new([too_many(Some(20))]);
        let (handle, signal) = cancellation();
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let task = tokio::spawn({
            let gateway = gateway.clone();
            async move {
                Orchestrator::new(gateway)
                    .analyze_observed(content(), Some(&sender), &signal)
                    .await
            }
        });

        loop {
            match receiver.recv().await {
                Some(AnalysisStatus::Retrying { .. }) => break,
                Some(_) => continue,
                None => panic!("orchestrator finished before retrying"),
            }
        }
        handle.cancel();

        let outcome = task.await.expect("task joined");
        assert!(matches!(outcome, Err(AnalysisError::Cancelled)));
        assert_eq!(gateway.call_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_in_flight_call() {
        let (handle, signal) = cancellation();
        handle.cancel();

        let error = Orchestrator::new(Arc::new(HangingGateway))
            .analyze_observed(content(), None, &signal)
            .await
            .expect_err("cancelled");
        assert!(matches!(error, AnalysisError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_documents_never_reach_the_gateway() {
        let gateway = ScriptedGateway::new(Vec::<Scripted>::new());
        let orchestrator = Orchestrator::new(gateway.clone());

        for (mime, name) in [
            ("image/png", "photo.png"),
            ("application/zip", "cv.zip"),
            ("", "cv.odt"),
        ] {
            let error = orchestrator
                .submit(
                    UploadedDocument::new("Jane Doe", mime, name),
                    None,
                    &CancelSignal::never(),
                )
                .await
                .expect_err("invalid type");
            assert!(matches!(
                error,
                AnalysisError::InvalidInput(crate::ingest::IngestError::InvalidFileType { .. })
            ));
        }
        assert_eq!(gateway.call_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_runs_ingest_then_analysis() {
        let gateway = ScriptedGateway::new([ok()]);
        let result = Orchestrator::new(gateway.clone())
            .submit(
                UploadedDocument::new("Jane Doe", "application/pdf", "cv.pdf"),
                None,
                &CancelSignal::never(),
            )
            .await
            .expect("success");

        assert_eq!(result.as_value()["summary"], "strong candidate");
        assert_eq!(gateway.call_count().await, 1);
    }
}
