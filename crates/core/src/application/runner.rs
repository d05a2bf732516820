// Diagnosis Job Runner - one attempt of the diagnosis job

use crate::domain::{SessionId, SessionStatus};
use crate::port::{
    AnalysisProvider, AnalysisRequest, MonitoringSink, ProviderError, SessionRepository,
    TimeProvider,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Attempt-local error taxonomy
///
/// `SessionNotFound` is permanent (a missing session is a data problem, not
/// a transient fault); everything else is retryable up to the attempt budget.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Job timed out after {0}ms")]
    Timeout(i64),
}

impl JobError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, JobError::SessionNotFound(_))
    }
}

/// Outcome of a single attempt
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Result persisted and session driven to COMPLETED
    Completed(crate::domain::DiagnosisResult),
    /// Stale/duplicate delivery: the session was already terminal,
    /// status side effects skipped
    AlreadyTerminal,
}

/// Executes one attempt: lookup -> PROCESSING -> provider -> result -> COMPLETED.
///
/// Retry-agnostic by design: failures are raised as typed errors and the
/// enclosing JobExecutor decides what happens next.
pub struct DiagnosisJobRunner {
    session_repo: Arc<dyn SessionRepository>,
    provider: Arc<dyn AnalysisProvider>,
    monitor: Arc<dyn MonitoringSink>,
    time_provider: Arc<dyn TimeProvider>,
}

impl DiagnosisJobRunner {
    pub fn new(
        session_repo: Arc<dyn SessionRepository>,
        provider: Arc<dyn AnalysisProvider>,
        monitor: Arc<dyn MonitoringSink>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            session_repo,
            provider,
            monitor,
            time_provider,
        }
    }

    /// Run one attempt for the session
    ///
    /// Every attempt-local error is reported to the monitoring sink before
    /// being re-raised to the executor.
    pub async fn run_attempt(&self, session_id: &SessionId) -> Result<AttemptOutcome, JobError> {
        match self.attempt_inner(session_id).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.monitor
                    .log_error(&err.to_string(), &[("session_id", session_id.as_str())]);
                Err(err)
            }
        }
    }

    async fn attempt_inner(&self, session_id: &SessionId) -> Result<AttemptOutcome, JobError> {
        let started = self.time_provider.now_millis();

        let session = self
            .session_repo
            .find_by_id(session_id)
            .await
            .map_err(|e| JobError::Persistence(e.to_string()))?
            .ok_or_else(|| JobError::SessionNotFound(session_id.clone()))?;

        if session.status.is_terminal() {
            warn!(
                session_id = %session_id,
                status = %session.status,
                "Stale job delivery for terminal session, skipping"
            );
            return Ok(AttemptOutcome::AlreadyTerminal);
        }

        // Idempotent on retry: a session already PROCESSING stays claimed
        let moved = self
            .session_repo
            .mark_processing(session_id, started)
            .await
            .map_err(|e| JobError::Persistence(e.to_string()))?;
        if !moved {
            return Ok(AttemptOutcome::AlreadyTerminal);
        }

        info!(
            session_id = %session_id,
            vehicle = %format!("{} {}", session.input.vehicle_make, session.input.vehicle_model),
            "Running diagnosis"
        );

        let request = AnalysisRequest::from_session(&session);
        let response = self.provider.analyze(&request).await?;

        let finished = self.time_provider.now_millis();
        let elapsed_ms = finished - started;

        let result = response.into_result(session_id.clone(), elapsed_ms, finished)?;

        self.session_repo
            .attach_result(&result)
            .await
            .map_err(|e| JobError::Persistence(e.to_string()))?;

        let completed = self
            .session_repo
            .finish(session_id, SessionStatus::Completed, finished)
            .await
            .map_err(|e| JobError::Persistence(e.to_string()))?;

        // Telemetry for a stale duplicate is still allowed; the status
        // guard above is what keeps terminal rows intact.
        self.monitor.log_performance(
            "diagnosis.completed",
            elapsed_ms,
            &[
                ("session_id", session_id.as_str()),
                ("provider", result.ai_provider.as_str()),
            ],
        );

        if !completed {
            debug!(
                session_id = %session_id,
                "Session reached a terminal status concurrently, completion skipped"
            );
            return Ok(AttemptOutcome::AlreadyTerminal);
        }

        info!(
            session_id = %session_id,
            elapsed_ms = %elapsed_ms,
            confidence = %result.confidence_score,
            "Diagnosis completed"
        );

        Ok(AttemptOutcome::Completed(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DiagnosisInput, DiagnosisSession};
    use crate::port::analysis_provider::mocks::{
        sample_response, MockAnalysisProvider, MockBehavior,
    };
    use crate::port::monitoring::mocks::RecordingMonitor;
    use crate::port::session_repository::mocks::InMemorySessionRepository;
    use crate::port::time_provider::mocks::MockTimeProvider;

    fn input() -> DiagnosisInput {
        DiagnosisInput {
            vehicle_make: "Toyota".to_string(),
            vehicle_model: "Corolla".to_string(),
            vehicle_year: Some(2016),
            mileage_km: Some(120_000),
            symptom_description: "oil spots under the engine".to_string(),
        }
    }

    struct Harness {
        repo: Arc<InMemorySessionRepository>,
        monitor: Arc<RecordingMonitor>,
        runner: DiagnosisJobRunner,
    }

    fn harness(provider: MockAnalysisProvider) -> Harness {
        let repo = Arc::new(InMemorySessionRepository::new());
        let monitor = Arc::new(RecordingMonitor::new());
        let runner = DiagnosisJobRunner::new(
            repo.clone(),
            Arc::new(provider),
            monitor.clone(),
            Arc::new(MockTimeProvider::new(10_000)),
        );
        Harness {
            repo,
            monitor,
            runner,
        }
    }

    #[tokio::test]
    async fn test_successful_attempt_completes_session() {
        let h = harness(MockAnalysisProvider::new_success());
        let session = DiagnosisSession::new_test("user-1", input());
        h.repo.insert(&session).await.unwrap();

        let outcome = h.runner.run_attempt(&session.id).await.unwrap();

        let result = match outcome {
            AttemptOutcome::Completed(result) => result,
            other => panic!("expected completion, got {:?}", other),
        };
        assert_eq!(result.confidence_score, 85);
        assert_eq!(result.ai_provider, "unknown");
        assert_eq!(result.ai_model_version, "1.0");
        assert!(!result.requires_immediate_attention);

        assert_eq!(h.repo.status_of(&session.id), Some(SessionStatus::Completed));
        assert!(h.repo.find_result(&session.id).await.unwrap().is_some());
        assert_eq!(h.monitor.performance_count(), 1);
        assert_eq!(h.monitor.error_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_session_is_permanent() {
        let h = harness(MockAnalysisProvider::new_success());

        let err = h
            .runner
            .run_attempt(&"sess-missing".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::SessionNotFound(_)));
        assert!(!err.is_retryable());
        assert_eq!(h.monitor.error_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported_and_retryable() {
        let h = harness(MockAnalysisProvider::new_fail("model overloaded"));
        let session = DiagnosisSession::new_test("user-1", input());
        h.repo.insert(&session).await.unwrap();

        let err = h.runner.run_attempt(&session.id).await.unwrap_err();

        assert!(matches!(err, JobError::Provider(_)));
        assert!(err.is_retryable());
        // The provider's own wording survives into the error surface
        assert!(err.to_string().contains("model overloaded"));
        assert_eq!(h.repo.status_of(&session.id), Some(SessionStatus::Processing));
        assert_eq!(h.monitor.error_count(), 1);
        assert_eq!(h.monitor.performance_count(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_retryable() {
        let h = harness(MockAnalysisProvider::new_success());
        let session = DiagnosisSession::new_test("user-1", input());
        h.repo.insert(&session).await.unwrap();
        h.repo.fail_next_attaches(1);

        let err = h.runner.run_attempt(&session.id).await.unwrap_err();
        assert!(matches!(err, JobError::Persistence(_)));
        assert!(err.is_retryable());

        // Next attempt succeeds and completes the session
        let outcome = h.runner.run_attempt(&session.id).await.unwrap();
        assert!(matches!(outcome, AttemptOutcome::Completed(_)));
        assert_eq!(h.repo.status_of(&session.id), Some(SessionStatus::Completed));
    }

    #[tokio::test]
    async fn test_terminal_session_is_left_alone() {
        let h = harness(MockAnalysisProvider::new_success());
        let session = DiagnosisSession::new_test("user-1", input());
        h.repo.insert(&session).await.unwrap();
        h.repo
            .finish(&session.id, SessionStatus::Failed, 9000)
            .await
            .unwrap();

        let outcome = h.runner.run_attempt(&session.id).await.unwrap();

        assert!(matches!(outcome, AttemptOutcome::AlreadyTerminal));
        assert_eq!(h.repo.status_of(&session.id), Some(SessionStatus::Failed));
        assert!(h.repo.find_result(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_provider_response_is_provider_error() {
        let mut response = sample_response();
        response.severity = "apocalyptic".to_string();
        let h = harness(MockAnalysisProvider::new(MockBehavior::Success(response)));
        let session = DiagnosisSession::new_test("user-1", input());
        h.repo.insert(&session).await.unwrap();

        let err = h.runner.run_attempt(&session.id).await.unwrap_err();
        assert!(matches!(
            err,
            JobError::Provider(ProviderError::InvalidResponse(_))
        ));
    }
}
