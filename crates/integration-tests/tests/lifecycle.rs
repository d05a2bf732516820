//! End-to-end lifecycle tests: real SQLite store, mock analysis provider.

use std::sync::Arc;
use std::time::Duration;

use carwise_core::application::diagnosis::{DiagnosisService, SubmitRequest};
use carwise_core::application::executor::{ExecutionOutcome, JobExecutor, DEFAULT_JOB_TIMEOUT};
use carwise_core::application::retry::RetryPolicy;
use carwise_core::application::runner::DiagnosisJobRunner;
use carwise_core::application::worker::Worker;
use carwise_core::domain::SessionStatus;
use carwise_core::port::analysis_provider::mocks::{
    sample_response, MockAnalysisProvider, MockBehavior,
};
use carwise_core::port::monitoring::mocks::RecordingMonitor;
use carwise_core::port::time_provider::SystemTimeProvider;
use carwise_core::port::SessionRepository;
use carwise_core::port::{id_provider::mocks::SequentialIdProvider, TimeProvider};
use carwise_infra_sqlite::{create_pool, run_migrations, SqliteSessionRepository};

struct TestEngine {
    repo: Arc<SqliteSessionRepository>,
    provider: Arc<MockAnalysisProvider>,
    monitor: Arc<RecordingMonitor>,
    service: DiagnosisService,
    executor: Arc<JobExecutor>,
}

/// Fast retry schedule so integration tests do not sleep for minutes;
/// the exact 30s/60s production schedule is asserted in the executor's
/// paused-clock unit tests.
fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(3, vec![20, 40])
}

async fn engine(behavior: MockBehavior) -> TestEngine {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let repo = Arc::new(SqliteSessionRepository::new(
        pool,
        time_provider.clone(),
    ));
    let provider = Arc::new(MockAnalysisProvider::new(behavior));
    let monitor = Arc::new(RecordingMonitor::new());

    let service = DiagnosisService::new(
        repo.clone(),
        Arc::new(SequentialIdProvider::new()),
        time_provider.clone(),
    );

    let runner = DiagnosisJobRunner::new(
        repo.clone(),
        provider.clone(),
        monitor.clone(),
        time_provider.clone(),
    );
    let executor = Arc::new(JobExecutor::new(
        runner,
        repo.clone(),
        monitor.clone(),
        time_provider,
        fast_policy(),
        DEFAULT_JOB_TIMEOUT,
    ));

    TestEngine {
        repo,
        provider,
        monitor,
        service,
        executor,
    }
}

fn submit_request() -> SubmitRequest {
    SubmitRequest {
        user_id: "user-1".to_string(),
        vehicle_make: "Toyota".to_string(),
        vehicle_model: "Corolla".to_string(),
        vehicle_year: Some(2016),
        mileage_km: Some(120_000),
        symptom_description: "oil spots under the engine".to_string(),
    }
}

#[tokio::test]
async fn test_submit_to_completed_lifecycle() {
    let engine = engine(MockBehavior::Success(sample_response())).await;

    let session_id = engine.service.submit(submit_request()).await.unwrap();
    let session = engine.service.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Pending);

    let worker = Worker::new("worker-0", engine.repo.clone(), engine.executor.clone());
    assert!(worker.process_next_session().await.unwrap());

    // Concrete scenario: defaults filled, session completed, result attached
    let session = engine.service.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.finished_at.is_some());

    let result = engine.service.result(&session_id).await.unwrap();
    assert_eq!(result.problem_title, "Oil leak");
    assert_eq!(result.confidence_score, 85);
    assert_eq!(result.ai_provider, "unknown");
    assert_eq!(result.ai_model_version, "1.0");
    assert!(!result.requires_immediate_attention);

    assert_eq!(engine.monitor.performance_count(), 1);
    assert_eq!(engine.monitor.error_count(), 0);
}

#[tokio::test]
async fn test_provider_fails_twice_then_succeeds() {
    let engine = engine(MockBehavior::FailTimes(2, sample_response())).await;

    let session_id = engine.service.submit(submit_request()).await.unwrap();
    let outcome = engine.executor.execute(&session_id).await;

    assert_eq!(outcome, ExecutionOutcome::Completed);
    assert_eq!(engine.provider.call_count(), 3);

    let session = engine.service.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.attempts, 3);
    assert!(engine.service.result(&session_id).await.is_ok());
}

#[tokio::test]
async fn test_provider_fails_all_attempts() {
    let engine = engine(MockBehavior::Fail("model overloaded".to_string())).await;

    let session_id = engine.service.submit(submit_request()).await.unwrap();
    let outcome = engine.executor.execute(&session_id).await;

    assert_eq!(outcome, ExecutionOutcome::Failed);
    assert_eq!(engine.provider.call_count(), 3);

    let session = engine.service.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.attempts, 3);
    assert!(session
        .last_error
        .as_deref()
        .unwrap()
        .contains("model overloaded"));

    // Failed sessions have no result artifact
    assert!(engine.repo.find_result(&session_id).await.unwrap().is_none());
    assert!(engine.service.result(&session_id).await.is_err());

    // Error telemetry fired, success-path performance event did not
    assert!(engine.monitor.error_count() >= 3);
    assert_eq!(engine.monitor.performance_count(), 0);
}

#[tokio::test]
async fn test_unknown_session_fails_fast_without_provider_call() {
    let engine = engine(MockBehavior::Success(sample_response())).await;

    let outcome = engine.executor.execute(&"sess-ghost".to_string()).await;

    assert_eq!(outcome, ExecutionOutcome::Failed);
    assert_eq!(engine.provider.call_count(), 0);
}

#[tokio::test]
async fn test_terminal_session_survives_duplicate_execution() {
    let engine = engine(MockBehavior::Success(sample_response())).await;

    let session_id = engine.service.submit(submit_request()).await.unwrap();
    assert_eq!(
        engine.executor.execute(&session_id).await,
        ExecutionOutcome::Completed
    );
    let first = engine.service.session(&session_id).await.unwrap();

    // Duplicate/stale delivery of the same job
    assert_eq!(
        engine.executor.execute(&session_id).await,
        ExecutionOutcome::AlreadyTerminal
    );

    let second = engine.service.session(&session_id).await.unwrap();
    assert_eq!(second.status, SessionStatus::Completed);
    assert_eq!(second.finished_at, first.finished_at);
    assert_eq!(engine.provider.call_count(), 1);
}

#[tokio::test]
async fn test_estimated_costs_round_trip() {
    let mut response = sample_response();
    response.estimated_costs = serde_json::json!({"parts": 50, "labor": 100});
    let engine = engine(MockBehavior::Success(response)).await;

    let session_id = engine.service.submit(submit_request()).await.unwrap();
    engine.executor.execute(&session_id).await;

    let result = engine.service.result(&session_id).await.unwrap();
    assert_eq!(
        result.estimated_costs,
        serde_json::json!({"parts": 50, "labor": 100})
    );
}

#[tokio::test]
async fn test_job_timeout_drives_session_to_failed() {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let repo = Arc::new(SqliteSessionRepository::new(pool, time_provider.clone()));
    let provider = Arc::new(MockAnalysisProvider::new(MockBehavior::Hang(
        Duration::from_secs(60),
    )));
    let monitor = Arc::new(RecordingMonitor::new());

    let service = DiagnosisService::new(
        repo.clone(),
        Arc::new(SequentialIdProvider::new()),
        time_provider.clone(),
    );
    let runner = DiagnosisJobRunner::new(
        repo.clone(),
        provider,
        monitor.clone(),
        time_provider.clone(),
    );
    // Tight budget so the test finishes quickly; production uses 300s
    let executor = JobExecutor::new(
        runner,
        repo.clone(),
        monitor,
        time_provider,
        fast_policy(),
        Duration::from_millis(100),
    );

    let session_id = service.submit(submit_request()).await.unwrap();
    let outcome = executor.execute(&session_id).await;

    assert_eq!(outcome, ExecutionOutcome::Failed);
    let session = service.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
}
