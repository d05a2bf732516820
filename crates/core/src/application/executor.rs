// Job Executor - retry loop, whole-job timeout, terminal failure handling
//
// The runner executes single attempts; this executor owns everything around
// them: the attempt budget, the backoff sleeps, the 300-second wall-clock
// budget for the whole job, and the terminal failure handler that guarantees
// no session is left stuck in PROCESSING once the job subsystem gives up.

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::application::runner::{AttemptOutcome, DiagnosisJobRunner, JobError};
use crate::domain::{SessionId, SessionStatus};
use crate::port::{MonitoringSink, SessionRepository, TimeProvider};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Wall-clock budget for one whole job (all attempts and backoff sleeps)
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(300);

/// Final outcome of a job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    /// The session was already terminal when the job ran (stale delivery)
    AlreadyTerminal,
    Failed,
}

pub struct JobExecutor {
    runner: DiagnosisJobRunner,
    session_repo: Arc<dyn SessionRepository>,
    monitor: Arc<dyn MonitoringSink>,
    time_provider: Arc<dyn TimeProvider>,
    retry_policy: RetryPolicy,
    job_timeout: Duration,
}

impl JobExecutor {
    pub fn new(
        runner: DiagnosisJobRunner,
        session_repo: Arc<dyn SessionRepository>,
        monitor: Arc<dyn MonitoringSink>,
        time_provider: Arc<dyn TimeProvider>,
        retry_policy: RetryPolicy,
        job_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            session_repo,
            monitor,
            time_provider,
            retry_policy,
            job_timeout,
        }
    }

    /// Execute the diagnosis job for a session to a final outcome
    ///
    /// Never returns an error: any terminal failure has already been handled
    /// (session driven to FAILED, failure logged) by the time this returns.
    pub async fn execute(&self, session_id: &SessionId) -> ExecutionOutcome {
        let attempts = AtomicI32::new(0);

        match timeout(self.job_timeout, self.attempt_loop(session_id, &attempts)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                self.handle_terminal_failure(
                    session_id,
                    &err.to_string(),
                    attempts.load(Ordering::SeqCst),
                )
                .await;
                ExecutionOutcome::Failed
            }
            Err(_elapsed) => {
                let err = JobError::Timeout(self.job_timeout.as_millis() as i64);
                self.handle_terminal_failure(
                    session_id,
                    &err.to_string(),
                    attempts.load(Ordering::SeqCst),
                )
                .await;
                ExecutionOutcome::Failed
            }
        }
    }

    /// Drive a session to FAILED without running any attempt
    ///
    /// Used when the job itself could not run to a verdict (worker panic,
    /// cancelled join). Attempt count is taken from the session row.
    pub async fn fail_permanently(&self, session_id: &SessionId, reason: &str) {
        let attempts = match self.session_repo.find_by_id(session_id).await {
            Ok(Some(session)) => session.attempts,
            _ => 0,
        };
        self.handle_terminal_failure(session_id, reason, attempts).await;
    }

    async fn attempt_loop(
        &self,
        session_id: &SessionId,
        attempts: &AtomicI32,
    ) -> Result<ExecutionOutcome, JobError> {
        loop {
            let attempt_no = attempts.fetch_add(1, Ordering::SeqCst) + 1;

            match self.runner.run_attempt(session_id).await {
                Ok(AttemptOutcome::Completed(_)) => {
                    self.record_attempt(session_id, None).await;
                    return Ok(ExecutionOutcome::Completed);
                }
                Ok(AttemptOutcome::AlreadyTerminal) => {
                    return Ok(ExecutionOutcome::AlreadyTerminal);
                }
                Err(err) => {
                    self.record_attempt(session_id, Some(&err)).await;

                    if !err.is_retryable() {
                        warn!(
                            session_id = %session_id,
                            error = %err,
                            "Non-retryable error, giving up"
                        );
                        return Err(err);
                    }

                    match self.retry_policy.decide(attempt_no) {
                        RetryDecision::Retry(delay_ms) => {
                            info!(
                                session_id = %session_id,
                                attempt = %attempt_no,
                                delay_ms = %delay_ms,
                                error = %err,
                                "Retrying diagnosis after failure"
                            );
                            sleep(Duration::from_millis(delay_ms as u64)).await;
                        }
                        RetryDecision::GiveUp => return Err(err),
                    }
                }
            }
        }
    }

    /// Best-effort attempt bookkeeping on the session row
    async fn record_attempt(&self, session_id: &SessionId, err: Option<&JobError>) {
        let last_error = err.map(|e| e.to_string());
        if let Err(update_err) = self
            .session_repo
            .increment_attempts(session_id, last_error.as_deref())
            .await
        {
            warn!(
                session_id = %session_id,
                error = %update_err,
                "Failed to record attempt count"
            );
        }
    }

    /// Terminal failure handler: the last line of defense.
    ///
    /// Runs once per given-up job. Idempotently drives the session to FAILED
    /// (tolerating already-FAILED and missing rows) and emits the structured
    /// failure log. Never propagates its own errors.
    async fn handle_terminal_failure(&self, session_id: &SessionId, error_msg: &str, attempts: i32) {
        let now = self.time_provider.now_millis();

        match self
            .session_repo
            .finish(session_id, SessionStatus::Failed, now)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    session_id = %session_id,
                    "Session already terminal, failure write skipped"
                );
            }
            Err(e) => {
                error!(
                    session_id = %session_id,
                    error = %e,
                    "Could not mark session FAILED in terminal failure handler"
                );
            }
        }

        let attempts_str = attempts.to_string();
        self.monitor.log_error(
            error_msg,
            &[
                ("session_id", session_id.as_str()),
                ("attempts", attempts_str.as_str()),
                ("terminal", "true"),
            ],
        );

        error!(
            session_id = %session_id,
            attempts = %attempts,
            error = %error_msg,
            "Diagnosis job failed permanently"
        );
    }
}
