// Worker - session claim and execution loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::executor::{ExecutionOutcome, JobExecutor};
use crate::error::Result;
use crate::port::SessionRepository;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info};

/// Worker claims PENDING sessions and runs them to a terminal outcome
///
/// Each worker processes one session to completion before claiming the next;
/// there is no intra-job concurrency. The atomic claim in the repository is
/// the pool's only competition point.
pub struct Worker {
    name: String,
    session_repo: Arc<dyn SessionRepository>,
    executor: Arc<JobExecutor>,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        session_repo: Arc<dyn SessionRepository>,
        executor: Arc<JobExecutor>,
    ) -> Self {
        Self {
            name: name.into(),
            session_repo,
            executor,
        }
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!("Worker {} started", self.name);
        loop {
            if shutdown.is_shutdown() {
                info!("Worker {} shutting down", self.name);
                break;
            }
            match self.process_next_session().await {
                Ok(processed) => {
                    if !processed {
                        // No session available, sleep briefly (or wait for shutdown)
                        tokio::select! {
                            _ = sleep(IDLE_SLEEP_DURATION) => {},
                            _ = shutdown.wait() => {
                                info!("Worker {} interrupted during idle", self.name);
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("Worker {} error: {}", self.name, e);
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker {} interrupted during error recovery", self.name);
                            break;
                        }
                    }
                }
            }
        }
        info!("Worker {} stopped", self.name);
        Ok(())
    }

    /// Claim and execute the next pending session (returns true if one ran)
    pub async fn process_next_session(&self) -> Result<bool> {
        let session = match self.session_repo.claim_next_pending().await? {
            Some(s) => s,
            None => return Ok(false),
        };

        info!(
            worker = %self.name,
            session_id = %session.id,
            "Processing diagnosis session"
        );

        // Panic isolation: a panicking job must not kill the worker loop,
        // and the terminal failure handler must still run so the session
        // does not stay stuck in PROCESSING.
        let session_id = session.id.clone();
        let executor = Arc::clone(&self.executor);
        let handle = tokio::task::spawn({
            let session_id = session_id.clone();
            async move { executor.execute(&session_id).await }
        });

        match handle.await {
            Ok(outcome) => {
                match outcome {
                    ExecutionOutcome::Completed => {
                        info!(session_id = %session_id, "Session completed");
                    }
                    ExecutionOutcome::AlreadyTerminal => {
                        info!(session_id = %session_id, "Session was already terminal");
                    }
                    ExecutionOutcome::Failed => {
                        info!(session_id = %session_id, "Session failed permanently");
                    }
                }
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    format!("diagnosis job panicked: {}", join_err)
                } else {
                    format!("diagnosis job cancelled: {}", join_err)
                };
                error!(session_id = %session_id, error = %reason, "Job did not run to a verdict");
                self.executor.fail_permanently(&session_id, &reason).await;
            }
        }

        Ok(true)
    }
}
