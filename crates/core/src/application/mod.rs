// Application Layer - Use Cases and Job Orchestration

pub mod diagnosis;
pub mod executor;
pub mod recovery;
pub mod retry;
pub mod runner;
pub mod worker;

// Re-exports
pub use diagnosis::DiagnosisService;
pub use executor::{ExecutionOutcome, JobExecutor, DEFAULT_JOB_TIMEOUT};
pub use recovery::RecoveryService;
pub use retry::{RetryDecision, RetryPolicy};
pub use runner::{AttemptOutcome, DiagnosisJobRunner, JobError};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker};
