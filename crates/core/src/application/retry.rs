// Retry policy for diagnosis job execution

use tracing::{info, warn};

/// Default attempt budget (total executions, not re-tries)
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Fixed backoff schedule between attempts: 30s, 60s, 120s.
/// A deliberate table, not a computed exponential; attempts beyond the
/// table clamp to the last entry.
pub const DEFAULT_DELAY_SCHEDULE_MS: [i64; 3] = [30_000, 60_000, 120_000];

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job after the given backoff delay in ms
    Retry(i64),
    /// Do not retry, the job has failed permanently
    GiveUp,
}

/// Retry policy with a fixed delay schedule
///
/// The job runner itself is retry-agnostic: it executes one attempt and
/// raises a typed error. This policy decides what the executor does next.
pub struct RetryPolicy {
    max_attempts: i32,
    delay_schedule_ms: Vec<i64>,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `max_attempts` - Total attempt budget (must be >= 1)
    /// * `delay_schedule_ms` - Backoff delays between attempts (must be non-empty)
    pub fn new(max_attempts: i32, delay_schedule_ms: Vec<i64>) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be >= 1");
        assert!(
            !delay_schedule_ms.is_empty(),
            "delay schedule must not be empty"
        );
        Self {
            max_attempts,
            delay_schedule_ms,
        }
    }

    pub fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    /// Decide whether another attempt follows `attempts_made` executions
    ///
    /// `attempts_made` is the number of attempts already executed (>= 1).
    pub fn decide(&self, attempts_made: i32) -> RetryDecision {
        if attempts_made >= self.max_attempts {
            warn!(
                attempts = %attempts_made,
                max_attempts = %self.max_attempts,
                "Attempt budget exhausted"
            );
            return RetryDecision::GiveUp;
        }

        let index = ((attempts_made - 1).max(0) as usize).min(self.delay_schedule_ms.len() - 1);
        let delay_ms = self.delay_schedule_ms[index];

        info!(
            attempt = %attempts_made,
            max_attempts = %self.max_attempts,
            delay_ms = %delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_DELAY_SCHEDULE_MS.to_vec())
    }
}
