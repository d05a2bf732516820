// Worker constants (no magic values inline)
use std::time::Duration;

/// Sleep duration when no sessions are pending (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a worker-level error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Wall-clock budget for one whole diagnosis job (300s)
pub const JOB_TIMEOUT: Duration = Duration::from_secs(300);

/// Recovery window for sessions stuck in PROCESSING (5 minutes)
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Default worker pool size
pub const DEFAULT_WORKER_COUNT: usize = 4;
