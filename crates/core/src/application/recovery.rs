// Crash recovery for sessions stuck in PROCESSING

use crate::domain::SessionStatus;
use crate::port::{SessionRepository, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::worker::constants::DEFAULT_RECOVERY_WINDOW_MS;

/// Startup recovery service
///
/// When the daemon crashes mid-job, sessions can be orphaned in PROCESSING.
/// The status machine is one-directional, so recovery drives them to FAILED
/// through the guarded terminal write rather than re-queueing them: with an
/// external provider call there is no way to know whether side effects
/// already happened.
pub struct RecoveryService {
    session_repo: Arc<dyn SessionRepository>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `session_repo` - Session repository
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Optional custom recovery window (default: 5 minutes)
    pub fn new(
        session_repo: Arc<dyn SessionRepository>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: Option<i64>,
    ) -> Self {
        Self {
            session_repo,
            time_provider,
            recovery_window_ms: recovery_window_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Recover sessions stuck in PROCESSING on daemon startup
    ///
    /// A PROCESSING session is considered stuck when its `started_at` is
    /// older than the recovery window, or inconsistently absent.
    ///
    /// # Returns
    /// Number of sessions driven to FAILED
    pub async fn recover_stuck_sessions(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.recovery_window_ms;

        info!(
            cutoff_time = %cutoff,
            recovery_window_ms = %self.recovery_window_ms,
            "Starting stuck session recovery"
        );

        let processing = self
            .session_repo
            .find_by_status(SessionStatus::Processing)
            .await?;
        let mut recovered_count = 0;

        for session in processing {
            let stuck = match session.started_at {
                Some(started_at) => started_at < cutoff,
                // PROCESSING without started_at is inconsistent
                None => true,
            };
            if !stuck {
                continue;
            }

            warn!(
                session_id = %session.id,
                started_at = ?session.started_at,
                "Recovering stuck session, marking FAILED"
            );

            let moved = self
                .session_repo
                .finish(&session.id, SessionStatus::Failed, now)
                .await?;
            if moved {
                self.session_repo
                    .increment_attempts(&session.id, Some("recovered after daemon restart"))
                    .await?;
                recovered_count += 1;
            }
        }

        info!(recovered_count = %recovered_count, "Stuck session recovery complete");
        Ok(recovered_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DiagnosisInput, DiagnosisSession};
    use crate::port::session_repository::mocks::InMemorySessionRepository;
    use crate::port::time_provider::mocks::MockTimeProvider;

    fn input() -> DiagnosisInput {
        DiagnosisInput {
            vehicle_make: "VW".to_string(),
            vehicle_model: "Golf".to_string(),
            vehicle_year: None,
            mileage_km: None,
            symptom_description: "check engine light".to_string(),
        }
    }

    #[tokio::test]
    async fn test_recovers_only_sessions_outside_window() {
        let repo = Arc::new(InMemorySessionRepository::new());
        let now = 10 * 60 * 1000;
        let time_provider = Arc::new(MockTimeProvider::new(now));

        // Stuck: claimed 6 minutes ago
        let mut stuck = DiagnosisSession::new_test("user-1", input());
        stuck.begin_processing(now - 6 * 60 * 1000).unwrap();
        repo.insert(&stuck).await.unwrap();

        // Fresh: claimed 1 minute ago
        let mut fresh = DiagnosisSession::new_test("user-1", input());
        fresh.begin_processing(now - 60 * 1000).unwrap();
        repo.insert(&fresh).await.unwrap();

        let recovery = RecoveryService::new(repo.clone(), time_provider, None);
        let recovered = recovery.recover_stuck_sessions().await.unwrap();

        assert_eq!(recovered, 1);
        assert_eq!(repo.status_of(&stuck.id), Some(SessionStatus::Failed));
        assert_eq!(repo.status_of(&fresh.id), Some(SessionStatus::Processing));
    }

    #[tokio::test]
    async fn test_recovery_ignores_pending_and_terminal() {
        let repo = Arc::new(InMemorySessionRepository::new());
        let time_provider = Arc::new(MockTimeProvider::new(10 * 60 * 1000));

        let pending = DiagnosisSession::new_test("user-1", input());
        repo.insert(&pending).await.unwrap();

        let done = DiagnosisSession::new_test("user-1", input());
        repo.insert(&done).await.unwrap();
        repo.finish(&done.id, SessionStatus::Completed, 5000)
            .await
            .unwrap();

        let recovery = RecoveryService::new(repo.clone(), time_provider, None);
        let recovered = recovery.recover_stuck_sessions().await.unwrap();

        assert_eq!(recovered, 0);
        assert_eq!(repo.status_of(&pending.id), Some(SessionStatus::Pending));
        assert_eq!(repo.status_of(&done.id), Some(SessionStatus::Completed));
    }
}
