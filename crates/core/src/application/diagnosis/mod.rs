// Diagnosis Service - submission and query use cases

pub mod submit;

pub use submit::SubmitRequest;

use crate::domain::{DiagnosisResult, DiagnosisSession, SessionId, SessionStatus};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, SessionRepository, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-status session counts for the stats surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Diagnosis Service - the submission/polling facade over the session store
pub struct DiagnosisService {
    session_repo: Arc<dyn SessionRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl DiagnosisService {
    pub fn new(
        session_repo: Arc<dyn SessionRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            session_repo,
            id_provider,
            time_provider,
        }
    }

    /// Submit a new diagnosis request (fire-and-forget)
    pub async fn submit(&self, req: SubmitRequest) -> Result<SessionId> {
        submit::execute(
            self.session_repo.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await
    }

    /// Fetch a session for status polling
    pub async fn session(&self, session_id: &SessionId) -> Result<DiagnosisSession> {
        self.session_repo
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))
    }

    /// Fetch the result of a completed session
    pub async fn result(&self, session_id: &SessionId) -> Result<DiagnosisResult> {
        // Distinguish "no such session" from "not finished yet"
        let session = self.session(session_id).await?;
        self.session_repo
            .find_result(session_id)
            .await?
            .ok_or_else(|| match session.status {
                SessionStatus::Failed => AppError::InvalidState(format!(
                    "Session {} failed: {}",
                    session_id,
                    session.last_error.unwrap_or_else(|| "unknown error".to_string())
                )),
                _ => AppError::InvalidState(format!(
                    "Session {} is {} and has no result yet",
                    session_id, session.status
                )),
            })
    }

    /// Session counts by status
    pub async fn stats(&self) -> Result<QueueStats> {
        Ok(QueueStats {
            pending: self
                .session_repo
                .count_by_status(SessionStatus::Pending)
                .await?,
            processing: self
                .session_repo
                .count_by_status(SessionStatus::Processing)
                .await?,
            completed: self
                .session_repo
                .count_by_status(SessionStatus::Completed)
                .await?,
            failed: self
                .session_repo
                .count_by_status(SessionStatus::Failed)
                .await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::session_repository::mocks::InMemorySessionRepository;
    use crate::port::time_provider::mocks::MockTimeProvider;

    fn service() -> (Arc<InMemorySessionRepository>, DiagnosisService) {
        let repo = Arc::new(InMemorySessionRepository::new());
        let service = DiagnosisService::new(
            repo.clone(),
            Arc::new(SequentialIdProvider::new()),
            Arc::new(MockTimeProvider::new(1000)),
        );
        (repo, service)
    }

    fn request() -> SubmitRequest {
        SubmitRequest {
            user_id: "user-1".to_string(),
            vehicle_make: "Ford".to_string(),
            vehicle_model: "Focus".to_string(),
            vehicle_year: Some(2018),
            mileage_km: None,
            symptom_description: "rattling from the rear".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_creates_pending_session() {
        let (repo, service) = service();

        let session_id = service.submit(request()).await.unwrap();
        assert_eq!(session_id, "sess-1");

        let session = service.session(&session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.created_at, 1000);
        assert_eq!(repo.status_of(&session_id), Some(SessionStatus::Pending));
    }

    #[tokio::test]
    async fn test_result_before_completion_is_invalid_state() {
        let (_repo, service) = service();
        let session_id = service.submit(request()).await.unwrap();

        let err = service.result(&session_id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (_repo, service) = service();
        let err = service.session(&"sess-404".to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let (repo, service) = service();
        let first = service.submit(request()).await.unwrap();
        let _second = service.submit(request()).await.unwrap();
        repo.finish(&first, SessionStatus::Failed, 2000)
            .await
            .unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
    }
}
