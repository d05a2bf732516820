// Session Repository Port (Interface)

use crate::domain::{DiagnosisResult, DiagnosisSession, SessionId, SessionStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for session and result persistence
///
/// Terminal statuses are protected at this boundary: `mark_processing` and
/// `finish` are conditional writes that return `Ok(false)` instead of
/// overwriting a COMPLETED/FAILED row, so stale or duplicate job deliveries
/// cannot resurrect a terminal session.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session (PENDING)
    async fn insert(&self, session: &DiagnosisSession) -> Result<()>;

    /// Find session by ID
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<DiagnosisSession>>;

    /// Atomically claim the oldest PENDING session (PENDING -> PROCESSING)
    ///
    /// This is the worker pool's single competition point.
    async fn claim_next_pending(&self) -> Result<Option<DiagnosisSession>>;

    /// Guarded idempotent transition to PROCESSING
    ///
    /// Returns `Ok(false)` when the row is already terminal. `started_at` is
    /// only written on the first transition.
    async fn mark_processing(&self, id: &SessionId, started_at: i64) -> Result<bool>;

    /// Guarded terminal write (COMPLETED or FAILED)
    ///
    /// Returns `Ok(false)` when the row is already terminal, Err(NotFound)
    /// when no such session exists.
    async fn finish(&self, id: &SessionId, status: SessionStatus, finished_at: i64)
        -> Result<bool>;

    /// Record one executed attempt and its error, if any
    async fn increment_attempts(&self, id: &SessionId, last_error: Option<&str>) -> Result<()>;

    /// Attach the result artifact (at most once per session; idempotent)
    async fn attach_result(&self, result: &DiagnosisResult) -> Result<()>;

    /// Find the result attached to a session
    async fn find_result(&self, id: &SessionId) -> Result<Option<DiagnosisResult>>;

    /// Find all sessions in a given status (recovery sweep)
    async fn find_by_status(&self, status: SessionStatus) -> Result<Vec<DiagnosisSession>>;

    /// Count sessions by status (stats surface)
    async fn count_by_status(&self, status: SessionStatus) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory repository with optional write-failure injection
    pub struct InMemorySessionRepository {
        sessions: Arc<Mutex<HashMap<SessionId, DiagnosisSession>>>,
        results: Arc<Mutex<HashMap<SessionId, DiagnosisResult>>>,
        attach_failures: Arc<Mutex<usize>>,
    }

    impl InMemorySessionRepository {
        pub fn new() -> Self {
            Self {
                sessions: Arc::new(Mutex::new(HashMap::new())),
                results: Arc::new(Mutex::new(HashMap::new())),
                attach_failures: Arc::new(Mutex::new(0)),
            }
        }

        /// Make the next `n` attach_result calls fail with a Database error
        pub fn fail_next_attaches(&self, n: usize) {
            *self.attach_failures.lock().unwrap() = n;
        }

        /// Direct state peek for assertions
        pub fn status_of(&self, id: &str) -> Option<SessionStatus> {
            self.sessions.lock().unwrap().get(id).map(|s| s.status)
        }
    }

    impl Default for InMemorySessionRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl SessionRepository for InMemorySessionRepository {
        async fn insert(&self, session: &DiagnosisSession) -> Result<()> {
            let mut sessions = self.sessions.lock().unwrap();
            if sessions.contains_key(&session.id) {
                return Err(AppError::Conflict(format!(
                    "Session {} already exists",
                    session.id
                )));
            }
            sessions.insert(session.id.clone(), session.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &SessionId) -> Result<Option<DiagnosisSession>> {
            Ok(self.sessions.lock().unwrap().get(id).cloned())
        }

        async fn claim_next_pending(&self) -> Result<Option<DiagnosisSession>> {
            let mut sessions = self.sessions.lock().unwrap();
            let next_id = sessions
                .values()
                .filter(|s| s.status == SessionStatus::Pending)
                .min_by_key(|s| (s.created_at, s.id.clone()))
                .map(|s| s.id.clone());

            match next_id {
                Some(id) => {
                    let session = sessions.get_mut(&id).unwrap();
                    let started_at = session.created_at + 1;
                    session.begin_processing(started_at).map_err(AppError::Domain)?;
                    Ok(Some(session.clone()))
                }
                None => Ok(None),
            }
        }

        async fn mark_processing(&self, id: &SessionId, started_at: i64) -> Result<bool> {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))?;
            if session.status.is_terminal() {
                return Ok(false);
            }
            session
                .begin_processing(started_at)
                .map_err(AppError::Domain)?;
            Ok(true)
        }

        async fn finish(
            &self,
            id: &SessionId,
            status: SessionStatus,
            finished_at: i64,
        ) -> Result<bool> {
            if !status.is_terminal() {
                return Err(AppError::Validation(format!(
                    "finish() requires a terminal status, got {}",
                    status
                )));
            }
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))?;
            if session.status.is_terminal() {
                return Ok(false);
            }
            session.status = status;
            session.finished_at = Some(finished_at);
            Ok(true)
        }

        async fn increment_attempts(
            &self,
            id: &SessionId,
            last_error: Option<&str>,
        ) -> Result<()> {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))?;
            session.attempts += 1;
            if let Some(err) = last_error {
                session.last_error = Some(err.to_string());
            }
            Ok(())
        }

        async fn attach_result(&self, result: &DiagnosisResult) -> Result<()> {
            {
                let mut failures = self.attach_failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(AppError::Database("injected attach failure".to_string()));
                }
            }
            let mut results = self.results.lock().unwrap();
            // At-most-once: a duplicate attach is a no-op, never an overwrite
            results
                .entry(result.session_id.clone())
                .or_insert_with(|| result.clone());
            Ok(())
        }

        async fn find_result(&self, id: &SessionId) -> Result<Option<DiagnosisResult>> {
            Ok(self.results.lock().unwrap().get(id).cloned())
        }

        async fn find_by_status(&self, status: SessionStatus) -> Result<Vec<DiagnosisSession>> {
            let mut found: Vec<DiagnosisSession> = self
                .sessions
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.status == status)
                .cloned()
                .collect();
            found.sort_by_key(|s| s.created_at);
            Ok(found)
        }

        async fn count_by_status(&self, status: SessionStatus) -> Result<i64> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.status == status)
                .count() as i64)
        }
    }

}
