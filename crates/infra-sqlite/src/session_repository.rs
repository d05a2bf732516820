// SQLite SessionRepository Implementation

use async_trait::async_trait;
use carwise_core::domain::{
    DiagnosisInput, DiagnosisResult, DiagnosisSession, SessionId, SessionStatus, Severity,
};
use carwise_core::error::{AppError, Result};
use carwise_core::port::{SessionRepository, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Conflict(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "787" | "3850" => AppError::Database(format!(
                        "Foreign key constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteSessionRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn insert(&self, session: &DiagnosisSession) -> Result<()> {
        let input_json = serde_json::to_string(&session.input)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, user_id, input, status,
                attempts, max_attempts,
                created_at, started_at, finished_at, last_error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&input_json)
        .bind(session.status.to_string())
        .bind(session.attempts)
        .bind(session.max_attempts)
        .bind(session.created_at)
        .bind(session.started_at)
        .bind(session.finished_at)
        .bind(&session.last_error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &SessionId) -> Result<Option<DiagnosisSession>> {
        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|r| r.into_session()).transpose()
    }

    async fn claim_next_pending(&self) -> Result<Option<DiagnosisSession>> {
        // Single UPDATE ... RETURNING keeps the claim atomic across the
        // worker pool: only one worker can move a given row out of PENDING.
        let now = self.time_provider.now_millis();

        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE sessions
            SET status = 'PROCESSING', started_at = ?
            WHERE id = (
                SELECT id FROM sessions
                WHERE status = 'PENDING'
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|r| r.into_session()).transpose()
    }

    async fn mark_processing(&self, id: &SessionId, started_at: i64) -> Result<bool> {
        // Conditional update: terminal rows are never touched. COALESCE keeps
        // the original claim time on re-entrant retries.
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'PROCESSING', started_at = COALESCE(started_at, ?)
            WHERE id = ? AND status IN ('PENDING', 'PROCESSING')
            "#,
        )
        .bind(started_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<String> = sqlx::query_scalar("SELECT status FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match exists {
            None => Err(AppError::NotFound(format!("Session {} not found", id))),
            Some(_) => Ok(false), // already terminal
        }
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

        // CAS-style guard: only write the terminal status if the row is
        // still non-terminal, so stale/duplicate job deliveries cannot
        // resurrect or flip a finished session.
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = ?, finished_at = ?
            WHERE id = ?
              AND status NOT IN ('COMPLETED', 'FAILED')
            "#,
        )
        .bind(status.to_string())
        .bind(finished_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<String> = sqlx::query_scalar("SELECT status FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match exists {
            None => Err(AppError::NotFound(format!("Session {} not found", id))),
            Some(_) => Ok(false),
        }
    }

    async fn increment_attempts(&self, id: &SessionId, last_error: Option<&str>) -> Result<()> {
        // Atomic increment without reading the row first
        sqlx::query(
            r#"
            UPDATE sessions
            SET attempts = attempts + 1, last_error = COALESCE(?, last_error)
            WHERE id = ?
            "#,
        )
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn attach_result(&self, result: &DiagnosisResult) -> Result<()> {
        let likely_causes = serde_json::to_string(&result.likely_causes)?;
        let recommended_actions = serde_json::to_string(&result.recommended_actions)?;
        let estimated_costs = serde_json::to_string(&result.estimated_costs)?;
        let related_issues = serde_json::to_string(&result.related_issues)?;

        // At most one result per session; a duplicate attach from a retried
        // attempt is a no-op, never an overwrite.
        sqlx::query(
            r#"
            INSERT INTO results (
                session_id, problem_title, problem_description, severity,
                confidence_score, likely_causes, recommended_actions,
                estimated_costs, ai_insights, related_issues,
                requires_immediate_attention, ai_provider, ai_model_version,
                processing_time_ms, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO NOTHING
            "#,
        )
        .bind(&result.session_id)
        .bind(&result.problem_title)
        .bind(&result.problem_description)
        .bind(result.severity.to_string())
        .bind(result.confidence_score as i32)
        .bind(&likely_causes)
        .bind(&recommended_actions)
        .bind(&estimated_costs)
        .bind(&result.ai_insights)
        .bind(&related_issues)
        .bind(if result.requires_immediate_attention { 1 } else { 0 })
        .bind(&result.ai_provider)
        .bind(&result.ai_model_version)
        .bind(result.processing_time_ms)
        .bind(result.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_result(&self, id: &SessionId) -> Result<Option<DiagnosisResult>> {
        let row = sqlx::query_as::<_, ResultRow>("SELECT * FROM results WHERE session_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|r| r.into_result()).transpose()
    }

    async fn find_by_status(&self, status: SessionStatus) -> Result<Vec<DiagnosisSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT * FROM sessions
            WHERE status = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(|row| row.into_session()).collect()
    }

    async fn count_by_status(&self, status: SessionStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE status = ?")
            .bind(status.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

/// SQLite row representation of a session
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    input: String,
    status: String,
    attempts: i32,
    max_attempts: i32,
    created_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    last_error: Option<String>,
}

impl SessionRow {
    fn into_session(self) -> Result<DiagnosisSession> {
        let status = SessionStatus::parse(&self.status).ok_or_else(|| {
            AppError::Database(format!("invalid session status in row: {}", self.status))
        })?;

        let input: DiagnosisInput = serde_json::from_str(&self.input)?;

        Ok(DiagnosisSession {
            id: self.id,
            user_id: self.user_id,
            input,
            status,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            last_error: self.last_error,
        })
    }
}

/// SQLite row representation of a result artifact
#[derive(Debug, sqlx::FromRow)]
struct ResultRow {
    session_id: String,
    problem_title: String,
    problem_description: String,
    severity: String,
    confidence_score: i32,
    likely_causes: String,
    recommended_actions: String,
    estimated_costs: String,
    ai_insights: String,
    related_issues: String,
    requires_immediate_attention: i32,
    ai_provider: String,
    ai_model_version: String,
    processing_time_ms: i64,
    created_at: i64,
}

impl ResultRow {
    fn into_result(self) -> Result<DiagnosisResult> {
        let severity = Severity::parse(&self.severity).ok_or_else(|| {
            AppError::Database(format!("invalid severity in row: {}", self.severity))
        })?;

        Ok(DiagnosisResult {
            session_id: self.session_id,
            problem_title: self.problem_title,
            problem_description: self.problem_description,
            severity,
            confidence_score: self.confidence_score as u8,
            likely_causes: serde_json::from_str(&self.likely_causes)?,
            recommended_actions: serde_json::from_str(&self.recommended_actions)?,
            estimated_costs: serde_json::from_str(&self.estimated_costs)?,
            ai_insights: self.ai_insights,
            related_issues: serde_json::from_str(&self.related_issues)?,
            requires_immediate_attention: self.requires_immediate_attention != 0,
            ai_provider: self.ai_provider,
            ai_model_version: self.ai_model_version,
            processing_time_ms: self.processing_time_ms,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use carwise_core::port::time_provider::SystemTimeProvider;

    async fn setup_repo() -> SqliteSessionRepository {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteSessionRepository::new(pool, Arc::new(SystemTimeProvider))
    }

    fn input() -> DiagnosisInput {
        DiagnosisInput {
            vehicle_make: "Toyota".to_string(),
            vehicle_model: "Corolla".to_string(),
            vehicle_year: Some(2016),
            mileage_km: Some(120_000),
            symptom_description: "oil spots under the engine".to_string(),
        }
    }

    fn sample_result(session_id: &str) -> DiagnosisResult {
        DiagnosisResult {
            session_id: session_id.to_string(),
            problem_title: "Oil leak".to_string(),
            problem_description: "Oil seeping from the valve cover".to_string(),
            severity: Severity::Medium,
            confidence_score: 85,
            likely_causes: vec!["worn gasket".to_string()],
            recommended_actions: vec!["replace gasket".to_string()],
            estimated_costs: serde_json::json!({"parts": 50, "labor": 100}),
            ai_insights: "minor issue".to_string(),
            related_issues: vec![],
            requires_immediate_attention: false,
            ai_provider: "unknown".to_string(),
            ai_model_version: "1.0".to_string(),
            processing_time_ms: 1200,
            created_at: 5000,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = setup_repo().await;

        let session = DiagnosisSession::new_test("user-1", input());
        repo.insert(&session).await.unwrap();

        let found = repo.find_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.id, session.id);
        assert_eq!(found.status, SessionStatus::Pending);
        assert_eq!(found.input.vehicle_make, "Toyota");
        assert_eq!(found.input.mileage_km, Some(120_000));
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_conflict() {
        let repo = setup_repo().await;
        let session = DiagnosisSession::new_test("user-1", input());
        repo.insert(&session).await.unwrap();

        let err = repo.insert(&session).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_claim_next_pending_is_fifo() {
        let repo = setup_repo().await;

        let first = DiagnosisSession::new_test("user-1", input());
        let second = DiagnosisSession::new_test("user-1", input());
        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();

        let claimed = repo.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, SessionStatus::Processing);
        assert!(claimed.started_at.is_some());

        let claimed = repo.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, second.id);

        assert!(repo.claim_next_pending().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finish_guards_terminal_rows() {
        let repo = setup_repo().await;
        let session = DiagnosisSession::new_test("user-1", input());
        repo.insert(&session).await.unwrap();

        assert!(repo
            .finish(&session.id, SessionStatus::Completed, 5000)
            .await
            .unwrap());

        // A stale failure must not overwrite COMPLETED
        assert!(!repo
            .finish(&session.id, SessionStatus::Failed, 6000)
            .await
            .unwrap());

        let found = repo.find_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.status, SessionStatus::Completed);
        assert_eq!(found.finished_at, Some(5000));
    }

    #[tokio::test]
    async fn test_finish_unknown_session_is_not_found() {
        let repo = setup_repo().await;
        let err = repo
            .finish(&"sess-ghost".to_string(), SessionStatus::Failed, 5000)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_processing_keeps_first_claim_time() {
        let repo = setup_repo().await;
        let session = DiagnosisSession::new_test("user-1", input());
        repo.insert(&session).await.unwrap();

        assert!(repo.mark_processing(&session.id, 4000).await.unwrap());
        // Re-entrant on retry: status stays PROCESSING, started_at untouched
        assert!(repo.mark_processing(&session.id, 9000).await.unwrap());

        let found = repo.find_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.status, SessionStatus::Processing);
        assert_eq!(found.started_at, Some(4000));
    }

    #[tokio::test]
    async fn test_attach_result_round_trips_nested_costs() {
        let repo = setup_repo().await;
        let session = DiagnosisSession::new_test("user-1", input());
        repo.insert(&session).await.unwrap();

        repo.attach_result(&sample_result(&session.id)).await.unwrap();

        let found = repo.find_result(&session.id).await.unwrap().unwrap();
        assert_eq!(
            found.estimated_costs,
            serde_json::json!({"parts": 50, "labor": 100})
        );
        assert_eq!(found.severity, Severity::Medium);
        assert_eq!(found.likely_causes, vec!["worn gasket".to_string()]);
    }

    #[tokio::test]
    async fn test_attach_result_is_idempotent() {
        let repo = setup_repo().await;
        let session = DiagnosisSession::new_test("user-1", input());
        repo.insert(&session).await.unwrap();

        repo.attach_result(&sample_result(&session.id)).await.unwrap();

        // A retried attach must not overwrite the artifact
        let mut second = sample_result(&session.id);
        second.problem_title = "Different title".to_string();
        repo.attach_result(&second).await.unwrap();

        let found = repo.find_result(&session.id).await.unwrap().unwrap();
        assert_eq!(found.problem_title, "Oil leak");
    }

    #[tokio::test]
    async fn test_increment_attempts_records_last_error() {
        let repo = setup_repo().await;
        let session = DiagnosisSession::new_test("user-1", input());
        repo.insert(&session).await.unwrap();

        repo.increment_attempts(&session.id, Some("provider unreachable"))
            .await
            .unwrap();
        repo.increment_attempts(&session.id, None).await.unwrap();

        let found = repo.find_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.attempts, 2);
        assert_eq!(found.last_error.as_deref(), Some("provider unreachable"));
    }

    #[tokio::test]
    async fn test_count_and_find_by_status() {
        let repo = setup_repo().await;

        let first = DiagnosisSession::new_test("user-1", input());
        let second = DiagnosisSession::new_test("user-2", input());
        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();
        repo.finish(&second.id, SessionStatus::Failed, 5000)
            .await
            .unwrap();

        assert_eq!(
            repo.count_by_status(SessionStatus::Pending).await.unwrap(),
            1
        );
        assert_eq!(
            repo.count_by_status(SessionStatus::Failed).await.unwrap(),
            1
        );

        let failed = repo.find_by_status(SessionStatus::Failed).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, second.id);
    }
}
