// Diagnosis Session Domain Model

use serde::{Deserialize, Serialize};

/// Session ID (UUID v4 in production, injected via IdProvider)
pub type SessionId = String;

/// Default attempt budget for a diagnosis job
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Session lifecycle status
///
/// Transitions are one-directional: PENDING -> PROCESSING -> {COMPLETED, FAILED}.
/// COMPLETED and FAILED are terminal and must never be overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    /// Parse from the canonical storage representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(SessionStatus::Pending),
            "PROCESSING" => Some(SessionStatus::Processing),
            "COMPLETED" => Some(SessionStatus::Completed),
            "FAILED" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "PENDING"),
            SessionStatus::Processing => write!(f, "PROCESSING"),
            SessionStatus::Completed => write!(f, "COMPLETED"),
            SessionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Diagnosis request input: vehicle identity plus the reported symptom.
///
/// Stored as a JSON column on the session row and forwarded to the
/// analysis provider verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisInput {
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_year: Option<i32>,
    pub mileage_km: Option<i64>,
    pub symptom_description: String,
}

/// Diagnosis Session Entity
///
/// Created in PENDING by the submission path; mutated only by the job
/// subsystem thereafter. Never deleted by this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisSession {
    pub id: SessionId,
    pub user_id: String,
    pub input: DiagnosisInput,

    pub status: SessionStatus,

    /// Executed attempt count (persisted for observability and recovery)
    pub attempts: i32,
    pub max_attempts: i32,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    /// Most recent attempt error, surfaced to polling clients
    pub last_error: Option<String>,
}

impl DiagnosisSession {
    /// Create a new session in PENDING
    ///
    /// # Arguments
    ///
    /// * `id` - Unique session ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `user_id` - Owning user reference
    /// * `input` - Vehicle + symptom input
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        user_id: impl Into<String>,
        input: DiagnosisInput,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            input,
            status: SessionStatus::Pending,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            created_at,
            started_at: None,
            finished_at: None,
            last_error: None,
        }
    }

    /// Create a test session with deterministic ID and timestamp.
    ///
    /// Uses a simple counter (sess-test-1, sess-test-2, ...); timestamps start
    /// at 1000 and increment by 1000.
    ///
    /// **Note**: tests only. Production code injects ID and time via providers.
    pub fn new_test(user_id: impl Into<String>, input: DiagnosisInput) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let id = format!("sess-test-{}", counter);
        let created_at = (counter * 1000) as i64;

        Self::new(id, created_at, user_id, input)
    }

    /// Transition to PROCESSING with explicit timestamp
    ///
    /// Idempotent: a session already in PROCESSING stays there (re-entrant
    /// on retry). Rejects the transition from a terminal state.
    pub fn begin_processing(
        &mut self,
        now_millis: i64,
    ) -> crate::domain::error::Result<()> {
        match self.status {
            SessionStatus::Pending => {
                self.status = SessionStatus::Processing;
                self.started_at = Some(now_millis);
                Ok(())
            }
            SessionStatus::Processing => Ok(()),
            _ => Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "PROCESSING".to_string(),
            }),
        }
    }

    /// Transition to COMPLETED with explicit timestamp
    pub fn complete(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.status != SessionStatus::Processing {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "COMPLETED".to_string(),
            });
        }
        self.status = SessionStatus::Completed;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// Transition to FAILED with explicit timestamp
    ///
    /// Rejects the transition from a terminal state; the terminal failure
    /// handler tolerates that rejection (already-FAILED is not an error there).
    pub fn fail(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.status.is_terminal() {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "FAILED".to_string(),
            });
        }
        self.status = SessionStatus::Failed;
        self.finished_at = Some(now_millis);
        Ok(())
    }
}
