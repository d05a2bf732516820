//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use carwise_core::domain::{DiagnosisResult, DiagnosisSession};
use serde::{Deserialize, Serialize};

/// diagnosis.submit.v1 - Submit a diagnosis request
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub user_id: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    #[serde(default)]
    pub vehicle_year: Option<i32>,
    #[serde(default)]
    pub mileage_km: Option<i64>,
    pub symptom_description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub session_id: String,
    pub status: String,
}

/// diagnosis.status.v1 - Poll a session's status
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub session_id: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub last_error: Option<String>,
}

impl From<DiagnosisSession> for StatusResponse {
    fn from(session: DiagnosisSession) -> Self {
        Self {
            session_id: session.id,
            status: session.status.to_string(),
            attempts: session.attempts,
            max_attempts: session.max_attempts,
            created_at: session.created_at,
            started_at: session.started_at,
            finished_at: session.finished_at,
            last_error: session.last_error,
        }
    }
}

/// diagnosis.result.v1 - Fetch the result of a completed session
#[derive(Debug, Deserialize)]
pub struct ResultRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultResponse {
    pub session_id: String,
    pub problem_title: String,
    pub problem_description: String,
    pub severity: String,
    pub confidence_score: u8,
    pub likely_causes: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub estimated_costs: serde_json::Value,
    pub ai_insights: String,
    pub related_issues: Vec<String>,
    pub requires_immediate_attention: bool,
    pub ai_provider: String,
    pub ai_model_version: String,
    pub processing_time_ms: i64,
}

impl From<DiagnosisResult> for ResultResponse {
    fn from(result: DiagnosisResult) -> Self {
        Self {
            session_id: result.session_id,
            problem_title: result.problem_title,
            problem_description: result.problem_description,
            severity: result.severity.to_string(),
            confidence_score: result.confidence_score,
            likely_causes: result.likely_causes,
            recommended_actions: result.recommended_actions,
            estimated_costs: result.estimated_costs,
            ai_insights: result.ai_insights,
            related_issues: result.related_issues,
            requires_immediate_attention: result.requires_immediate_attention,
            ai_provider: result.ai_provider,
            ai_model_version: result.ai_model_version,
            processing_time_ms: result.processing_time_ms,
        }
    }
}

/// admin.stats.v1 - Get system statistics
#[derive(Debug, Deserialize)]
pub struct StatsRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub pending_sessions: i64,
    pub processing_sessions: i64,
    pub completed_sessions: i64,
    pub failed_sessions: i64,
    pub uptime_seconds: i64,
}
