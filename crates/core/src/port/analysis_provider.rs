// AI Analysis Provider Port
// Abstraction over the external text-understanding service that turns a
// vehicle/symptom payload into a structured diagnosis.

use crate::domain::{DiagnosisResult, DiagnosisSession, SessionId, Severity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider errors
///
/// All variants are transient from the retry executor's point of view; the
/// upstream message is preserved verbatim so logs carry the provider's own
/// wording.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Payload sent to the analysis provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub user_id: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_year: Option<i32>,
    pub mileage_km: Option<i64>,
    pub symptom_description: String,
}

impl AnalysisRequest {
    pub fn from_session(session: &DiagnosisSession) -> Self {
        Self {
            user_id: session.user_id.clone(),
            vehicle_make: session.input.vehicle_make.clone(),
            vehicle_model: session.input.vehicle_model.clone(),
            vehicle_year: session.input.vehicle_year,
            mileage_km: session.input.mileage_km,
            symptom_description: session.input.symptom_description.clone(),
        }
    }
}

/// Structured provider response
///
/// Optional fields model what real providers omit; documented defaults are
/// applied when converting into a DiagnosisResult.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub problem_title: String,
    pub problem_description: String,
    pub severity: String,
    pub confidence_score: i64,
    pub likely_causes: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub estimated_costs: serde_json::Value,
    pub ai_insights: String,

    #[serde(default)]
    pub related_issues: Option<Vec<String>>,
    #[serde(default)]
    pub requires_immediate_attention: Option<bool>,
    #[serde(default)]
    pub ai_model_version: Option<String>,
    #[serde(default)]
    pub ai_provider: Option<String>,
}

impl AnalysisResponse {
    /// Validate the response and build the result artifact.
    ///
    /// Defaults when absent: `requires_immediate_attention = false`,
    /// `ai_model_version = "1.0"`, `ai_provider = "unknown"`,
    /// `related_issues = []`.
    pub fn into_result(
        self,
        session_id: SessionId,
        processing_time_ms: i64,
        created_at: i64,
    ) -> Result<DiagnosisResult, ProviderError> {
        let severity = Severity::parse(&self.severity).ok_or_else(|| {
            ProviderError::InvalidResponse(format!("unknown severity: {}", self.severity))
        })?;

        if !(0..=100).contains(&self.confidence_score) {
            return Err(ProviderError::InvalidResponse(format!(
                "confidence_score out of range: {}",
                self.confidence_score
            )));
        }

        if !self.estimated_costs.is_object() {
            return Err(ProviderError::InvalidResponse(format!(
                "estimated_costs must be an object, got: {}",
                self.estimated_costs
            )));
        }

        Ok(DiagnosisResult {
            session_id,
            problem_title: self.problem_title,
            problem_description: self.problem_description,
            severity,
            confidence_score: self.confidence_score as u8,
            likely_causes: self.likely_causes,
            recommended_actions: self.recommended_actions,
            estimated_costs: self.estimated_costs,
            ai_insights: self.ai_insights,
            related_issues: self.related_issues.unwrap_or_default(),
            requires_immediate_attention: self.requires_immediate_attention.unwrap_or(false),
            ai_provider: self
                .ai_provider
                .unwrap_or_else(|| "unknown".to_string()),
            ai_model_version: self
                .ai_model_version
                .unwrap_or_else(|| "1.0".to_string()),
            processing_time_ms,
            created_at,
        })
    }
}

/// Analysis Provider trait
///
/// Implementations:
/// - HttpAnalysisProvider (infra-provider): JSON over HTTPS
/// - MockAnalysisProvider (below): scripted behavior for tests
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Analyze a diagnosis payload and return a structured response
    ///
    /// # Errors
    /// - ProviderError::Unavailable if the service cannot be reached
    /// - ProviderError::RequestFailed if the service rejects the request
    /// - ProviderError::InvalidResponse if the response cannot be decoded
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, ProviderError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock provider behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always return this response
        Success(AnalysisResponse),
        /// Always fail with message
        Fail(String),
        /// Fail the first N calls, then return the response
        FailTimes(usize, AnalysisResponse),
        /// Never answer within any job budget (sleeps for the given duration)
        Hang(Duration),
    }

    /// Mock Analysis Provider for testing
    pub struct MockAnalysisProvider {
        behavior: Arc<Mutex<MockBehavior>>,
        call_count: Arc<Mutex<usize>>,
    }

    impl MockAnalysisProvider {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success(sample_response()))
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl AnalysisProvider for MockAnalysisProvider {
        async fn analyze(
            &self,
            _request: &AnalysisRequest,
        ) -> Result<AnalysisResponse, ProviderError> {
            let calls = {
                let mut count = self.call_count.lock().unwrap();
                *count += 1;
                *count
            };

            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Success(response) => Ok(response),
                MockBehavior::Fail(msg) => Err(ProviderError::RequestFailed(msg)),
                MockBehavior::FailTimes(n, response) => {
                    if calls <= n {
                        Err(ProviderError::RequestFailed(format!(
                            "simulated failure {} of {}",
                            calls, n
                        )))
                    } else {
                        Ok(response)
                    }
                }
                MockBehavior::Hang(duration) => {
                    tokio::time::sleep(duration).await;
                    Err(ProviderError::Unavailable("provider hung".to_string()))
                }
            }
        }
    }

    /// The minimal well-formed response used across tests
    pub fn sample_response() -> AnalysisResponse {
        AnalysisResponse {
            problem_title: "Oil leak".to_string(),
            problem_description: "Oil seeping from the valve cover gasket".to_string(),
            severity: "medium".to_string(),
            confidence_score: 85,
            likely_causes: vec!["worn gasket".to_string()],
            recommended_actions: vec!["replace gasket".to_string()],
            estimated_costs: serde_json::json!({}),
            ai_insights: "minor issue".to_string(),
            related_issues: None,
            requires_immediate_attention: None,
            ai_model_version: None,
            ai_provider: None,
        }
    }
}
