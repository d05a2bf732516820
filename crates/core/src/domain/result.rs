// Diagnosis Result Domain Model

use crate::domain::session::SessionId;
use serde::{Deserialize, Serialize};

/// Severity classification of a diagnosed problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse from the provider's wire representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Structured output of a successful diagnosis
///
/// Owned 1:1 by a session, created at most once on first successful
/// completion, never mutated afterwards. Exists iff the owning session is
/// COMPLETED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub session_id: SessionId,

    pub problem_title: String,
    pub problem_description: String,
    pub severity: Severity,
    /// 0-100, validated at the provider boundary
    pub confidence_score: u8,

    pub likely_causes: Vec<String>,
    pub recommended_actions: Vec<String>,
    /// Nested JSON object, e.g. {"parts": 50, "labor": 100}
    pub estimated_costs: serde_json::Value,
    pub ai_insights: String,
    pub related_issues: Vec<String>,
    pub requires_immediate_attention: bool,

    pub ai_provider: String,
    pub ai_model_version: String,

    pub processing_time_ms: i64,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_round_trip() {
        for severity in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            assert_eq!(Severity::parse(&severity.to_string()), Some(severity));
        }
        assert_eq!(Severity::parse("catastrophic"), None);
    }

    #[test]
    fn test_result_serialization_keeps_nested_costs() {
        let result = DiagnosisResult {
            session_id: "sess-001".to_string(),
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
        };

        let json = serde_json::to_string(&result).expect("serialize");
        let back: DiagnosisResult = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(back.estimated_costs["parts"], 50);
        assert_eq!(back.estimated_costs["labor"], 100);
        assert_eq!(back.severity, Severity::Medium);
        assert_eq!(back.confidence_score, 85);
    }
}
