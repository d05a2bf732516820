// Submit Use Case - create a diagnosis session in PENDING

use crate::domain::{DiagnosisInput, DiagnosisSession, SessionId};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, SessionRepository, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

const MAX_NAME_LEN: usize = 64;
const MAX_SYMPTOM_LEN: usize = 4000;

/// Submission request
#[derive(Debug, Clone, Serialize, Deserialize)]
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

/// Validate a submission request at the API boundary
pub fn validate_request(req: &SubmitRequest) -> Result<()> {
    if req.user_id.trim().is_empty() {
        return Err(AppError::Validation("user_id must not be empty".to_string()));
    }
    if req.user_id.len() > MAX_NAME_LEN {
        return Err(AppError::Validation("user_id is too long".to_string()));
    }
    if req.vehicle_make.trim().is_empty() || req.vehicle_model.trim().is_empty() {
        return Err(AppError::Validation(
            "vehicle make and model must not be empty".to_string(),
        ));
    }
    if req.vehicle_make.len() > MAX_NAME_LEN || req.vehicle_model.len() > MAX_NAME_LEN {
        return Err(AppError::Validation(
            "vehicle make or model is too long".to_string(),
        ));
    }
    if req.symptom_description.trim().is_empty() {
        return Err(AppError::Validation(
            "symptom_description must not be empty".to_string(),
        ));
    }
    if req.symptom_description.len() > MAX_SYMPTOM_LEN {
        return Err(AppError::Validation(
            "symptom_description is too long".to_string(),
        ));
    }
    if let Some(year) = req.vehicle_year {
        if !(1900..=2100).contains(&year) {
            return Err(AppError::Validation(format!(
                "vehicle_year out of range: {}",
                year
            )));
        }
    }
    if let Some(mileage) = req.mileage_km {
        if mileage < 0 {
            return Err(AppError::Validation(format!(
                "mileage_km must not be negative: {}",
                mileage
            )));
        }
    }
    Ok(())
}

/// Execute the submit use case
///
/// Creates the session in PENDING; execution is picked up asynchronously by
/// the worker pool. Fire-and-forget: the caller observes progress by polling.
///
/// # Arguments
///
/// * `session_repo` - Session repository
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `req` - Submission request
pub async fn execute(
    session_repo: &dyn SessionRepository,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: SubmitRequest,
) -> Result<SessionId> {
    validate_request(&req)?;

    let session_id = id_provider.generate_id();
    let created_at = time_provider.now_millis();

    let input = DiagnosisInput {
        vehicle_make: req.vehicle_make,
        vehicle_model: req.vehicle_model,
        vehicle_year: req.vehicle_year,
        mileage_km: req.mileage_km,
        symptom_description: req.symptom_description,
    };

    let session = DiagnosisSession::new(session_id.clone(), created_at, req.user_id, input);
    session_repo.insert(&session).await?;

    info!(
        session_id = %session_id,
        vehicle = %format!("{} {}", session.input.vehicle_make, session.input.vehicle_model),
        "Diagnosis session submitted"
    );

    Ok(session_id)
}
