//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::{code, to_rpc_error};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    ResultRequest, ResultResponse, StatsRequest, StatsResponse, StatusRequest, StatusResponse,
    SubmitRequest, SubmitResponse,
};
use carwise_core::application::diagnosis::{self, DiagnosisService};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: Arc<DiagnosisService>,
    rate_limiter: Arc<RateLimiter>,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(service: Arc<DiagnosisService>) -> Self {
        // Default: 200 burst, 100 req/sec (configurable via env)
        let max_burst: u32 = std::env::var("CARWISE_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200);

        let rate_per_sec: u32 = std::env::var("CARWISE_RATE_LIMIT_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        Self {
            service,
            rate_limiter: Arc::new(RateLimiter::new(max_burst, rate_per_sec)),
            start_time: std::time::Instant::now(),
        }
    }

    /// diagnosis.submit.v1
    pub async fn submit(&self, params: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        if !self.rate_limiter.check() {
            return Err(ErrorObjectOwned::owned(
                code::THROTTLED,
                "Rate limit exceeded. Please slow down.",
                None::<()>,
            ));
        }

        let req = diagnosis::SubmitRequest {
            user_id: params.user_id,
            vehicle_make: params.vehicle_make,
            vehicle_model: params.vehicle_model,
            vehicle_year: params.vehicle_year,
            mileage_km: params.mileage_km,
            symptom_description: params.symptom_description,
        };

        let session_id = self.service.submit(req).await.map_err(to_rpc_error)?;

        Ok(SubmitResponse {
            session_id,
            status: "PENDING".to_string(),
        })
    }

    /// diagnosis.status.v1
    pub async fn status(&self, params: StatusRequest) -> Result<StatusResponse, ErrorObjectOwned> {
        let session = self
            .service
            .session(&params.session_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(session.into())
    }

    /// diagnosis.result.v1
    pub async fn result(&self, params: ResultRequest) -> Result<ResultResponse, ErrorObjectOwned> {
        let result = self
            .service
            .result(&params.session_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(result.into())
    }

    /// admin.stats.v1
    pub async fn stats(&self, _params: StatsRequest) -> Result<StatsResponse, ErrorObjectOwned> {
        let stats = self.service.stats().await.map_err(to_rpc_error)?;

        Ok(StatsResponse {
            pending_sessions: stats.pending,
            processing_sessions: stats.processing,
            completed_sessions: stats.completed,
            failed_sessions: stats.failed,
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }
}
