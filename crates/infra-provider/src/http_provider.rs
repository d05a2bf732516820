// HTTP adapter for the AI analysis provider
//
// Speaks plain JSON over HTTPS: POST {endpoint}/v1/analyze with the
// AnalysisRequest body, expecting an AnalysisResponse body back.

use async_trait::async_trait;
use carwise_core::port::{AnalysisProvider, AnalysisRequest, AnalysisResponse, ProviderError};
use std::time::Duration;
use tracing::{debug, warn};

/// Per-request timeout; the job-level 300s budget is enforced by the
/// executor, this only bounds one HTTP round trip.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Provider endpoint configuration
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Base URL, e.g. https://analysis.example.com
    pub endpoint: String,
    /// Optional bearer token
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl HttpProviderConfig {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct HttpAnalysisProvider {
    client: reqwest::Client,
    config: HttpProviderConfig,
}

impl HttpAnalysisProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn analyze_url(&self) -> String {
        format!("{}/v1/analyze", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl AnalysisProvider for HttpAnalysisProvider {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, ProviderError> {
        let url = self.analyze_url();
        debug!(url = %url, user_id = %request.user_id, "Calling analysis provider");

        let mut http_request = self.client.post(&url).json(request);
        if let Some(api_key) = &self.config.api_key {
            http_request = http_request.bearer_auth(api_key);
        }

        let response = http_request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                ProviderError::Unavailable(e.to_string())
            } else {
                ProviderError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            // Preserve the provider's own error body verbatim for the logs
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Analysis provider rejected request");
            return Err(ProviderError::RequestFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json::<AnalysisResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}
