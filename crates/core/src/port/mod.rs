// Port Layer - Interfaces for external dependencies

pub mod analysis_provider;
pub mod id_provider; // For deterministic testing
pub mod monitoring;
pub mod session_repository;
pub mod time_provider;

// Re-exports
pub use analysis_provider::{AnalysisProvider, AnalysisRequest, AnalysisResponse, ProviderError};
pub use id_provider::IdProvider;
pub use monitoring::MonitoringSink;
pub use session_repository::SessionRepository;
pub use time_provider::TimeProvider;
