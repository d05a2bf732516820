// Domain Layer - Pure business logic and entities

pub mod error;
pub mod result;
pub mod session;

// Re-exports
pub use error::DomainError;
pub use result::{DiagnosisResult, Severity};
pub use session::{
    DiagnosisInput, DiagnosisSession, SessionId, SessionStatus, DEFAULT_MAX_ATTEMPTS,
};
