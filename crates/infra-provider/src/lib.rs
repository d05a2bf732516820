// CarWise Infrastructure - External Service Adapters
// Implements: AnalysisProvider (HTTP), MonitoringSink (tracing)

mod http_provider;
mod monitor;

pub use http_provider::{HttpAnalysisProvider, HttpProviderConfig};
pub use monitor::TracingMonitor;
