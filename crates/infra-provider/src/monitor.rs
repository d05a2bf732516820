// Tracing-backed monitoring sink

use carwise_core::port::MonitoringSink;
use tracing::{error, info};

/// Monitoring sink that forwards telemetry to the tracing pipeline.
///
/// Structured fields keep the events machine-filterable; the optional OTLP
/// layer in the daemon exports them when the `telemetry` feature is on.
pub struct TracingMonitor;

impl TracingMonitor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn render_tags(tags: &[(&str, &str)]) -> String {
    tags.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

impl MonitoringSink for TracingMonitor {
    fn log_performance(&self, metric: &str, value_ms: i64, tags: &[(&str, &str)]) {
        info!(
            target: "carwise::metrics",
            metric = %metric,
            value_ms = %value_ms,
            tags = %render_tags(tags),
            "performance"
        );
    }

    fn log_error(&self, message: &str, tags: &[(&str, &str)]) {
        error!(
            target: "carwise::metrics",
            tags = %render_tags(tags),
            "{}",
            message
        );
    }
}
