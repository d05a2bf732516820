// Monitoring Sink Port
// Receives performance and error telemetry from the job subsystem.

/// Monitoring sink port
///
/// Implementations must not block and must not fail: telemetry is
/// best-effort and can never interfere with job execution.
pub trait MonitoringSink: Send + Sync {
    /// Record a performance measurement (milliseconds) with context tags
    fn log_performance(&self, metric: &str, value_ms: i64, tags: &[(&str, &str)]);

    /// Record an error event with context tags
    fn log_error(&self, message: &str, tags: &[(&str, &str)]);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// A recorded telemetry event
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MonitorEvent {
        Performance {
            metric: String,
            value_ms: i64,
            tags: Vec<(String, String)>,
        },
        Error {
            message: String,
            tags: Vec<(String, String)>,
        },
    }

    /// Recording sink for assertions in tests
    pub struct RecordingMonitor {
        events: Arc<Mutex<Vec<MonitorEvent>>>,
    }

    impl RecordingMonitor {
        pub fn new() -> Self {
            Self {
                events: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn events(&self) -> Vec<MonitorEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn performance_count(&self) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, MonitorEvent::Performance { .. }))
                .count()
        }

        pub fn error_count(&self) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, MonitorEvent::Error { .. }))
                .count()
        }
    }

    impl Default for RecordingMonitor {
        fn default() -> Self {
            Self::new()
        }
    }

    fn own_tags(tags: &[(&str, &str)]) -> Vec<(String, String)> {
        tags.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    impl MonitoringSink for RecordingMonitor {
        fn log_performance(&self, metric: &str, value_ms: i64, tags: &[(&str, &str)]) {
            self.events.lock().unwrap().push(MonitorEvent::Performance {
                metric: metric.to_string(),
                value_ms,
                tags: own_tags(tags),
            });
        }

        fn log_error(&self, message: &str, tags: &[(&str, &str)]) {
            self.events.lock().unwrap().push(MonitorEvent::Error {
                message: message.to_string(),
                tags: own_tags(tags),
            });
        }
    }
}
