//! Resource-usage samples taken while recording.

use serde::{Deserialize, Serialize};

/// Duration of one recorder event-handling step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStat {
    pub id: i64,
    pub recording_timestamp: i64,
    /// Which event stream the sample belongs to (e.g., "screen", "action").
    pub event_type: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
}

impl PerformanceStat {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Recorder process memory usage at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStat {
    pub id: i64,
    pub recording_timestamp: i64,
    pub memory_usage_bytes: i64,
    pub timestamp: i64,
}
