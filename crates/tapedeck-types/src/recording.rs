//! Recording session metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded interaction session.
///
/// The `timestamp` is the recording's identity: every event row references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Row id.
    pub id: i64,
    /// Creation timestamp (ms since Unix epoch), unique per recording.
    pub timestamp: i64,
    pub monitor_width: Option<i64>,
    pub monitor_height: Option<i64>,
    pub double_click_interval_seconds: Option<f64>,
    pub double_click_distance_pixels: Option<f64>,
    /// Platform the session was captured on (e.g., "darwin", "win32").
    pub platform: Option<String>,
    /// Human-readable session name.
    pub task_description: Option<String>,
}

impl Recording {
    /// When the recording started, if the timestamp is representable.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Metadata supplied when a recording session starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRecording {
    pub timestamp: i64,
    #[serde(default)]
    pub monitor_width: Option<i64>,
    #[serde(default)]
    pub monitor_height: Option<i64>,
    #[serde(default)]
    pub double_click_interval_seconds: Option<f64>,
    #[serde(default)]
    pub double_click_distance_pixels: Option<f64>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub task_description: Option<String>,
}

impl NewRecording {
    /// Minimal recording with just an identity timestamp and a name.
    pub fn named(timestamp: i64, task_description: impl Into<String>) -> Self {
        Self {
            timestamp,
            task_description: Some(task_description.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_at_from_millis() {
        let recording = Recording {
            id: 1,
            timestamp: 1_700_000_000_123,
            monitor_width: None,
            monitor_height: None,
            double_click_interval_seconds: None,
            double_click_distance_pixels: None,
            platform: None,
            task_description: None,
        };
        let started = recording.started_at().unwrap();
        assert_eq!(started.timestamp_millis(), 1_700_000_000_123);
    }
}
