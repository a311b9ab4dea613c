//! Active-window transitions.

use serde::{Deserialize, Serialize};

/// A persisted window focus/geometry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEvent {
    pub id: i64,
    pub recording_timestamp: i64,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    /// Platform window handle, stringified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
    /// Accessibility tree snapshot, if captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

/// Window metadata as reported by the window watcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWindowEvent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub left: Option<i64>,
    #[serde(default)]
    pub top: Option<i64>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub window_id: Option<String>,
    #[serde(default)]
    pub state: Option<serde_json::Value>,
}

impl NewWindowEvent {
    /// Window with a title and bounds.
    pub fn titled(title: impl Into<String>, left: i64, top: i64, width: i64, height: i64) -> Self {
        Self {
            title: Some(title.into()),
            left: Some(left),
            top: Some(top),
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }
}
