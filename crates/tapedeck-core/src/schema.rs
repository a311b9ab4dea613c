//! Persisted entity kinds and their declared columns.
//!
//! The column lists here drive both the writer's field validation and the
//! generated `INSERT` statements, so a field the recorder sends that is not
//! listed is rejected rather than silently dropped.

use rusqlite::types::Value;
use std::collections::BTreeMap;
use std::fmt;
use tapedeck_types::{NewActionEvent, NewScreenshot, NewWindowEvent};

/// A record offered to the writer: column name -> SQL value.
pub type Fields = BTreeMap<String, Value>;

/// Column holding the owning recording's identity timestamp.
pub const RECORDING_TIMESTAMP: &str = "recording_timestamp";
/// Column holding the event timestamp.
pub const TIMESTAMP: &str = "timestamp";

/// Event-like entity kinds accepted by the batched writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    ActionEvent,
    Screenshot,
    WindowEvent,
    PerformanceStat,
    MemoryStat,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::ActionEvent,
        EntityKind::Screenshot,
        EntityKind::WindowEvent,
        EntityKind::PerformanceStat,
        EntityKind::MemoryStat,
    ];

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::ActionEvent => "action_events",
            EntityKind::Screenshot => "screenshots",
            EntityKind::WindowEvent => "window_events",
            EntityKind::PerformanceStat => "performance_stats",
            EntityKind::MemoryStat => "memory_stats",
        }
    }

    /// Declared columns, excluding the autoincrement `id`.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            EntityKind::ActionEvent => &[
                RECORDING_TIMESTAMP,
                TIMESTAMP,
                "name",
                "screenshot_timestamp",
                "window_event_timestamp",
                "mouse_x",
                "mouse_y",
                "mouse_dx",
                "mouse_dy",
                "mouse_button_name",
                "mouse_pressed",
                "key_name",
                "key_char",
                "key_vk",
                "canonical_key_name",
                "canonical_key_char",
                "canonical_key_vk",
                "parent_id",
                "element_state",
            ],
            EntityKind::Screenshot => &[
                RECORDING_TIMESTAMP,
                TIMESTAMP,
                "png_data",
                "png_diff_data",
                "png_diff_mask_data",
            ],
            EntityKind::WindowEvent => &[
                RECORDING_TIMESTAMP,
                TIMESTAMP,
                "title",
                "left",
                "top",
                "width",
                "height",
                "window_id",
                "state",
            ],
            EntityKind::PerformanceStat => &[
                RECORDING_TIMESTAMP,
                "event_type",
                "start_time",
                "end_time",
                "window_id",
            ],
            EntityKind::MemoryStat => &[RECORDING_TIMESTAMP, "memory_usage_bytes", TIMESTAMP],
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns().contains(&name)
    }

    /// Whether rows of this kind carry an event timestamp.
    pub fn has_timestamp(&self) -> bool {
        self.has_column(TIMESTAMP)
    }

    /// `INSERT` for one row of this kind with every declared column bound.
    pub fn insert_sql(&self) -> String {
        let columns = self.columns();
        let names = columns
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            names,
            placeholders
        )
    }

    /// Values of `fields` in declared column order; absent columns are NULL.
    pub fn row_values(&self, fields: &Fields) -> Vec<Value> {
        self.columns()
            .iter()
            .map(|c| fields.get(*c).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::ActionEvent => "action_event",
            EntityKind::Screenshot => "screenshot",
            EntityKind::WindowEvent => "window_event",
            EntityKind::PerformanceStat => "performance_stat",
            EntityKind::MemoryStat => "memory_stat",
        };
        f.write_str(name)
    }
}

/// Schema for every table. Event tables reference `recordings(timestamp)`.
pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS recordings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL UNIQUE,
    monitor_width INTEGER,
    monitor_height INTEGER,
    double_click_interval_seconds REAL,
    double_click_distance_pixels REAL,
    platform TEXT,
    task_description TEXT
);

CREATE TABLE IF NOT EXISTS action_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recording_timestamp INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    name TEXT NOT NULL,
    screenshot_timestamp INTEGER,
    window_event_timestamp INTEGER,
    mouse_x REAL,
    mouse_y REAL,
    mouse_dx REAL,
    mouse_dy REAL,
    mouse_button_name TEXT,
    mouse_pressed INTEGER,
    key_name TEXT,
    key_char TEXT,
    key_vk TEXT,
    canonical_key_name TEXT,
    canonical_key_char TEXT,
    canonical_key_vk TEXT,
    parent_id INTEGER,
    element_state TEXT,
    FOREIGN KEY (recording_timestamp) REFERENCES recordings(timestamp)
);

CREATE INDEX IF NOT EXISTS idx_action_events_recording
    ON action_events(recording_timestamp, timestamp);

CREATE TABLE IF NOT EXISTS screenshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recording_timestamp INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    png_data BLOB NOT NULL,
    png_diff_data BLOB,
    png_diff_mask_data BLOB,
    FOREIGN KEY (recording_timestamp) REFERENCES recordings(timestamp)
);

CREATE INDEX IF NOT EXISTS idx_screenshots_recording
    ON screenshots(recording_timestamp, timestamp);

CREATE TABLE IF NOT EXISTS window_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recording_timestamp INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    title TEXT,
    "left" INTEGER,
    "top" INTEGER,
    width INTEGER,
    height INTEGER,
    window_id TEXT,
    state TEXT,
    FOREIGN KEY (recording_timestamp) REFERENCES recordings(timestamp)
);

CREATE INDEX IF NOT EXISTS idx_window_events_recording
    ON window_events(recording_timestamp, timestamp);

CREATE TABLE IF NOT EXISTS performance_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recording_timestamp INTEGER NOT NULL,
    event_type TEXT NOT NULL,
    start_time REAL NOT NULL,
    end_time REAL NOT NULL,
    window_id TEXT,
    FOREIGN KEY (recording_timestamp) REFERENCES recordings(timestamp)
);

CREATE INDEX IF NOT EXISTS idx_performance_stats_recording
    ON performance_stats(recording_timestamp, start_time);

CREATE TABLE IF NOT EXISTS memory_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recording_timestamp INTEGER NOT NULL,
    memory_usage_bytes INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    FOREIGN KEY (recording_timestamp) REFERENCES recordings(timestamp)
);

CREATE INDEX IF NOT EXISTS idx_memory_stats_recording
    ON memory_stats(recording_timestamp, timestamp);
"#;

/// Typed capture payloads that know their entity kind.
pub trait IntoFields {
    const KIND: EntityKind;

    fn into_fields(self) -> Fields;
}

fn json_value(value: Option<serde_json::Value>) -> Value {
    match value {
        Some(v) => Value::Text(v.to_string()),
        None => Value::Null,
    }
}

impl IntoFields for NewActionEvent {
    const KIND: EntityKind = EntityKind::ActionEvent;

    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::Text(self.name.as_str().into()));
        fields.insert("screenshot_timestamp".into(), self.screenshot_timestamp.into());
        fields.insert("window_event_timestamp".into(), self.window_event_timestamp.into());
        fields.insert("mouse_x".into(), self.mouse_x.into());
        fields.insert("mouse_y".into(), self.mouse_y.into());
        fields.insert("mouse_dx".into(), self.mouse_dx.into());
        fields.insert("mouse_dy".into(), self.mouse_dy.into());
        fields.insert("mouse_button_name".into(), self.mouse_button_name.into());
        fields.insert("mouse_pressed".into(), self.mouse_pressed.into());
        fields.insert("key_name".into(), self.key_name.into());
        fields.insert("key_char".into(), self.key_char.into());
        fields.insert("key_vk".into(), self.key_vk.into());
        fields.insert("canonical_key_name".into(), self.canonical_key_name.into());
        fields.insert("canonical_key_char".into(), self.canonical_key_char.into());
        fields.insert("canonical_key_vk".into(), self.canonical_key_vk.into());
        fields.insert("parent_id".into(), self.parent_id.into());
        fields.insert("element_state".into(), json_value(self.element_state));
        fields
    }
}

impl IntoFields for NewScreenshot {
    const KIND: EntityKind = EntityKind::Screenshot;

    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("png_data".into(), Value::Blob(self.png_data));
        fields
    }
}

impl IntoFields for NewWindowEvent {
    const KIND: EntityKind = EntityKind::WindowEvent;

    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".into(), self.title.into());
        fields.insert("left".into(), self.left.into());
        fields.insert("top".into(), self.top.into());
        fields.insert("width".into(), self.width.into());
        fields.insert("height".into(), self.height.into());
        fields.insert("window_id".into(), self.window_id.into());
        fields.insert("state".into(), json_value(self.state));
        fields
    }
}
