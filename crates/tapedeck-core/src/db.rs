//! SQLite persistence for recordings and their event timelines.

use crate::schema::{EntityKind, Fields, SCHEMA_SQL};
use crate::{Result, TapedeckError};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Params, Row};
use std::path::Path;
use std::sync::Mutex;
use tapedeck_types::{
    ActionEvent, ActionName, MemoryStat, NewRecording, PerformanceStat, Recording, Screenshot,
    WindowEvent,
};

/// Inclusive event-timestamp window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }
}

/// Outcome of a committed insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertReceipt {
    pub kind: EntityKind,
    /// Rows written by this commit.
    pub rows: usize,
    /// Row id of the last row written.
    pub last_insert_rowid: i64,
}

/// SQLite-based store for recordings and their events.
pub struct RecordingStore {
    conn: Mutex<Connection>,
}

impl RecordingStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create a store from an existing connection.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, mostly useful for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA_SQL)?;
        tracing::debug!(target: "tapedeck::db", "Schema initialized");
        Ok(())
    }

    // =========================================================================
    // Recordings
    // =========================================================================

    /// Insert a new recording and return it as stored.
    pub fn insert_recording(&self, recording: &NewRecording) -> Result<Recording> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO recordings (
                timestamp, monitor_width, monitor_height,
                double_click_interval_seconds, double_click_distance_pixels,
                platform, task_description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                recording.timestamp,
                recording.monitor_width,
                recording.monitor_height,
                recording.double_click_interval_seconds,
                recording.double_click_distance_pixels,
                recording.platform,
                recording.task_description,
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(
            target: "tapedeck::db",
            "Created recording {} (id {})",
            recording.timestamp,
            id
        );
        Ok(Recording {
            id,
            timestamp: recording.timestamp,
            monitor_width: recording.monitor_width,
            monitor_height: recording.monitor_height,
            double_click_interval_seconds: recording.double_click_interval_seconds,
            double_click_distance_pixels: recording.double_click_distance_pixels,
            platform: recording.platform.clone(),
            task_description: recording.task_description.clone(),
        })
    }

    /// The most recently started recording, if any.
    pub fn latest_recording(&self) -> Result<Option<Recording>> {
        let conn = self.conn.lock().unwrap();
        let recording = conn
            .query_row(
                "SELECT * FROM recordings ORDER BY timestamp DESC LIMIT 1",
                [],
                row_to_recording,
            )
            .optional()?;
        Ok(recording)
    }

    /// Get a recording by its identity timestamp.
    pub fn recording(&self, timestamp: i64) -> Result<Recording> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM recordings WHERE timestamp = ?1",
            params![timestamp],
            row_to_recording,
        )
        .optional()?
        .ok_or(TapedeckError::RecordingNotFound(timestamp))
    }

    /// All recordings, newest first.
    pub fn recordings(&self) -> Result<Vec<Recording>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM recordings ORDER BY timestamp DESC")?;
        let recordings = stmt
            .query_map([], row_to_recording)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(recordings)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert `rows` of one kind in a single transaction.
    ///
    /// Either every row becomes visible or none does. Any storage error is
    /// reported as [`TapedeckError::CommitFailed`].
    pub fn commit_rows(&self, kind: EntityKind, rows: &[Fields]) -> Result<InsertReceipt> {
        let mut conn = self.conn.lock().unwrap();
        let last_insert_rowid = insert_batch(&mut conn, kind, rows).map_err(|source| {
            TapedeckError::CommitFailed {
                kind,
                rows: rows.len(),
                source,
            }
        })?;
        tracing::debug!(
            target: "tapedeck::db",
            "Committed {} {} row(s)",
            rows.len(),
            kind
        );
        Ok(InsertReceipt {
            kind,
            rows: rows.len(),
            last_insert_rowid,
        })
    }

    /// Persist the cached diff fields of `screenshots` in one transaction.
    ///
    /// Values already stored are kept: a diff is written at most once.
    pub fn persist_screenshot_diffs(&self, screenshots: &[&Screenshot]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let updated = update_diffs(&mut conn, screenshots).map_err(|source| {
            TapedeckError::CommitFailed {
                kind: EntityKind::Screenshot,
                rows: screenshots.len(),
                source,
            }
        })?;
        tracing::debug!(
            target: "tapedeck::db",
            "Persisted diff data for {} screenshot(s)",
            updated
        );
        Ok(updated)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Action events of a recording, ascending by timestamp.
    pub fn action_events(&self, recording_timestamp: i64) -> Result<Vec<ActionEvent>> {
        self.fetch(
            recording_timestamp,
            "SELECT * FROM action_events WHERE recording_timestamp = ?1 ORDER BY timestamp, id",
            params![recording_timestamp],
            row_to_action_event,
        )
    }

    /// Action events within `range`, ascending by timestamp.
    pub fn action_events_between(
        &self,
        recording_timestamp: i64,
        range: TimeRange,
    ) -> Result<Vec<ActionEvent>> {
        self.fetch(
            recording_timestamp,
            r#"
            SELECT * FROM action_events
            WHERE recording_timestamp = ?1 AND timestamp >= ?2 AND timestamp <= ?3
            ORDER BY timestamp, id
            "#,
            params![recording_timestamp, range.start, range.end],
            row_to_action_event,
        )
    }

    /// Screenshots of a recording, ascending by timestamp.
    pub fn screenshots(&self, recording_timestamp: i64) -> Result<Vec<Screenshot>> {
        self.fetch(
            recording_timestamp,
            "SELECT * FROM screenshots WHERE recording_timestamp = ?1 ORDER BY timestamp, id",
            params![recording_timestamp],
            row_to_screenshot,
        )
    }

    /// Window events of a recording, ascending by timestamp.
    pub fn window_events(&self, recording_timestamp: i64) -> Result<Vec<WindowEvent>> {
        self.fetch(
            recording_timestamp,
            "SELECT * FROM window_events WHERE recording_timestamp = ?1 ORDER BY timestamp, id",
            params![recording_timestamp],
            row_to_window_event,
        )
    }

    /// Window events within `range`, ascending by timestamp.
    pub fn window_events_between(
        &self,
        recording_timestamp: i64,
        range: TimeRange,
    ) -> Result<Vec<WindowEvent>> {
        self.fetch(
            recording_timestamp,
            r#"
            SELECT * FROM window_events
            WHERE recording_timestamp = ?1 AND timestamp >= ?2 AND timestamp <= ?3
            ORDER BY timestamp, id
            "#,
            params![recording_timestamp, range.start, range.end],
            row_to_window_event,
        )
    }

    /// Performance stats of a recording, ascending by start time.
    pub fn perf_stats(&self, recording_timestamp: i64) -> Result<Vec<PerformanceStat>> {
        self.fetch(
            recording_timestamp,
            r#"
            SELECT * FROM performance_stats
            WHERE recording_timestamp = ?1
            ORDER BY start_time, id
            "#,
            params![recording_timestamp],
            row_to_perf_stat,
        )
    }

    /// Memory stats of a recording, ascending by timestamp.
    pub fn memory_stats(&self, recording_timestamp: i64) -> Result<Vec<MemoryStat>> {
        self.fetch(
            recording_timestamp,
            "SELECT * FROM memory_stats WHERE recording_timestamp = ?1 ORDER BY timestamp, id",
            params![recording_timestamp],
            row_to_memory_stat,
        )
    }

    /// Number of stored rows of `kind` for a recording.
    pub fn count(&self, kind: EntityKind, recording_timestamp: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        ensure_recording(&conn, recording_timestamp)?;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE recording_timestamp = ?1",
                kind.table()
            ),
            params![recording_timestamp],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn fetch<T, P: Params>(
        &self,
        recording_timestamp: i64,
        sql: &str,
        params: P,
        map: fn(&Row) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let conn = self.conn.lock().unwrap();
        ensure_recording(&conn, recording_timestamp)?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn ensure_recording(conn: &Connection, timestamp: i64) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM recordings WHERE timestamp = ?1",
        params![timestamp],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(TapedeckError::RecordingNotFound(timestamp))
    }
}

fn insert_batch(conn: &mut Connection, kind: EntityKind, rows: &[Fields]) -> rusqlite::Result<i64> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&kind.insert_sql())?;
        for row in rows {
            stmt.execute(params_from_iter(kind.row_values(row)))?;
        }
    }
    let last = tx.last_insert_rowid();
    tx.commit()?;
    Ok(last)
}

fn update_diffs(conn: &mut Connection, screenshots: &[&Screenshot]) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;
    let mut updated = 0;
    {
        let mut stmt = tx.prepare(
            r#"
            UPDATE screenshots SET
                png_diff_data = COALESCE(png_diff_data, ?1),
                png_diff_mask_data = COALESCE(png_diff_mask_data, ?2)
            WHERE id = ?3
            "#,
        )?;
        for shot in screenshots {
            updated += stmt.execute(params![
                shot.png_diff_data,
                shot.png_diff_mask_data,
                shot.id
            ])?;
        }
    }
    tx.commit()?;
    Ok(updated)
}

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, err.into())
}

fn json_column(row: &Row, name: &str) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = row.get(name)?;
    match raw {
        Some(text) => serde_json::from_str(&text).map(Some).map_err(|e| {
            conversion_error(row.as_ref().column_index(name).unwrap_or(0), Type::Text, e)
        }),
        None => Ok(None),
    }
}

fn row_to_recording(row: &Row) -> rusqlite::Result<Recording> {
    Ok(Recording {
        id: row.get("id")?,
        timestamp: row.get("timestamp")?,
        monitor_width: row.get("monitor_width")?,
        monitor_height: row.get("monitor_height")?,
        double_click_interval_seconds: row.get("double_click_interval_seconds")?,
        double_click_distance_pixels: row.get("double_click_distance_pixels")?,
        platform: row.get("platform")?,
        task_description: row.get("task_description")?,
    })
}

fn row_to_action_event(row: &Row) -> rusqlite::Result<ActionEvent> {
    let name: String = row.get("name")?;
    let name: ActionName = name.parse().map_err(|e: String| {
        conversion_error(row.as_ref().column_index("name").unwrap_or(0), Type::Text, e)
    })?;
    Ok(ActionEvent {
        id: row.get("id")?,
        recording_timestamp: row.get("recording_timestamp")?,
        timestamp: row.get("timestamp")?,
        name,
        screenshot_timestamp: row.get("screenshot_timestamp")?,
        window_event_timestamp: row.get("window_event_timestamp")?,
        mouse_x: row.get("mouse_x")?,
        mouse_y: row.get("mouse_y")?,
        mouse_dx: row.get("mouse_dx")?,
        mouse_dy: row.get("mouse_dy")?,
        mouse_button_name: row.get("mouse_button_name")?,
        mouse_pressed: row.get("mouse_pressed")?,
        key_name: row.get("key_name")?,
        key_char: row.get("key_char")?,
        key_vk: row.get("key_vk")?,
        canonical_key_name: row.get("canonical_key_name")?,
        canonical_key_char: row.get("canonical_key_char")?,
        canonical_key_vk: row.get("canonical_key_vk")?,
        parent_id: row.get("parent_id")?,
        element_state: json_column(row, "element_state")?,
    })
}

fn row_to_screenshot(row: &Row) -> rusqlite::Result<Screenshot> {
    Ok(Screenshot {
        id: row.get("id")?,
        recording_timestamp: row.get("recording_timestamp")?,
        timestamp: row.get("timestamp")?,
        png_data: row.get("png_data")?,
        png_diff_data: row.get("png_diff_data")?,
        png_diff_mask_data: row.get("png_diff_mask_data")?,
    })
}

fn row_to_window_event(row: &Row) -> rusqlite::Result<WindowEvent> {
    Ok(WindowEvent {
        id: row.get("id")?,
        recording_timestamp: row.get("recording_timestamp")?,
        timestamp: row.get("timestamp")?,
        title: row.get("title")?,
        left: row.get("left")?,
        top: row.get("top")?,
        width: row.get("width")?,
        height: row.get("height")?,
        window_id: row.get("window_id")?,
        state: json_column(row, "state")?,
    })
}

fn row_to_perf_stat(row: &Row) -> rusqlite::Result<PerformanceStat> {
    Ok(PerformanceStat {
        id: row.get("id")?,
        recording_timestamp: row.get("recording_timestamp")?,
        event_type: row.get("event_type")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        window_id: row.get("window_id")?,
    })
}

fn row_to_memory_stat(row: &Row) -> rusqlite::Result<MemoryStat> {
    Ok(MemoryStat {
        id: row.get("id")?,
        recording_timestamp: row.get("recording_timestamp")?,
        memory_usage_bytes: row.get("memory_usage_bytes")?,
        timestamp: row.get("timestamp")?,
    })
}
