//! Error types for Tapedeck.

use crate::schema::EntityKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TapedeckError {
    #[error("Schema violation on {kind}: field '{field}' {reason}")]
    SchemaViolation {
        kind: EntityKind,
        field: String,
        reason: &'static str,
    },

    #[error("Commit of {rows} {kind} row(s) failed: {source}")]
    CommitFailed {
        kind: EntityKind,
        rows: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Recording not found: {0}")]
    RecordingNotFound(i64),

    #[error("Diff computation failed for screenshot at {timestamp}: {reason}")]
    DiffComputation { timestamp: i64, reason: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TapedeckError {
    /// Whether retrying the failed operation can succeed.
    ///
    /// Commit and diff failures are operational; schema violations and
    /// unknown recordings are caller bugs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TapedeckError::CommitFailed { .. } | TapedeckError::DiffComputation { .. }
        )
    }
}
