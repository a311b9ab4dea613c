//! Event persistence pipeline for Tapedeck recordings.

mod config;
mod db;
mod diff;
mod error;
mod schema;
mod screenshot_chain;
mod stop_sequence;
mod timeline;
mod writer;

pub use config::PipelineConfig;
pub use db::{InsertReceipt, RecordingStore, TimeRange};
pub use diff::{changed_ratio, DiffEngine, EngineError, PixelDiff};
pub use error::TapedeckError;
pub use schema::{EntityKind, Fields, IntoFields, RECORDING_TIMESTAMP, TIMESTAMP};
pub use screenshot_chain::{save_screenshot_diffs, DiffPassReport, Predecessor, ScreenshotChain};
pub use stop_sequence::{filter_stop_sequences, MatchState, SequenceMatcher, TrimOutcome};
pub use timeline::{Timeline, TrimmedEvents};
pub use writer::{BufferMode, EventWriter};

pub use rusqlite::types::Value as SqlValue;

/// Result type for Tapedeck operations.
pub type Result<T> = std::result::Result<T, TapedeckError>;
