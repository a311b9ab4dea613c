//! Processed, per-recording view over a [`RecordingStore`].

use crate::config::PipelineConfig;
use crate::db::{RecordingStore, TimeRange};
use crate::diff::{DiffEngine, PixelDiff};
use crate::screenshot_chain::{save_screenshot_diffs, DiffPassReport, ScreenshotChain};
use crate::stop_sequence::{filter_stop_sequences, TrimOutcome};
use crate::Result;
use tapedeck_types::{ActionEvent, MemoryStat, PerformanceStat, Recording, WindowEvent};

/// Action events of a recording after stop-gesture trimming.
#[derive(Debug, Clone)]
pub struct TrimmedEvents {
    pub events: Vec<ActionEvent>,
    pub outcome: TrimOutcome,
}

pub struct Timeline<'s, D: DiffEngine = PixelDiff> {
    store: &'s RecordingStore,
    stop_sequences: Vec<Vec<String>>,
    save_screenshot_diff: bool,
    engine: D,
}

impl<'s> Timeline<'s, PixelDiff> {
    pub fn new(store: &'s RecordingStore, config: &PipelineConfig) -> Self {
        Self::with_engine(store, config, PixelDiff)
    }
}

impl<'s, D: DiffEngine> Timeline<'s, D> {
    pub fn with_engine(store: &'s RecordingStore, config: &PipelineConfig, engine: D) -> Self {
        Self {
            store,
            stop_sequences: config.stop_sequences(),
            save_screenshot_diff: config.save_screenshot_diff,
            engine,
        }
    }

    pub fn store(&self) -> &'s RecordingStore {
        self.store
    }

    pub fn latest_recording(&self) -> Result<Option<Recording>> {
        self.store.latest_recording()
    }

    pub fn recording(&self, timestamp: i64) -> Result<Recording> {
        self.store.recording(timestamp)
    }

    pub fn recordings(&self) -> Result<Vec<Recording>> {
        self.store.recordings()
    }

    /// Action events with any trailing stop gesture removed.
    pub fn action_events(&self, recording_timestamp: i64) -> Result<Vec<ActionEvent>> {
        Ok(self.trimmed_action_events(recording_timestamp)?.events)
    }

    /// Like [`Timeline::action_events`], also reporting what was trimmed.
    pub fn trimmed_action_events(&self, recording_timestamp: i64) -> Result<TrimmedEvents> {
        let mut events = self.store.action_events(recording_timestamp)?;
        let outcome = filter_stop_sequences(&mut events, &self.stop_sequences);
        Ok(TrimmedEvents { events, outcome })
    }

    /// Untrimmed action events inside `range`.
    pub fn action_events_between(
        &self,
        recording_timestamp: i64,
        range: TimeRange,
    ) -> Result<Vec<ActionEvent>> {
        self.store.action_events_between(recording_timestamp, range)
    }

    /// Linked screenshots, with diffs cached first when enabled.
    pub fn screenshots(&self, recording_timestamp: i64) -> Result<ScreenshotChain> {
        let mut chain = ScreenshotChain::link(self.store.screenshots(recording_timestamp)?);
        if self.save_screenshot_diff {
            save_screenshot_diffs(self.store, &mut chain, &self.engine)?;
        }
        Ok(chain)
    }

    /// Run the diff pass for a recording whatever the configuration says.
    pub fn compute_screenshot_diffs(
        &self,
        recording_timestamp: i64,
    ) -> Result<(ScreenshotChain, DiffPassReport)> {
        let mut chain = ScreenshotChain::link(self.store.screenshots(recording_timestamp)?);
        let report = save_screenshot_diffs(self.store, &mut chain, &self.engine)?;
        Ok((chain, report))
    }

    pub fn window_events(&self, recording_timestamp: i64) -> Result<Vec<WindowEvent>> {
        self.store.window_events(recording_timestamp)
    }

    pub fn window_events_between(
        &self,
        recording_timestamp: i64,
        range: TimeRange,
    ) -> Result<Vec<WindowEvent>> {
        self.store.window_events_between(recording_timestamp, range)
    }

    pub fn perf_stats(&self, recording_timestamp: i64) -> Result<Vec<PerformanceStat>> {
        self.store.perf_stats(recording_timestamp)
    }

    pub fn memory_stats(&self, recording_timestamp: i64) -> Result<Vec<MemoryStat>> {
        self.store.memory_stats(recording_timestamp)
    }
}
