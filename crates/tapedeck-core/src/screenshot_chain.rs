//! Linking screenshots into a sequence and caching their diffs.
//!
//! Each capture is compared against the one before it. The predecessor is a
//! positional lookup inside the chain, not an owned reference; the first
//! capture has none, and [`ScreenshotChain::prev`] returns the capture itself
//! for it so consumers expecting a self-link keep working.

use crate::db::RecordingStore;
use crate::diff::DiffEngine;
use crate::{Result, TapedeckError};
use tapedeck_types::Screenshot;

/// Position of a screenshot's predecessor within its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predecessor {
    IsFirst,
    At(usize),
}

/// Time-ordered screenshots of one recording.
#[derive(Debug, Clone, Default)]
pub struct ScreenshotChain {
    frames: Vec<Screenshot>,
}

impl ScreenshotChain {
    /// Link `screenshots`, which must already be in ascending timestamp order.
    pub fn link(screenshots: Vec<Screenshot>) -> Self {
        Self {
            frames: screenshots,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Screenshot> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Screenshot> {
        self.frames.iter()
    }

    pub fn as_slice(&self) -> &[Screenshot] {
        &self.frames
    }

    pub fn predecessor(&self, index: usize) -> Predecessor {
        match index {
            0 => Predecessor::IsFirst,
            i => Predecessor::At(i - 1),
        }
    }

    /// Predecessor of frame `index`; the first frame is its own predecessor.
    ///
    /// Panics if `index` is out of bounds.
    pub fn prev(&self, index: usize) -> &Screenshot {
        match self.predecessor(index) {
            Predecessor::IsFirst => &self.frames[index],
            Predecessor::At(i) => &self.frames[i],
        }
    }
}

impl<'a> IntoIterator for &'a ScreenshotChain {
    type Item = &'a Screenshot;
    type IntoIter = std::slice::Iter<'a, Screenshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// What one diff pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffPassReport {
    pub diffs_computed: usize,
    pub masks_computed: usize,
    /// Whether a write was issued.
    pub persisted: bool,
}

impl DiffPassReport {
    pub fn computed_anything(&self) -> bool {
        self.diffs_computed > 0 || self.masks_computed > 0
    }
}

struct Pending {
    index: usize,
    diff: Option<Vec<u8>>,
    mask: Option<Vec<u8>>,
}

/// Compute and persist missing diff artifacts for every linked frame.
///
/// Everything is computed before anything is written. A computation failure
/// aborts the pass with no write and leaves `chain` unchanged. When nothing
/// is missing no write is issued.
pub fn save_screenshot_diffs<E: DiffEngine>(
    store: &RecordingStore,
    chain: &mut ScreenshotChain,
    engine: &E,
) -> Result<DiffPassReport> {
    tracing::info!(
        target: "tapedeck::diff",
        "Verifying diffs for {} screenshot(s)",
        chain.len()
    );

    let mut report = DiffPassReport::default();
    let mut pending = Vec::new();

    for (index, shot) in chain.iter().enumerate() {
        let Predecessor::At(prev) = chain.predecessor(index) else {
            continue;
        };
        let failed = |e: crate::diff::EngineError| TapedeckError::DiffComputation {
            timestamp: shot.timestamp,
            reason: e.to_string(),
        };

        let diff = match &shot.png_diff_data {
            Some(_) => None,
            None => {
                let previous = &chain.frames[prev];
                let bytes = engine
                    .difference(&shot.png_data, &previous.png_data)
                    .map_err(failed)?;
                report.diffs_computed += 1;
                Some(bytes)
            }
        };
        let mask = match &shot.png_diff_mask_data {
            Some(_) => None,
            None => {
                let source = diff
                    .as_deref()
                    .or(shot.png_diff_data.as_deref())
                    .unwrap_or_default();
                let bytes = engine.mask(source).map_err(failed)?;
                report.masks_computed += 1;
                Some(bytes)
            }
        };
        if diff.is_some() || mask.is_some() {
            pending.push(Pending { index, diff, mask });
        }
    }

    if pending.is_empty() {
        tracing::debug!(target: "tapedeck::diff", "All screenshot diffs already cached");
        return Ok(report);
    }

    // Stage on a copy so a failed commit leaves the chain as it was.
    let mut staged = chain.frames.clone();
    for Pending { index, diff, mask } in pending {
        let frame = &mut staged[index];
        if let Some(diff) = diff {
            frame.png_diff_data = Some(diff);
        }
        if let Some(mask) = mask {
            frame.png_diff_mask_data = Some(mask);
        }
    }

    tracing::info!(target: "tapedeck::diff", "Saving screenshot diff data");
    let linked: Vec<&Screenshot> = staged.iter().skip(1).collect();
    store.persist_screenshot_diffs(&linked)?;
    chain.frames = staged;
    report.persisted = true;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::EngineError;
    use crate::schema::EntityKind;
    use crate::writer::EventWriter;
    use std::cell::Cell;
    use std::num::NonZeroUsize;
    use tapedeck_types::{NewRecording, NewScreenshot};
    use tempfile::TempDir;

    const REC: i64 = 10;

    /// Engine that tags outputs and counts calls, optionally failing on a frame.
    #[derive(Default)]
    struct CountingEngine {
        differences: Cell<usize>,
        masks: Cell<usize>,
        fail_on: Option<Vec<u8>>,
    }

    impl DiffEngine for CountingEngine {
        fn difference(
            &self,
            current: &[u8],
            previous: &[u8],
        ) -> std::result::Result<Vec<u8>, EngineError> {
            if self.fail_on.as_deref() == Some(current) {
                return Err("malformed capture".into());
            }
            self.differences.set(self.differences.get() + 1);
            Ok([b"diff:", current, b"-", previous].concat())
        }

        fn mask(&self, difference: &[u8]) -> std::result::Result<Vec<u8>, EngineError> {
            self.masks.set(self.masks.get() + 1);
            Ok([b"mask:", difference].concat())
        }
    }

    fn seed_frames(store: &RecordingStore, frames: &[&[u8]]) {
        store.insert_recording(&NewRecording::named(REC, "diffs")).unwrap();
        let mut writer = EventWriter::new(store, NonZeroUsize::new(frames.len().max(1)).unwrap());
        for (i, frame) in frames.iter().enumerate() {
            writer
                .insert_screenshot(REC, i as i64 * 100, NewScreenshot::new(frame.to_vec()))
                .unwrap();
        }
    }

    fn store_with_frames(frames: &[&[u8]]) -> RecordingStore {
        let store = RecordingStore::open_in_memory().unwrap();
        seed_frames(&store, frames);
        store
    }

    fn chain(store: &RecordingStore) -> ScreenshotChain {
        ScreenshotChain::link(store.screenshots(REC).unwrap())
    }

    #[test]
    fn test_prev_links() {
        let store = store_with_frames(&[b"a", b"b", b"c"]);
        let chain = chain(&store);

        assert_eq!(chain.predecessor(0), Predecessor::IsFirst);
        assert_eq!(chain.prev(0).png_data, b"a");
        assert_eq!(chain.predecessor(2), Predecessor::At(1));
        for i in 1..chain.len() {
            assert_eq!(chain.prev(i).timestamp, chain.get(i - 1).unwrap().timestamp);
        }
    }

    #[test]
    fn test_pass_computes_every_linked_frame() {
        let store = store_with_frames(&[b"a", b"b", b"c"]);
        let mut chain = chain(&store);
        let engine = CountingEngine::default();

        let report = save_screenshot_diffs(&store, &mut chain, &engine).unwrap();
        assert_eq!(report.diffs_computed, 2);
        assert_eq!(report.masks_computed, 2);
        assert!(report.persisted);

        assert_eq!(chain.get(0).unwrap().png_diff_data, None);
        assert_eq!(chain.get(2).unwrap().png_diff_data.as_deref(), Some(&b"diff:c-b"[..]));
        assert_eq!(
            chain.get(2).unwrap().png_diff_mask_data.as_deref(),
            Some(&b"mask:diff:c-b"[..])
        );

        let stored = store.screenshots(REC).unwrap();
        assert_eq!(stored[0].png_diff_data, None);
        assert_eq!(stored[1].png_diff_data.as_deref(), Some(&b"diff:b-a"[..]));
    }

    #[test]
    fn test_second_pass_is_free() {
        let store = store_with_frames(&[b"a", b"b", b"c"]);
        let engine = CountingEngine::default();

        let mut first = chain(&store);
        save_screenshot_diffs(&store, &mut first, &engine).unwrap();
        let (diffs, masks) = (engine.differences.get(), engine.masks.get());

        let mut again = chain(&store);
        let report = save_screenshot_diffs(&store, &mut again, &engine).unwrap();
        assert_eq!(report, DiffPassReport::default());
        assert_eq!(engine.differences.get(), diffs);
        assert_eq!(engine.masks.get(), masks);
    }

    #[test]
    fn test_missing_mask_reuses_cached_diff() {
        let store = store_with_frames(&[b"a", b"b"]);
        let mut chain = chain(&store);
        chain.frames[1].png_diff_data = Some(b"cached".to_vec());
        let engine = CountingEngine::default();

        let report = save_screenshot_diffs(&store, &mut chain, &engine).unwrap();
        assert_eq!(report.diffs_computed, 0);
        assert_eq!(report.masks_computed, 1);
        assert_eq!(
            chain.get(1).unwrap().png_diff_mask_data.as_deref(),
            Some(&b"mask:cached"[..])
        );
    }

    #[test]
    fn test_failure_persists_nothing() {
        let store = store_with_frames(&[b"a", b"b", b"c", b"d"]);
        let mut chain = chain(&store);
        let engine = CountingEngine {
            fail_on: Some(b"d".to_vec()),
            ..Default::default()
        };

        let err = save_screenshot_diffs(&store, &mut chain, &engine).unwrap_err();
        assert!(matches!(err, TapedeckError::DiffComputation { timestamp: 300, .. }));
        assert_eq!(engine.differences.get(), 2);

        assert!(chain.iter().all(|s| s.png_diff_data.is_none()));
        assert!(
            store
                .screenshots(REC)
                .unwrap()
                .iter()
                .all(|s| s.png_diff_data.is_none() && s.png_diff_mask_data.is_none())
        );
    }

    #[test]
    fn test_commit_failure_leaves_chain_and_store_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timeline.db");
        let store = RecordingStore::open(&path).unwrap();
        seed_frames(&store, &[b"a", b"b", b"c", b"d"]);

        // Reject the update of the last frame from a second connection.
        let side = rusqlite::Connection::open(&path).unwrap();
        side.execute_batch(
            "CREATE TRIGGER reject_last_diff BEFORE UPDATE ON screenshots
             WHEN OLD.timestamp = 300
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();
        drop(side);

        let mut chain = chain(&store);
        let engine = CountingEngine::default();
        let err = save_screenshot_diffs(&store, &mut chain, &engine).unwrap_err();
        assert!(matches!(
            err,
            TapedeckError::CommitFailed {
                kind: EntityKind::Screenshot,
                rows: 3,
                ..
            }
        ));
        assert!(err.is_retryable());
        assert_eq!(engine.differences.get(), 3);

        assert!(
            chain
                .iter()
                .all(|s| s.png_diff_data.is_none() && s.png_diff_mask_data.is_none())
        );
        assert!(
            store
                .screenshots(REC)
                .unwrap()
                .iter()
                .all(|s| s.png_diff_data.is_none() && s.png_diff_mask_data.is_none())
        );
    }

    #[test]
    fn test_single_frame_needs_nothing() {
        let store = store_with_frames(&[b"only"]);
        let mut chain = chain(&store);
        let report = save_screenshot_diffs(&store, &mut chain, &CountingEngine::default()).unwrap();
        assert!(!report.computed_anything());
        assert!(!report.persisted);
    }

    #[test]
    fn test_persisted_diffs_are_never_overwritten() {
        let store = store_with_frames(&[b"a", b"b"]);
        let engine = CountingEngine::default();
        let mut chain = chain(&store);
        save_screenshot_diffs(&store, &mut chain, &engine).unwrap();

        let mut tampered = chain.as_slice()[1].clone();
        tampered.png_diff_data = Some(b"other".to_vec());
        store.persist_screenshot_diffs(&[&tampered]).unwrap();

        let stored = store.screenshots(REC).unwrap();
        assert_eq!(stored[1].png_diff_data.as_deref(), Some(&b"diff:b-a"[..]));
    }
}
