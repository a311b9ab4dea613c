//! End-to-end tests: capture through the writer, read back through a timeline.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::num::NonZeroUsize;
use tapedeck_core::{
    changed_ratio, BufferMode, EntityKind, EventWriter, Fields, PipelineConfig, RecordingStore,
    SqlValue, TapedeckError, TimeRange, Timeline, TrimOutcome,
};
use tapedeck_types::{ActionName, NewActionEvent, NewRecording, NewScreenshot, NewWindowEvent};
use tempfile::TempDir;

const REC: i64 = 1_717_000_000_000;

fn png(width: u32, height: u32, lit: &[(u32, u32)]) -> Vec<u8> {
    let mut img = RgbImage::from_pixel(width, height, Rgb([20, 20, 20]));
    for &(x, y) in lit {
        img.put_pixel(x, y, Rgb([240, 240, 240]));
    }
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn open_store(dir: &TempDir) -> RecordingStore {
    RecordingStore::open(&dir.path().join("timeline.db")).unwrap()
}

/// Type `text`, then press and release each key of `stop` like an operator would.
fn record_session(store: &RecordingStore, config: &PipelineConfig, text: &str, stop: &[&str]) {
    store
        .insert_recording(&NewRecording::named(REC, "integration"))
        .unwrap();
    let mut writer = EventWriter::new(store, config.batch_size);
    let mut ts = REC;
    let mut next = || {
        ts += 10;
        ts
    };

    writer
        .insert_window_event(REC, next(), NewWindowEvent::titled("Editor", 0, 0, 800, 600))
        .unwrap();
    for (i, ch) in text.chars().enumerate() {
        let ch = ch.to_string();
        writer
            .insert_action_event(REC, next(), NewActionEvent::key_char(ActionName::Press, &ch))
            .unwrap();
        writer
            .insert_action_event(REC, next(), NewActionEvent::key_char(ActionName::Release, &ch))
            .unwrap();
        let lit: Vec<(u32, u32)> = (0..=i as u32).map(|x| (x % 8, 0)).collect();
        writer
            .insert_screenshot(REC, next(), NewScreenshot::new(png(8, 4, &lit)))
            .unwrap();
    }
    for key in stop {
        let (press, release) = if key.chars().count() == 1 {
            (
                NewActionEvent::key_char(ActionName::Press, key),
                NewActionEvent::key_char(ActionName::Release, key),
            )
        } else {
            (
                NewActionEvent::key_name(ActionName::Press, key),
                NewActionEvent::key_name(ActionName::Release, key),
            )
        };
        writer.insert_action_event(REC, next(), press).unwrap();
        writer.insert_action_event(REC, next(), release).unwrap();
    }
    writer.insert_perf_stat(REC, "action", 1.0, 1.25).unwrap();
    writer.insert_memory_stat(REC, 64 * 1024 * 1024, next()).unwrap();
    writer.flush_all().unwrap();
}

#[test]
fn typed_stop_string_is_trimmed() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let config = PipelineConfig {
        batch_size: NonZeroUsize::new(4).unwrap(),
        ..Default::default()
    };
    let stop: Vec<String> = "td.stop".chars().map(String::from).collect();
    let stop: Vec<&str> = stop.iter().map(String::as_str).collect();
    record_session(&store, &config, "hi", &stop);

    let timeline = Timeline::new(&store, &config);
    let trimmed = timeline.trimmed_action_events(REC).unwrap();
    assert_eq!(
        trimmed.outcome,
        TrimOutcome::Sequence {
            index: 0,
            removed: 14
        }
    );
    assert_eq!(trimmed.events.len(), 4);
    assert_eq!(store.action_events(REC).unwrap().len(), 18);
    assert!(trimmed.events.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn special_sequence_is_trimmed() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let config = PipelineConfig::default();
    record_session(&store, &config, "ok", &["ctrl", "ctrl", "ctrl"]);

    let events = Timeline::new(&store, &config).action_events(REC).unwrap();
    let typed: String = events
        .iter()
        .filter(|e| e.name == ActionName::Press)
        .filter_map(|e| e.key_char.clone())
        .collect();
    assert_eq!(typed, "ok");
    assert_eq!(events.len(), 4);
}

#[test]
fn unmatched_tail_is_untouched() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let config = PipelineConfig::default();
    record_session(&store, &config, "abc", &[]);

    let trimmed = Timeline::new(&store, &config)
        .trimmed_action_events(REC)
        .unwrap();
    assert_eq!(trimmed.outcome, TrimOutcome::Untouched);
    assert_eq!(trimmed.events.len(), 6);
}

#[test]
fn diff_pass_on_real_captures_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        save_screenshot_diff: true,
        ..Default::default()
    };
    {
        let store = open_store(&dir);
        record_session(&store, &config, "abc", &[]);
        let chain = Timeline::new(&store, &config).screenshots(REC).unwrap();
        assert_eq!(chain.len(), 3);
        assert!(chain.get(0).unwrap().png_diff_data.is_none());
        assert_eq!(chain.prev(0).timestamp, chain.get(0).unwrap().timestamp);
    }

    let store = open_store(&dir);
    let (chain, report) = Timeline::new(&store, &PipelineConfig::default())
        .compute_screenshot_diffs(REC)
        .unwrap();
    assert!(!report.persisted);

    // Each capture lights exactly one more pixel of 32.
    for shot in chain.iter().skip(1) {
        let mask = shot.png_diff_mask_data.as_deref().unwrap();
        assert_eq!(changed_ratio(mask).unwrap(), 1.0 / 32.0);
    }
}

#[test]
fn schema_violation_commits_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store
        .insert_recording(&NewRecording::named(REC, "strict"))
        .unwrap();
    let mut writer = EventWriter::new(&store, NonZeroUsize::MIN);

    let mut fields = Fields::new();
    fields.insert("memory_usage_bytes".into(), SqlValue::Integer(1));
    fields.insert("swap_bytes".into(), SqlValue::Integer(2));
    let err = writer
        .insert(EntityKind::MemoryStat, REC, Some(REC + 1), fields, BufferMode::Immediate)
        .unwrap_err();
    assert!(matches!(err, TapedeckError::SchemaViolation { .. }));
    assert!(!err.is_retryable());
    assert_eq!(store.count(EntityKind::MemoryStat, REC).unwrap(), 0);
}

#[test]
fn orphan_rows_fail_and_stay_queued() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut writer = EventWriter::new(&store, NonZeroUsize::new(2).unwrap());

    writer
        .insert_action_event(REC, REC + 1, NewActionEvent::click(1.0, 2.0, "left", true))
        .unwrap();
    let err = writer
        .insert_action_event(REC, REC + 2, NewActionEvent::click(1.0, 2.0, "left", false))
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(writer.pending(EntityKind::ActionEvent), 2);

    store
        .insert_recording(&NewRecording::named(REC, "late"))
        .unwrap();
    let receipt = writer.flush(EntityKind::ActionEvent).unwrap().unwrap();
    assert_eq!(receipt.rows, 2);
    assert_eq!(writer.pending(EntityKind::ActionEvent), 0);

    let range = TimeRange::new(REC + 2, REC + 2);
    let late = store.action_events_between(REC, range).unwrap();
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].mouse_pressed, Some(false));
}
