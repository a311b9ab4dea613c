//! Inspection commands. Each writes its report to `out`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::Write;
use tapedeck_core::{DiffEngine, EntityKind, Predecessor, Timeline, TrimOutcome};
use tapedeck_types::Recording;

/// The recording at `timestamp`, or the latest one when none is given.
pub fn resolve_recording<D: DiffEngine>(
    timeline: &Timeline<'_, D>,
    timestamp: Option<i64>,
) -> Result<Recording> {
    match timestamp {
        Some(ts) => Ok(timeline.recording(ts)?),
        None => timeline
            .latest_recording()?
            .context("No recordings in database"),
    }
}

pub fn recordings<D: DiffEngine>(timeline: &Timeline<'_, D>, out: &mut impl Write) -> Result<()> {
    let recordings = timeline.recordings()?;
    if recordings.is_empty() {
        writeln!(out, "No recordings")?;
        return Ok(());
    }
    for rec in recordings {
        writeln!(
            out,
            "{}  {}  {}  {}",
            rec.timestamp,
            started(&rec),
            rec.platform.as_deref().unwrap_or("-"),
            rec.task_description.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

pub fn summary<D: DiffEngine>(
    timeline: &Timeline<'_, D>,
    recording: Option<i64>,
    out: &mut impl Write,
) -> Result<()> {
    let rec = resolve_recording(timeline, recording)?;
    let store = timeline.store();
    let trimmed = timeline.trimmed_action_events(rec.timestamp)?;
    let raw = trimmed.events.len() + trimmed.outcome.removed();

    writeln!(out, "recording      {} ({})", rec.timestamp, started(&rec))?;
    if let Some(task) = &rec.task_description {
        writeln!(out, "task           {}", task)?;
    }
    if let (Some(w), Some(h)) = (rec.monitor_width, rec.monitor_height) {
        writeln!(out, "monitor        {}x{}", w, h)?;
    }
    writeln!(
        out,
        "actions        {} ({} raw, {})",
        trimmed.events.len(),
        raw,
        describe_trim(trimmed.outcome)
    )?;
    for (label, kind) in [
        ("screenshots", EntityKind::Screenshot),
        ("window events", EntityKind::WindowEvent),
        ("perf stats", EntityKind::PerformanceStat),
        ("memory stats", EntityKind::MemoryStat),
    ] {
        writeln!(out, "{:<15}{}", label, store.count(kind, rec.timestamp)?)?;
    }
    Ok(())
}

pub fn events<D: DiffEngine>(
    timeline: &Timeline<'_, D>,
    recording: Option<i64>,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let rec = resolve_recording(timeline, recording)?;
    for event in timeline.action_events(rec.timestamp)? {
        if json {
            serde_json::to_writer(&mut *out, &event)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}  {}", offset(&rec, event.timestamp), event)?;
        }
    }
    Ok(())
}

pub fn screenshots<D: DiffEngine>(
    timeline: &Timeline<'_, D>,
    recording: Option<i64>,
    force_diff: bool,
    out: &mut impl Write,
) -> Result<()> {
    let rec = resolve_recording(timeline, recording)?;
    let chain = if force_diff {
        let (chain, report) = timeline.compute_screenshot_diffs(rec.timestamp)?;
        tracing::info!(
            target: "tapedeck::diff",
            "Computed {} diff(s) and {} mask(s)",
            report.diffs_computed,
            report.masks_computed
        );
        chain
    } else {
        timeline.screenshots(rec.timestamp)?
    };

    for (i, shot) in chain.iter().enumerate() {
        let prev = match chain.predecessor(i) {
            Predecessor::IsFirst => "first".to_string(),
            Predecessor::At(_) => format!("prev={}", chain.prev(i).timestamp),
        };
        let diff = match (&shot.png_diff_data, &shot.png_diff_mask_data) {
            (Some(_), Some(_)) => "diff+mask",
            (Some(_), None) => "diff",
            (None, Some(_)) => "mask",
            (None, None) => "-",
        };
        writeln!(
            out,
            "{}  {} bytes  {}  {}",
            shot.timestamp,
            shot.png_data.len(),
            prev,
            diff
        )?;
    }
    Ok(())
}

pub fn stats<D: DiffEngine>(
    timeline: &Timeline<'_, D>,
    recording: Option<i64>,
    out: &mut impl Write,
) -> Result<()> {
    let rec = resolve_recording(timeline, recording)?;

    let perf = timeline.perf_stats(rec.timestamp)?;
    writeln!(out, "performance ({})", perf.len())?;
    for stat in &perf {
        writeln!(
            out,
            "  {:<20} {:.3}s{}",
            stat.event_type,
            stat.duration(),
            stat.window_id
                .as_deref()
                .map(|w| format!("  window={}", w))
                .unwrap_or_default()
        )?;
    }

    let memory = timeline.memory_stats(rec.timestamp)?;
    writeln!(out, "memory ({})", memory.len())?;
    for stat in &memory {
        writeln!(
            out,
            "  {}  {:.1} MiB",
            stat.timestamp,
            stat.memory_usage_bytes as f64 / (1024.0 * 1024.0)
        )?;
    }
    Ok(())
}

fn started(rec: &Recording) -> String {
    rec.started_at()
        .map(|t: DateTime<Utc>| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Time relative to the recording start, e.g. `+1.250s` or `-0.250s`.
fn offset(rec: &Recording, timestamp: i64) -> String {
    let ms = timestamp - rec.timestamp;
    let sign = if ms < 0 { '-' } else { '+' };
    let ms = ms.unsigned_abs();
    format!("{}{}.{:03}s", sign, ms / 1000, ms % 1000)
}

fn describe_trim(outcome: TrimOutcome) -> String {
    match outcome {
        TrimOutcome::CtrlC => "ctrl+c removed".to_string(),
        TrimOutcome::Sequence { index, removed } => {
            format!("stop sequence {} removed {} event(s)", index, removed)
        }
        TrimOutcome::Untouched => "no stop gesture".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(timestamp: i64) -> Recording {
        Recording {
            id: 1,
            timestamp,
            monitor_width: None,
            monitor_height: None,
            double_click_interval_seconds: None,
            double_click_distance_pixels: None,
            platform: None,
            task_description: None,
        }
    }

    #[test]
    fn test_started_formats_utc() {
        assert_eq!(started(&recording(0)), "1970-01-01 00:00:00 UTC");
    }

    #[test]
    fn test_offset_keeps_sign_for_early_events() {
        let rec = recording(10_000);
        assert_eq!(offset(&rec, 11_250), "+1.250s");
        assert_eq!(offset(&rec, 10_000), "+0.000s");
        assert_eq!(offset(&rec, 9_750), "-0.250s");
        assert_eq!(offset(&rec, 7_999), "-2.001s");
    }

    #[test]
    fn test_describe_trim() {
        assert_eq!(describe_trim(TrimOutcome::CtrlC), "ctrl+c removed");
        assert_eq!(
            describe_trim(TrimOutcome::Sequence {
                index: 1,
                removed: 6
            }),
            "stop sequence 1 removed 6 event(s)"
        );
    }
}
