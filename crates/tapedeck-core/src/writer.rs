//! Batched event writer.
//!
//! Capture producers hand the writer one record at a time. Each entity kind
//! has its own queue; a queue is committed as a single transaction once it
//! holds `batch_size` rows and is cleared only after the commit succeeds, so
//! a failed commit can be retried with [`EventWriter::flush`].

use crate::db::{InsertReceipt, RecordingStore};
use crate::schema::{EntityKind, Fields, IntoFields, RECORDING_TIMESTAMP, TIMESTAMP};
use crate::{Result, TapedeckError};
use rusqlite::types::Value;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tapedeck_types::{NewActionEvent, NewScreenshot, NewWindowEvent};

/// Whether an insert goes through the kind's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    /// Queue the row; commit when the queue reaches the batch size.
    Buffered,
    /// Commit this row alone, right away.
    Immediate,
}

/// Per-session writer owning one pending queue per entity kind.
pub struct EventWriter<'s> {
    store: &'s RecordingStore,
    batch_size: NonZeroUsize,
    buffers: HashMap<EntityKind, Vec<Fields>>,
}

impl<'s> EventWriter<'s> {
    pub fn new(store: &'s RecordingStore, batch_size: NonZeroUsize) -> Self {
        Self {
            store,
            batch_size,
            buffers: HashMap::new(),
        }
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    /// Number of rows queued for `kind` and not yet committed.
    pub fn pending(&self, kind: EntityKind) -> usize {
        self.buffers.get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Insert one record of `kind`.
    ///
    /// `recording_timestamp` and, when given, `event_timestamp` are injected
    /// into `fields` (overriding caller values) before validation. Returns
    /// the receipt of the commit this call triggered, or `None` if the row
    /// was only queued.
    pub fn insert(
        &mut self,
        kind: EntityKind,
        recording_timestamp: i64,
        event_timestamp: Option<i64>,
        mut fields: Fields,
        mode: BufferMode,
    ) -> Result<Option<InsertReceipt>> {
        fields.insert(
            RECORDING_TIMESTAMP.to_string(),
            Value::Integer(recording_timestamp),
        );
        if let Some(ts) = event_timestamp {
            fields.insert(TIMESTAMP.to_string(), Value::Integer(ts));
        }
        validate(kind, &fields)?;

        match mode {
            BufferMode::Immediate => {
                let receipt = self.store.commit_rows(kind, std::slice::from_ref(&fields))?;
                Ok(Some(receipt))
            }
            BufferMode::Buffered => {
                let queue = self.buffers.entry(kind).or_default();
                queue.push(fields);
                tracing::trace!(
                    target: "tapedeck::writer",
                    "Queued {} row ({} pending)",
                    kind,
                    queue.len()
                );
                if queue.len() >= self.batch_size.get() {
                    self.flush(kind)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Commit everything queued for `kind`, regardless of the batch size.
    ///
    /// On failure the queue keeps its rows.
    pub fn flush(&mut self, kind: EntityKind) -> Result<Option<InsertReceipt>> {
        let Some(queue) = self.buffers.get_mut(&kind) else {
            return Ok(None);
        };
        if queue.is_empty() {
            return Ok(None);
        }
        match self.store.commit_rows(kind, queue) {
            Ok(receipt) => {
                queue.clear();
                Ok(Some(receipt))
            }
            Err(e) => {
                tracing::warn!(
                    target: "tapedeck::writer",
                    "Commit of {} queued {} row(s) failed; keeping them for retry",
                    queue.len(),
                    kind
                );
                Err(e)
            }
        }
    }

    /// Flush every kind's queue. Stops at the first failure.
    pub fn flush_all(&mut self) -> Result<Vec<InsertReceipt>> {
        let mut receipts = Vec::new();
        for kind in EntityKind::ALL {
            if let Some(receipt) = self.flush(kind)? {
                receipts.push(receipt);
            }
        }
        Ok(receipts)
    }

    fn insert_typed<T: IntoFields>(
        &mut self,
        recording_timestamp: i64,
        event_timestamp: i64,
        payload: T,
    ) -> Result<Option<InsertReceipt>> {
        self.insert(
            T::KIND,
            recording_timestamp,
            Some(event_timestamp),
            payload.into_fields(),
            BufferMode::Buffered,
        )
    }

    pub fn insert_action_event(
        &mut self,
        recording_timestamp: i64,
        event_timestamp: i64,
        event: NewActionEvent,
    ) -> Result<Option<InsertReceipt>> {
        self.insert_typed(recording_timestamp, event_timestamp, event)
    }

    pub fn insert_screenshot(
        &mut self,
        recording_timestamp: i64,
        event_timestamp: i64,
        screenshot: NewScreenshot,
    ) -> Result<Option<InsertReceipt>> {
        self.insert_typed(recording_timestamp, event_timestamp, screenshot)
    }

    pub fn insert_window_event(
        &mut self,
        recording_timestamp: i64,
        event_timestamp: i64,
        window: NewWindowEvent,
    ) -> Result<Option<InsertReceipt>> {
        self.insert_typed(recording_timestamp, event_timestamp, window)
    }

    /// Record how long handling one recorder event took.
    pub fn insert_perf_stat(
        &mut self,
        recording_timestamp: i64,
        event_type: &str,
        start_time: f64,
        end_time: f64,
    ) -> Result<Option<InsertReceipt>> {
        let mut fields = Fields::new();
        fields.insert("event_type".into(), Value::Text(event_type.to_string()));
        fields.insert("start_time".into(), Value::Real(start_time));
        fields.insert("end_time".into(), Value::Real(end_time));
        self.insert(
            EntityKind::PerformanceStat,
            recording_timestamp,
            None,
            fields,
            BufferMode::Buffered,
        )
    }

    pub fn insert_memory_stat(
        &mut self,
        recording_timestamp: i64,
        memory_usage_bytes: i64,
        timestamp: i64,
    ) -> Result<Option<InsertReceipt>> {
        let mut fields = Fields::new();
        fields.insert("memory_usage_bytes".into(), Value::Integer(memory_usage_bytes));
        self.insert(
            EntityKind::MemoryStat,
            recording_timestamp,
            Some(timestamp),
            fields,
            BufferMode::Buffered,
        )
    }
}

impl Drop for EventWriter<'_> {
    fn drop(&mut self) {
        for (kind, queue) in &self.buffers {
            if !queue.is_empty() {
                tracing::warn!(
                    target: "tapedeck::writer",
                    "Writer dropped with {} unflushed {} row(s)",
                    queue.len(),
                    kind
                );
            }
        }
    }
}

fn validate(kind: EntityKind, fields: &Fields) -> Result<()> {
    if let Some(unknown) = fields.keys().find(|f| !kind.has_column(f)) {
        return Err(TapedeckError::SchemaViolation {
            kind,
            field: unknown.clone(),
            reason: "is not a declared column",
        });
    }
    if kind.has_timestamp() && !fields.contains_key(TIMESTAMP) {
        return Err(TapedeckError::SchemaViolation {
            kind,
            field: TIMESTAMP.to_string(),
            reason: "is required but missing",
        });
    }
    Ok(())
}
