//! In-memory diagnostics capture.
//!
//! [`DiagnosticsCollector`] is a `tracing` layer that keeps recent events in a
//! bounded ring buffer, tagged with the `engine_id` field when present.
//! Nothing in this crate raises user-visible errors, so captured warnings are
//! how a host finds out why an interface never became interactive.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// A single captured event.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Seconds since the collector was created.
    pub elapsed_secs: f64,
    pub level: Level,
    pub target: String,
    pub message: String,
    /// The `engine_id` field, if the event carried one.
    pub engine_id: Option<String>,
}

#[derive(Debug)]
struct DiagnosticBuffer {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
    start_time: std::time::Instant,
}

impl DiagnosticBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            start_time: std::time::Instant::now(),
        }
    }

    fn push(&mut self, level: Level, target: String, fields: EventFields) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Diagnostic {
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
            level,
            target,
            message: fields.message,
            engine_id: fields.engine_id,
        });
    }
}

/// A `tracing` layer capturing events into a shared ring buffer.
#[derive(Debug, Clone)]
pub struct DiagnosticsCollector {
    buffer: Arc<Mutex<DiagnosticBuffer>>,
}

impl DiagnosticsCollector {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(DiagnosticBuffer::new(capacity))),
        }
    }

    pub fn reader(&self) -> DiagnosticsReader {
        DiagnosticsReader {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticsCollector {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut fields = EventFields::default();
        event.record(&mut fields);

        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(*metadata.level(), metadata.target().to_string(), fields);
        }
    }
}

/// Read handle for captured diagnostics.
#[derive(Debug, Clone)]
pub struct DiagnosticsReader {
    buffer: Arc<Mutex<DiagnosticBuffer>>,
}

impl DiagnosticsReader {
    /// Snapshot of every captured event, oldest first.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.buffer
            .lock()
            .map(|buf| buf.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Captured events at WARN or more severe.
    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.entries()
            .into_iter()
            .filter(|d| d.level <= Level::WARN)
            .collect()
    }

    /// Captured events tagged with `engine_id`.
    pub fn for_engine(&self, engine_id: &str) -> Vec<Diagnostic> {
        self.entries()
            .into_iter()
            .filter(|d| d.engine_id.as_deref() == Some(engine_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct EventFields {
    message: String,
    engine_id: Option<String>,
}

impl Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "engine_id" => self.engine_id = Some(format!("{value:?}")),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "engine_id" => self.engine_id = Some(value.to_string()),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    #[test]
    fn test_captures_engine_id() {
        let collector = DiagnosticsCollector::new(16);
        let reader = collector.reader();
        let _guard = tracing_subscriber::registry().with(collector).set_default();

        let id = "case-assist-engine";
        tracing::warn!(engine_id = %id, "Configuration unavailable");
        tracing::info!("unrelated");

        let entries = reader.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].engine_id.as_deref(), Some("case-assist-engine"));
        assert_eq!(entries[0].message, "Configuration unavailable");
        assert_eq!(entries[1].engine_id, None);
        assert_eq!(reader.warnings().len(), 1);
        assert_eq!(reader.for_engine(id).len(), 1);
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let collector = DiagnosticsCollector::new(2);
        let reader = collector.reader();
        let _guard = tracing_subscriber::registry().with(collector).set_default();

        tracing::info!("one");
        tracing::info!("two");
        tracing::info!("three");

        let entries = reader.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "two");
    }

    #[test]
    fn test_empty_reader() {
        let reader = DiagnosticsCollector::new(4).reader();
        assert!(reader.is_empty());
        assert!(reader.warnings().is_empty());
    }
}
