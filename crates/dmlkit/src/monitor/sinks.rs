use super::types::{LogLevel, LogRecord, LogSink};
use std::sync::{Arc, Mutex};

/// A sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn enabled(&self, _level: LogLevel) -> bool {
        false
    }

    fn log(&self, _record: &LogRecord) {}
}

/// Collects formatted records in memory, one line per record.
///
/// Cloning shares the buffer, so a test can keep a handle while the pool owns the sink.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formatted lines in emission order.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// All lines joined with `\n`.
    pub fn contents(&self) -> String {
        self.lines().join("\n")
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl LogSink for BufferSink {
    fn log(&self, record: &LogRecord) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.to_string());
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
    }
}
