use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
        }
    }
}

/// The operation a log record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    Exec,
    Query,
    Prepare,
    Close,
    BeginTx,
    Commit,
    Rollback,
}

impl LogEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            LogEvent::Exec => "Exec",
            LogEvent::Query => "Query",
            LogEvent::Prepare => "Prepare",
            LogEvent::Close => "Close",
            LogEvent::BeginTx => "BeginTx",
            LogEvent::Commit => "Commit",
            LogEvent::Rollback => "Rollback",
        }
    }
}

/// A structured field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Uint(u64),
    Duration(Duration),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => write!(f, "{s:?}"),
            FieldValue::Uint(n) => write!(f, "{n}"),
            FieldValue::Duration(d) => write!(f, "{d:?}"),
        }
    }
}

/// One structured log record; fields keep insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub event: LogEvent,
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl LogRecord {
    pub fn new(level: LogLevel, event: LogEvent) -> Self {
        Self {
            level,
            event,
            fields: Vec::with_capacity(8),
        }
    }

    pub fn str(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((key, FieldValue::Str(value.into())));
        self
    }

    pub fn uint(mut self, key: &'static str, value: u64) -> Self {
        self.fields.push((key, FieldValue::Uint(value)));
        self
    }

    pub fn duration(mut self, key: &'static str, value: Duration) -> Self {
        self.fields.push((key, FieldValue::Duration(value)));
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Renders `DEBUG Exec conn_pool_id: "UNIQ04" table: "dml_people" ...`.
impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.level.as_str(), self.event.as_str())?;
        for (key, value) in &self.fields {
            write!(f, " {key}: {value}")?;
        }
        Ok(())
    }
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    /// Cheap check before a record is built.
    fn enabled(&self, _level: LogLevel) -> bool {
        true
    }

    fn log(&self, record: &LogRecord);
}

/// Source of pool, connection, transaction and statement ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_id(&self) -> String {
        self()
    }
}

/// Process-monotonic counter; the default [`IdGenerator`].
#[derive(Debug, Default)]
pub struct CounterIds {
    next: AtomicU64,
}

impl CounterIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for CounterIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{n:06}")
    }
}
