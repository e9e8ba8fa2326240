//! Structured logging around every I/O operation.
//!
//! Each exec, query, prepare, close, begin, commit and rollback emits one
//! [`LogRecord`] carrying correlation ids:
//! - `conn_pool_id`: the pool the operation ran on
//! - `conn_id` / `tx_id`: when run on an explicit connection or a transaction
//! - `<kind>_id`: the statement id, also embedded in the SQL as `/*ID:..*/`
//!
//! Executions log the SQL text only when it was interpolated; placeholder
//! executions log `arg_len` so bound values never reach the log.
//!
//! # Example
//!
//! ```rust,ignore
//! use dmlkit::monitor::{BufferSink, Logger, MonitorConfig};
//!
//! let sink = BufferSink::new();
//! let logger = Logger::new(sink.clone())
//!     .with_id_generator(|| "UNIQ".to_string())
//!     .with_config(MonitorConfig::new().without_durations());
//! let pool = ConnPool::with_logger(connector, PoolConfig::new(), logger)?;
//! ```

mod config;
mod sinks;
mod types;

#[cfg(feature = "tracing")]
mod tracing_hook;

#[cfg(test)]
mod tests;

pub use config::MonitorConfig;
pub use sinks::{BufferSink, NoopSink};
pub use types::{CounterIds, FieldValue, IdGenerator, LogEvent, LogLevel, LogRecord, LogSink};

#[cfg(feature = "tracing")]
pub use tracing_hook::TracingSink;

use crate::error::DmlError;
use crate::qb::StatementMeta;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Sink, id source and config shared by a pool and everything derived from it.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    ids: Arc<dyn IdGenerator>,
    config: MonitorConfig,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            sink: Arc::new(NoopSink),
            ids: Arc::new(CounterIds::new()),
            config: MonitorConfig::default(),
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("enabled", &self.is_enabled())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Logger {
    pub fn new(sink: impl LogSink + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            ..Self::default()
        }
    }

    /// A logger that emits nothing.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Replace the id source, e.g. with a deterministic one in tests.
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.enabled(LogLevel::Debug)
    }

    pub fn next_id(&self) -> String {
        self.ids.next_id()
    }

    fn emit(&self, record: &LogRecord) {
        if self.sink.enabled(record.level) {
            self.sink.log(record);
        }
    }

    fn level_for(&self, elapsed: Duration, failed: bool) -> LogLevel {
        let slow = self
            .config
            .slow_query_threshold
            .is_some_and(|threshold| elapsed > threshold);
        if failed || slow {
            LogLevel::Warn
        } else {
            LogLevel::Debug
        }
    }
}

/// Correlation ids of a pool, connection or transaction plus its logger.
#[derive(Debug, Clone)]
pub struct LogScope {
    logger: Logger,
    pool_id: Arc<str>,
    conn_id: Option<Arc<str>>,
    tx_id: Option<Arc<str>>,
}

impl LogScope {
    pub(crate) fn pool(logger: Logger) -> Self {
        let pool_id = Arc::from(logger.next_id());
        Self {
            logger,
            pool_id,
            conn_id: None,
            tx_id: None,
        }
    }

    /// Scope of a newly checked-out connection.
    pub(crate) fn conn(&self) -> Self {
        Self {
            conn_id: Some(Arc::from(self.logger.next_id())),
            tx_id: None,
            ..self.clone()
        }
    }

    /// Scope of a newly started transaction.
    pub(crate) fn tx(&self) -> Self {
        Self {
            tx_id: Some(Arc::from(self.logger.next_id())),
            ..self.clone()
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    pub fn conn_id(&self) -> Option<&str> {
        self.conn_id.as_deref()
    }

    pub fn tx_id(&self) -> Option<&str> {
        self.tx_id.as_deref()
    }

    /// A fresh statement id, only when records are actually emitted.
    pub(crate) fn statement_id(&self) -> Option<String> {
        self.logger.is_enabled().then(|| self.logger.next_id())
    }

    fn record(&self, level: LogLevel, event: LogEvent) -> LogRecord {
        let mut record = LogRecord::new(level, event).str("conn_pool_id", &*self.pool_id);
        if let Some(conn_id) = &self.conn_id {
            record = record.str("conn_id", &**conn_id);
        }
        if let Some(tx_id) = &self.tx_id {
            record = record.str("tx_id", &**tx_id);
        }
        record
    }

    fn sql_field(&self, sql: &str) -> String {
        match self.logger.config.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    /// Log one statement operation.
    pub(crate) fn statement(
        &self,
        event: LogEvent,
        meta: &StatementMeta,
        elapsed: Duration,
        sql: &str,
        arg_len: usize,
        error: Option<&DmlError>,
    ) {
        let level = self.logger.level_for(elapsed, error.is_some());
        if !self.logger.sink.enabled(level) {
            return;
        }
        let mut record = self.record(level, event);
        if let Some(id) = &meta.id {
            record = record.str(meta.kind.id_field(), id.as_str());
        }
        if !meta.table.is_empty() {
            record = record.str("table", meta.table.as_str());
        }
        if self.logger.config.log_durations {
            record = record.duration("duration", elapsed);
        }
        record = if meta.interpolated {
            record.str("sql", self.sql_field(sql))
        } else {
            record.uint("arg_len", arg_len as u64)
        };
        if let Some(error) = error {
            record = record.str("error", error.to_string());
        }
        self.logger.emit(&record);
    }

    /// Log a transaction boundary.
    pub(crate) fn transaction(
        &self,
        event: LogEvent,
        elapsed: Option<Duration>,
        error: Option<&DmlError>,
    ) {
        let level = self
            .logger
            .level_for(elapsed.unwrap_or_default(), error.is_some());
        if !self.logger.sink.enabled(level) {
            return;
        }
        let mut record = self.record(level, event);
        if let Some(elapsed) = elapsed
            && self.logger.config.log_durations
        {
            record = record.duration("duration", elapsed);
        }
        if let Some(error) = error {
            record = record.str("error", error.to_string());
        }
        self.logger.emit(&record);
    }

    /// Log an event with a free-form message, e.g. an abandoned transaction.
    pub(crate) fn warn(&self, event: LogEvent, message: &str) {
        if !self.logger.sink.enabled(LogLevel::Warn) {
            return;
        }
        let record = self.record(LogLevel::Warn, event).str("message", message);
        self.logger.emit(&record);
    }
}
