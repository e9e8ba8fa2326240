use super::types::{LogLevel, LogRecord, LogSink};

/// A `tracing`-based sink that emits one event per log record.
///
/// Events use target `dmlkit.sql`; the record's fields are rendered into `fields`.
///
/// Enable via the crate feature: `dmlkit = { features = ["tracing"] }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Create a new sink.
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Debug => tracing::enabled!(target: "dmlkit.sql", tracing::Level::DEBUG),
            LogLevel::Info => tracing::enabled!(target: "dmlkit.sql", tracing::Level::INFO),
            LogLevel::Warn => tracing::enabled!(target: "dmlkit.sql", tracing::Level::WARN),
        }
    }

    fn log(&self, record: &LogRecord) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    LogLevel::Debug => tracing::debug!($($field)*),
                    LogLevel::Info => tracing::info!($($field)*),
                    LogLevel::Warn => tracing::warn!($($field)*),
                }
            };
        }

        let mut fields = String::new();
        for (i, (key, value)) in record.fields.iter().enumerate() {
            if i > 0 {
                fields.push(' ');
            }
            fields.push_str(key);
            fields.push_str(": ");
            fields.push_str(&value.to_string());
        }
        emit_at_level!(
            record.level,
            target: "dmlkit.sql",
            event = record.event.as_str(),
            fields = %fields,
        );
    }
}
