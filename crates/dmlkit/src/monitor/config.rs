use std::time::Duration;

/// Configuration for statement logging.
///
/// By default durations are logged and no slow-statement threshold is set.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Statements slower than this are logged at WARN instead of DEBUG.
    pub slow_query_threshold: Option<Duration>,
    /// Whether the `duration` field is emitted. Tests turn this off for stable output.
    pub log_durations: bool,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold: None,
            log_durations: true,
            max_sql_length: None,
        }
    }
}

impl MonitorConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slow statement threshold.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// Set maximum SQL length to log.
    pub fn with_max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Omit durations from log records.
    pub fn without_durations(mut self) -> Self {
        self.log_durations = false;
        self
    }
}
