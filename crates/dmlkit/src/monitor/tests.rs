use super::*;
use crate::qb::{StatementKind, StatementMeta};
use std::sync::atomic::{AtomicUsize, Ordering};

fn fixed_ids() -> impl IdGenerator {
    let n = AtomicUsize::new(0);
    move || format!("UNIQ{:02}", n.fetch_add(1, Ordering::Relaxed) * 4)
}

fn test_logger(sink: &BufferSink) -> Logger {
    Logger::new(sink.clone())
        .with_id_generator(fixed_ids())
        .with_config(MonitorConfig::new().without_durations())
}

fn meta(kind: StatementKind, id: Option<&str>, interpolated: bool) -> StatementMeta {
    StatementMeta {
        kind,
        id: id.map(str::to_string),
        table: "dml_people".to_string(),
        interpolated,
    }
}

#[test]
fn record_display_keeps_field_order() {
    let record = LogRecord::new(LogLevel::Debug, LogEvent::Exec)
        .str("conn_pool_id", "UNIQ04")
        .str("table", "dml_people")
        .uint("arg_len", 2);
    assert_eq!(
        record.to_string(),
        r#"DEBUG Exec conn_pool_id: "UNIQ04" table: "dml_people" arg_len: 2"#
    );
    assert_eq!(record.field("arg_len"), Some(&FieldValue::Uint(2)));
    assert_eq!(record.field("sql"), None);
}

#[test]
fn placeholder_statement_logs_arg_len() {
    let sink = BufferSink::new();
    let scope = LogScope::pool(test_logger(&sink));
    scope.statement(
        LogEvent::Exec,
        &meta(StatementKind::Insert, Some("UNIQ04"), false),
        Duration::from_millis(3),
        "INSERT INTO `dml_people` (`name`) VALUES (?)",
        1,
        None,
    );
    assert_eq!(
        sink.lines(),
        vec![r#"DEBUG Exec conn_pool_id: "UNIQ00" insert_id: "UNIQ04" table: "dml_people" arg_len: 1"#]
    );
}

#[test]
fn interpolated_statement_logs_sql() {
    let sink = BufferSink::new();
    let scope = LogScope::pool(test_logger(&sink));
    let conn = scope.conn();
    conn.statement(
        LogEvent::Query,
        &meta(StatementKind::Select, None, true),
        Duration::ZERO,
        "SELECT * FROM `dml_people` WHERE `id` = 1",
        0,
        None,
    );
    assert_eq!(
        sink.contents(),
        r#"DEBUG Query conn_pool_id: "UNIQ00" conn_id: "UNIQ04" table: "dml_people" sql: "SELECT * FROM `dml_people` WHERE `id` = 1""#
    );
}

#[test]
fn failed_statement_logs_warn_with_error() {
    let sink = BufferSink::new();
    let scope = LogScope::pool(test_logger(&sink));
    let err = DmlError::Timeout(Duration::from_secs(1));
    scope.statement(
        LogEvent::Exec,
        &meta(StatementKind::Delete, None, false),
        Duration::ZERO,
        "",
        0,
        Some(&err),
    );
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, LogLevel::Warn);
    assert_eq!(
        records[0].field("error"),
        Some(&FieldValue::Str("Timeout after 1s".to_string()))
    );
}

#[test]
fn slow_statement_logs_warn() {
    let sink = BufferSink::new();
    let logger = Logger::new(sink.clone()).with_config(
        MonitorConfig::new().with_slow_query_threshold(Duration::from_millis(10)),
    );
    assert_eq!(logger.level_for(Duration::from_millis(5), false), LogLevel::Debug);
    assert_eq!(logger.level_for(Duration::from_millis(50), false), LogLevel::Warn);
    assert_eq!(logger.level_for(Duration::ZERO, true), LogLevel::Warn);
}

#[test]
fn long_sql_is_truncated() {
    let sink = BufferSink::new();
    let logger = test_logger(&sink).with_config(
        MonitorConfig::new()
            .without_durations()
            .with_max_sql_length(12),
    );
    let scope = LogScope::pool(logger);
    scope.statement(
        LogEvent::Exec,
        &meta(StatementKind::Update, None, true),
        Duration::ZERO,
        "UPDATE `dml_people` SET `name`='x'",
        0,
        None,
    );
    assert_eq!(
        sink.records()[0].field("sql"),
        Some(&FieldValue::Str("UPDATE `dml_...".to_string()))
    );
}

#[test]
fn truncation_respects_char_boundaries() {
    assert_eq!(truncate_sql_bytes("héllo", 2), "h");
    assert_eq!(truncate_sql_bytes("abc", 10), "abc");
}

#[test]
fn transaction_scope_carries_all_ids() {
    let sink = BufferSink::new();
    let scope = LogScope::pool(test_logger(&sink)).conn().tx();
    assert_eq!(scope.pool_id(), "UNIQ00");
    assert_eq!(scope.conn_id(), Some("UNIQ04"));
    assert_eq!(scope.tx_id(), Some("UNIQ08"));

    scope.transaction(LogEvent::Commit, Some(Duration::from_millis(1)), None);
    assert_eq!(
        sink.lines(),
        vec![r#"DEBUG Commit conn_pool_id: "UNIQ00" conn_id: "UNIQ04" tx_id: "UNIQ08""#]
    );
}

#[test]
fn warn_carries_message() {
    let sink = BufferSink::new();
    let scope = LogScope::pool(test_logger(&sink)).tx();
    scope.warn(LogEvent::Rollback, "dropped");
    assert_eq!(
        sink.lines(),
        vec![r#"WARN Rollback conn_pool_id: "UNIQ00" tx_id: "UNIQ04" message: "dropped""#]
    );
}

#[test]
fn noop_logger_skips_statement_ids() {
    let scope = LogScope::pool(Logger::noop());
    assert!(!scope.logger().is_enabled());
    assert_eq!(scope.statement_id(), None);
}

#[test]
fn counter_ids_are_monotonic() {
    let ids = CounterIds::new();
    assert_eq!(ids.next_id(), "000001");
    assert_eq!(ids.next_id(), "000002");
}
