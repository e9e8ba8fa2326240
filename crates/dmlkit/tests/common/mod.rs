//! In-memory driver used by the integration tests.
//!
//! Every driver call is recorded as one line in [`MockState::calls`];
//! operations listed in `failures` return a driver error instead.

#![allow(dead_code)]

use dmlkit::{
    BufferSink, ColumnMap, ColumnMapper, ConnPool, Connection, Connector, DmlResult, DriverError,
    DriverStatement, ExecResult, Logger, MapMode, MonitorConfig, PoolConfig, Rows, Value,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct MockState {
    calls: Mutex<Vec<String>>,
    failures: Mutex<Vec<&'static str>>,
    rows: Mutex<Rows>,
    last_insert_id: AtomicU64,
    connections: AtomicUsize,
    delay_ms: AtomicU64,
}

impl MockState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make every call of `op` ("exec", "query", "prepare", "begin", "commit",
    /// "rollback", "stmt exec", "stmt close") fail.
    pub fn fail(&self, op: &'static str) {
        self.failures.lock().unwrap().push(op);
    }

    pub fn set_last_insert_id(&self, id: u64) {
        self.last_insert_id.store(id, Ordering::SeqCst);
    }

    pub fn set_rows(&self, rows: Rows) {
        *self.rows.lock().unwrap() = rows;
    }

    /// Delay every `execute`, on a connection or a statement, by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn stall(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn record(&self, op: &'static str, line: String) -> Result<(), DriverError> {
        self.calls.lock().unwrap().push(line);
        if self.failures.lock().unwrap().contains(&op) {
            return Err(format!("{op} failed").into());
        }
        Ok(())
    }

    fn exec_result(&self) -> ExecResult {
        ExecResult {
            rows_affected: 1,
            last_insert_id: self.last_insert_id.load(Ordering::SeqCst),
        }
    }
}

fn render_args(args: &[Value]) -> String {
    let parts: Vec<String> = args
        .iter()
        .map(|v| match v {
            Value::Null => "NULL".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Uint(u) => u.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => format!("'{s}'"),
            other => format!("{other:?}"),
        })
        .collect();
    format!("[{}]", parts.join(", "))
}

#[derive(Debug, Clone)]
pub struct MockConnector {
    pub state: Arc<MockState>,
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection, DriverError> {
        self.state.connections.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            state: self.state.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    state: Arc<MockState>,
}

impl Connection for MockConnection {
    type Statement = MockStatement;

    async fn prepare(&mut self, sql: &str) -> Result<MockStatement, DriverError> {
        self.state.record("prepare", format!("prepare {sql}"))?;
        Ok(MockStatement {
            state: self.state.clone(),
        })
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, DriverError> {
        self.state.stall().await;
        self.state
            .record("exec", format!("exec {sql} {}", render_args(args)))?;
        Ok(self.state.exec_result())
    }

    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, DriverError> {
        self.state
            .record("query", format!("query {sql} {}", render_args(args)))?;
        Ok(self.state.rows.lock().unwrap().clone())
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        self.state.record("begin", "begin".to_string())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.state.record("commit", "commit".to_string())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.state.record("rollback", "rollback".to_string())
    }
}

#[derive(Debug)]
pub struct MockStatement {
    state: Arc<MockState>,
}

impl DriverStatement for MockStatement {
    async fn execute(&mut self, args: &[Value]) -> Result<ExecResult, DriverError> {
        self.state.stall().await;
        self.state
            .record("stmt exec", format!("stmt exec {}", render_args(args)))?;
        Ok(self.state.exec_result())
    }

    async fn query(&mut self, args: &[Value]) -> Result<Rows, DriverError> {
        self.state
            .record("stmt query", format!("stmt query {}", render_args(args)))?;
        Ok(self.state.rows.lock().unwrap().clone())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.state.record("stmt close", "stmt close".to_string())
    }
}

/// Ids `UNIQ00`, `UNIQ04`, `UNIQ08`, ... in request order.
pub fn fixed_ids() -> impl Fn() -> String + Send + Sync + 'static {
    let n = AtomicUsize::new(0);
    move || format!("UNIQ{:02}", n.fetch_add(1, Ordering::SeqCst) * 4)
}

/// Pool over a fresh mock driver, logging into a buffer without durations.
pub fn logged_pool() -> (ConnPool<MockConnector>, Arc<MockState>, BufferSink) {
    let state = MockState::new();
    let sink = BufferSink::new();
    let logger = Logger::new(sink.clone())
        .with_id_generator(fixed_ids())
        .with_config(MonitorConfig::new().without_durations());
    let pool = ConnPool::with_logger(
        MockConnector {
            state: state.clone(),
        },
        PoolConfig::new().with_max_size(2),
        logger,
    )
    .unwrap();
    (pool, state, sink)
}

/// Pool over a fresh mock driver with logging disabled.
pub fn quiet_pool() -> (ConnPool<MockConnector>, Arc<MockState>) {
    let state = MockState::new();
    let pool = ConnPool::new(
        MockConnector {
            state: state.clone(),
        },
        PoolConfig::new().with_max_size(2),
    )
    .unwrap();
    (pool, state)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

impl Person {
    pub fn new(name: &str, email: Option<&str>) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            email: email.map(str::to_string),
        }
    }
}

impl ColumnMapper for Person {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
        if cm.mode() == MapMode::ReadAll {
            cm.int(&mut self.id)?
                .text(&mut self.name)?
                .field(&mut self.email)?;
            return Ok(());
        }
        while cm.next() {
            match cm.column() {
                "id" => cm.int(&mut self.id)?,
                "name" => cm.text(&mut self.name)?,
                "email" => cm.field(&mut self.email)?,
                other => return Err(cm.unknown_column(other, "Person")),
            };
        }
        Ok(())
    }

    fn assign_last_insert_id(&mut self, id: u64) {
        self.id = id as i64;
    }
}

/// Collection of people; in Scan mode every row appends one person.
#[derive(Debug, Default)]
pub struct People(pub Vec<Person>);

impl ColumnMapper for People {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
        match cm.mode() {
            MapMode::Scan => {
                let mut person = Person::default();
                person.map_columns(cm)?;
                self.0.push(person);
                Ok(())
            }
            _ => Err(cm.unsupported("People")),
        }
    }
}
