//! Driver contract and the executor trait shared by pool, connection and transaction.
//!
//! A MySQL driver plugs in by implementing [`Connector`], [`Connection`] and
//! [`DriverStatement`]. Everything above that (pooling, transactions, prepared
//! statement lifecycle, instrumentation) lives in this crate.

use crate::args::Value;
use crate::column_map::{ColumnMap, ColumnMapper};
use crate::error::{DmlError, DmlResult, DriverError};
use crate::monitor::{LogEvent, LogScope};
use crate::pool::DriverManager;
use crate::qb::StatementMeta;
use crate::stmt::{Stmt, StmtConn};
use std::future::Future;
use std::time::{Duration, Instant};

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// 0 when the statement generated no id.
    pub last_insert_id: u64,
}

/// A fully buffered result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Rows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Scan every row into `mapper` in Scan mode. Returns the number of rows.
    pub fn scan_into<M: ColumnMapper + ?Sized>(&self, mapper: &mut M) -> DmlResult<usize> {
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(DmlError::mismatch(format!(
                    "row {i} has {} values for {} columns",
                    row.len(),
                    self.columns.len()
                )));
            }
            let mut cm = ColumnMap::scan(&self.columns, row, i);
            mapper.map_columns(&mut cm)?;
        }
        Ok(self.rows.len())
    }
}

/// Opens driver connections.
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, DriverError>> + Send;
}

/// One driver connection.
pub trait Connection: Send + 'static {
    type Statement: DriverStatement;

    fn prepare(
        &mut self,
        sql: &str,
    ) -> impl Future<Output = Result<Self::Statement, DriverError>> + Send;

    fn execute(
        &mut self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<ExecResult, DriverError>> + Send;

    fn query(
        &mut self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<Rows, DriverError>> + Send;

    fn begin(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;

    fn commit(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;

    fn rollback(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Health check used before a pooled connection is handed out again.
    fn ping(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send {
        async { Ok(()) }
    }
}

/// A statement prepared on a driver connection.
///
/// The driver statement keeps whatever handle it needs to its connection.
pub trait DriverStatement: Send + 'static {
    fn execute(
        &mut self,
        args: &[Value],
    ) -> impl Future<Output = Result<ExecResult, DriverError>> + Send;

    fn query(&mut self, args: &[Value]) -> impl Future<Output = Result<Rows, DriverError>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;
}

/// Driver statement type of a connector.
pub type DriverStmt<C> = <<C as Connector>::Connection as Connection>::Statement;

/// Pooled connection object of a connector.
pub type PooledConn<C> = deadpool::managed::Object<DriverManager<C>>;

/// A freshly prepared driver statement and the connection it runs on.
pub type PreparedParts<C> = (DriverStmt<C>, StmtConn<C>);

/// Something statements can run against: a pool, a connection or a transaction.
///
/// All three targets accept the same builders and produce the same logs,
/// differing only in the ids they carry.
pub trait Executor: Send + Sync {
    type Connector: Connector;

    /// Ids and logger attached to everything run on this executor.
    fn scope(&self) -> &LogScope;

    fn query_timeout(&self) -> Option<Duration>;

    /// Run one statement. Implementations bound the driver call by
    /// [`query_timeout`](Executor::query_timeout) and discard the connection
    /// when it expires.
    fn raw_execute(
        &self,
        context: &str,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send;

    fn raw_query(
        &self,
        context: &str,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<Rows>> + Send;

    /// Prepare `sql`. A pool pins the checked-out connection to the statement;
    /// a connection or transaction lends its own for as long as it is open.
    fn raw_prepare(
        &self,
        context: &str,
        sql: &str,
    ) -> impl Future<Output = DmlResult<PreparedParts<Self::Connector>>> + Send;

    /// New statement id when logging is enabled.
    fn next_statement_id(&self) -> Option<String> {
        self.scope().statement_id()
    }

    /// `SELECT` builder stamped with a statement id.
    fn select_from<'a>(&self, table: impl Into<crate::qb::TableRef>) -> crate::qb::Select<'a> {
        crate::qb::select_from(table).with_id_opt(self.next_statement_id())
    }

    /// `INSERT` builder stamped with a statement id.
    fn insert_into<'a>(&self, table: impl Into<String>) -> crate::qb::Insert<'a> {
        crate::qb::insert_into(table).with_id_opt(self.next_statement_id())
    }

    /// `UPDATE` builder stamped with a statement id.
    fn update<'a>(&self, table: impl Into<crate::qb::TableRef>) -> crate::qb::Update<'a> {
        crate::qb::update(table).with_id_opt(self.next_statement_id())
    }

    /// `DELETE` builder stamped with a statement id.
    fn delete_from<'a>(&self, table: impl Into<crate::qb::TableRef>) -> crate::qb::Delete<'a> {
        crate::qb::delete_from(table).with_id_opt(self.next_statement_id())
    }

    /// Run raw SQL with positional `?` arguments.
    fn exec_sql(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send {
        async move {
            let meta = raw_meta(sql, args);
            execute(self, &meta, sql, args).await
        }
    }

    /// Query raw SQL with positional `?` arguments.
    fn query_sql(&self, sql: &str, args: &[Value]) -> impl Future<Output = DmlResult<Rows>> + Send {
        async move {
            let meta = raw_meta(sql, args);
            query(self, &meta, sql, args).await
        }
    }
}

fn raw_meta(sql: &str, args: &[Value]) -> StatementMeta {
    use crate::qb::StatementKind;
    let kind = match sql.trim_start().get(..6).map(str::to_ascii_uppercase).as_deref() {
        Some("INSERT") | Some("REPLAC") => StatementKind::Insert,
        Some("UPDATE") => StatementKind::Update,
        Some("DELETE") => StatementKind::Delete,
        _ => StatementKind::Select,
    };
    StatementMeta {
        kind,
        id: None,
        table: String::new(),
        interpolated: args.is_empty(),
    }
}

/// Run `fut`, failing with [`DmlError::Timeout`] once `limit` elapses.
pub(crate) async fn with_timeout<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = DmlResult<T>>,
) -> DmlResult<T> {
    match limit {
        Some(limit) => {
            tokio::select! {
                result = fut => result,
                _ = tokio::time::sleep(limit) => Err(DmlError::Timeout(limit)),
            }
        }
        None => fut.await,
    }
}

pub(crate) async fn execute<E: Executor + ?Sized>(
    ex: &E,
    meta: &StatementMeta,
    sql: &str,
    args: &[Value],
) -> DmlResult<ExecResult> {
    let context = meta.context("exec");
    let start = Instant::now();
    let result = ex.raw_execute(&context, sql, args).await;
    ex.scope().statement(
        LogEvent::Exec,
        meta,
        start.elapsed(),
        sql,
        args.len(),
        result.as_ref().err(),
    );
    result
}

pub(crate) async fn query<E: Executor + ?Sized>(
    ex: &E,
    meta: &StatementMeta,
    sql: &str,
    args: &[Value],
) -> DmlResult<Rows> {
    let context = meta.context("query");
    let start = Instant::now();
    let result = ex.raw_query(&context, sql, args).await;
    ex.scope().statement(
        LogEvent::Query,
        meta,
        start.elapsed(),
        sql,
        args.len(),
        result.as_ref().err(),
    );
    result
}

pub(crate) async fn prepare<E: Executor + ?Sized>(
    ex: &E,
    meta: StatementMeta,
    sql: &str,
    record_columns: Vec<String>,
) -> DmlResult<Stmt<E::Connector>> {
    let context = meta.context("prepare");
    let start = Instant::now();
    let result = ex.raw_prepare(&context, sql).await;
    let prepared_meta = StatementMeta {
        interpolated: true,
        ..meta.clone()
    };
    ex.scope().statement(
        LogEvent::Prepare,
        &prepared_meta,
        start.elapsed(),
        sql,
        0,
        result.as_ref().err(),
    );
    let (stmt, conn) = result?;
    Ok(Stmt::new(
        stmt,
        conn,
        meta,
        record_columns,
        ex.scope().clone(),
        ex.query_timeout(),
    ))
}
