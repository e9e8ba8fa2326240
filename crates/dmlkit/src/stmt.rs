//! Prepared statements.
//!
//! A [`Stmt`] is created by [`QueryBuilder::prepare`](crate::qb::QueryBuilder::prepare)
//! and stays usable until [`Stmt::close`]. After closing, every call fails
//! with [`DmlError::AlreadyClosed`] without reaching the driver.
//!
//! A statement prepared on a pool keeps its connection checked out until the
//! statement is closed or dropped. A statement prepared on a
//! [`Conn`](crate::Conn) or [`Tx`](crate::Tx) borrows that connection and is
//! closed as soon as its owner is dropped, committed, rolled back or turned
//! into a transaction.
//!
//! A statement that runs into its timeout is closed, and the connection under
//! it is discarded rather than returned to the pool.

use crate::args::{Args, Value};
use crate::client::{
    Connector, DriverStatement, DriverStmt, ExecResult, PooledConn, Rows, with_timeout,
};
use crate::column_map::{ColumnMap, ColumnMapper};
use crate::error::{DmlError, DmlResult};
use crate::monitor::{LogEvent, LogScope};
use crate::pool::{ConnSlot, SharedConn};
use crate::qb::{StatementKind, StatementMeta};
use std::sync::Weak;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

/// The connection a prepared statement runs on.
pub struct StmtConn<C: Connector>(Owner<C>);

enum Owner<C: Connector> {
    /// Checked out from a pool for this statement alone.
    Pinned(PooledConn<C>),
    /// Lent by a `Conn` or `Tx`; gone once the owner is.
    Shared(Weak<Mutex<ConnSlot<C>>>),
}

impl<C: Connector> StmtConn<C> {
    pub(crate) fn pinned(conn: PooledConn<C>) -> Self {
        Self(Owner::Pinned(conn))
    }

    pub(crate) fn shared(conn: &SharedConn<C>) -> Self {
        Self(Owner::Shared(std::sync::Arc::downgrade(conn)))
    }
}

// Field order matters: the driver statement drops before its connection.
struct StmtHandle<C: Connector> {
    stmt: DriverStmt<C>,
    conn: StmtConn<C>,
}

impl<C: Connector> StmtHandle<C> {
    /// Drop the statement; a pinned connection leaves the pool with it.
    fn discard(self) {
        let StmtHandle { stmt, conn } = self;
        drop(stmt);
        if let StmtConn(Owner::Pinned(conn)) = conn {
            drop(PooledConn::<C>::take(conn));
        }
    }
}

type HandleGuard<'a, C> = MutexGuard<'a, Option<StmtHandle<C>>>;
type SlotGuard<C> = OwnedMutexGuard<ConnSlot<C>>;

/// Close the statement after a timeout left its connection mid-protocol.
fn discard<C: Connector>(handle: Option<StmtHandle<C>>, owner: Option<&mut SlotGuard<C>>) {
    if let Some(handle) = handle {
        handle.discard();
    }
    if let Some(slot) = owner {
        slot.discard();
    }
}

/// A statement prepared once and executed many times.
pub struct Stmt<C: Connector> {
    handle: Mutex<Option<StmtHandle<C>>>,
    meta: StatementMeta,
    record_columns: Vec<String>,
    scope: LogScope,
    timeout: Option<Duration>,
}

impl<C: Connector> std::fmt::Debug for Stmt<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stmt")
            .field("meta", &self.meta)
            .field("record_columns", &self.record_columns)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Stmt<C> {
    pub(crate) fn new(
        stmt: DriverStmt<C>,
        conn: StmtConn<C>,
        meta: StatementMeta,
        record_columns: Vec<String>,
        scope: LogScope,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            handle: Mutex::new(Some(StmtHandle { stmt, conn })),
            // arguments of a prepared statement are logged by count only
            meta: StatementMeta {
                interpolated: false,
                ..meta
            },
            record_columns,
            scope,
            timeout,
        }
    }

    pub fn meta(&self) -> &StatementMeta {
        &self.meta
    }

    /// Columns read from records, in placeholder order. Empty means every
    /// field of the record in declaration order.
    pub fn record_columns(&self) -> &[String] {
        &self.record_columns
    }

    /// True after [`Stmt::close`], a timeout, or once the `Conn`/`Tx` the
    /// statement was prepared on is gone.
    pub async fn is_closed(&self) -> bool {
        self.acquire().await.is_err()
    }

    /// Execute with positional arguments; slices expand in place.
    pub async fn execute(&self, args: &Args) -> DmlResult<ExecResult> {
        self.exec_values(&args.flatten()).await
    }

    /// Execute with the values of one record.
    ///
    /// For an INSERT the generated id is assigned back to the record.
    pub async fn execute_record(&self, record: &mut dyn ColumnMapper) -> DmlResult<ExecResult> {
        let args = self.read_record(record)?;
        let res = self.exec_values(&args.flatten()).await?;
        if self.meta.kind == StatementKind::Insert && res.last_insert_id > 0 {
            record.assign_last_insert_id(res.last_insert_id);
        }
        Ok(res)
    }

    /// Execute once with the values of all records concatenated, e.g. for a
    /// multi-row INSERT prepared with a row count.
    ///
    /// The generated id is assigned back only when exactly one record is given.
    pub async fn execute_records(
        &self,
        records: &mut [&mut dyn ColumnMapper],
    ) -> DmlResult<ExecResult> {
        if records.is_empty() {
            return Err(DmlError::empty("no records to execute the statement with"));
        }
        let mut values = Vec::new();
        for record in records.iter_mut() {
            values.extend(self.read_record(&mut **record)?.flatten());
        }
        let res = self.exec_values(&values).await?;
        if let [record] = records
            && self.meta.kind == StatementKind::Insert
            && res.last_insert_id > 0
        {
            record.assign_last_insert_id(res.last_insert_id);
        }
        Ok(res)
    }

    /// Run the statement and buffer its rows.
    pub async fn query(&self, args: &Args) -> DmlResult<Rows> {
        let values = args.flatten();
        let (mut guard, mut owner) = self.acquire().await?;
        let handle = guard.as_mut().ok_or_else(|| self.closed())?;
        let context = self.meta.context("query prepared");
        let start = Instant::now();
        let result = with_timeout(self.timeout, async {
            handle
                .stmt
                .query(&values)
                .await
                .map_err(|e| DmlError::driver(context.as_str(), e))
        })
        .await;
        self.scope.statement(
            LogEvent::Query,
            &self.meta,
            start.elapsed(),
            "",
            values.len(),
            result.as_ref().err(),
        );
        if result.as_ref().err().is_some_and(DmlError::is_timeout) {
            discard(guard.take(), owner.as_mut());
        }
        result
    }

    /// Run the statement and scan every row into `dest`. Returns the row count.
    pub async fn load<M: ColumnMapper + ?Sized>(&self, args: &Args, dest: &mut M) -> DmlResult<usize> {
        self.query(args).await?.scan_into(dest)
    }

    /// Close the driver statement and release its connection.
    pub async fn close(&self) -> DmlResult<()> {
        let (mut guard, mut owner) = self.acquire().await?;
        let Some(mut handle) = guard.take() else {
            return Err(self.closed());
        };
        let context = self.meta.context("close");
        let start = Instant::now();
        let result = with_timeout(self.timeout, async {
            handle
                .stmt
                .close()
                .await
                .map_err(|e| DmlError::driver(context.as_str(), e))
        })
        .await;
        self.scope.statement(
            LogEvent::Close,
            &self.meta,
            start.elapsed(),
            "",
            0,
            result.as_ref().err(),
        );
        if result.as_ref().err().is_some_and(DmlError::is_timeout) {
            discard(Some(handle), owner.as_mut());
        }
        result
    }

    fn read_record(&self, record: &mut dyn ColumnMapper) -> DmlResult<Args> {
        let mut args = Args::new();
        if self.record_columns.is_empty() {
            record.map_columns(&mut ColumnMap::read_all(&mut args))?;
        } else {
            record.map_columns(&mut ColumnMap::read_selected(&self.record_columns, &mut args))?;
        }
        Ok(args)
    }

    async fn exec_values(&self, values: &[Value]) -> DmlResult<ExecResult> {
        let (mut guard, mut owner) = self.acquire().await?;
        let handle = guard.as_mut().ok_or_else(|| self.closed())?;
        let context = self.meta.context("exec prepared");
        let start = Instant::now();
        let result = with_timeout(self.timeout, async {
            handle
                .stmt
                .execute(values)
                .await
                .map_err(|e| DmlError::driver(context.as_str(), e))
        })
        .await;
        self.scope.statement(
            LogEvent::Exec,
            &self.meta,
            start.elapsed(),
            "",
            values.len(),
            result.as_ref().err(),
        );
        if result.as_ref().err().is_some_and(DmlError::is_timeout) {
            discard(guard.take(), owner.as_mut());
        }
        result
    }

    /// Lock the statement and, when it runs on a `Conn` or `Tx`, the owner's
    /// connection. Fails once either is closed.
    async fn acquire(&self) -> DmlResult<(HandleGuard<'_, C>, Option<SlotGuard<C>>)> {
        let mut guard = self.handle.lock().await;
        let lent = match guard.as_ref() {
            None => return Err(self.closed()),
            Some(StmtHandle {
                conn: StmtConn(Owner::Pinned(_)),
                ..
            }) => None,
            Some(StmtHandle {
                conn: StmtConn(Owner::Shared(owner)),
                ..
            }) => Some(owner.clone()),
        };
        let Some(owner) = lent else {
            return Ok((guard, None));
        };
        let slot = match owner.upgrade() {
            Some(shared) => Some(shared.lock_owned().await),
            None => None,
        };
        match slot {
            Some(slot) if slot.is_open() => Ok((guard, Some(slot))),
            _ => {
                *guard = None;
                Err(self.closed())
            }
        }
    }

    fn closed(&self) -> DmlError {
        DmlError::already_closed(self.meta.context("prepared"))
    }
}
