//! Transactions over one exclusively owned pooled connection.
//!
//! A [`Tx`] ends through exactly one of [`Tx::commit`] or [`Tx::rollback`];
//! both consume it, so a finished transaction cannot be used again. A `Tx`
//! dropped while still open logs a warning and its connection is detached
//! from the pool instead of being reused in an unknown state. The same happens
//! when a statement inside the transaction times out; every later call on the
//! `Tx` then fails with [`DmlError::AlreadyClosed`].
//!
//! For commit/rollback handling around a unit of work use [`Tx::wrap`],
//! [`ConnPool::transaction`](crate::ConnPool::transaction) or the
//! [`transaction!`] macro.
//!
//! # Example
//!
//! ```ignore
//! use dmlkit::{DmlResult, Executor, QueryBuilder};
//!
//! # async fn demo(pool: &dmlkit::ConnPool<MyConnector>) -> DmlResult<()> {
//! let id = pool
//!     .transaction(async |tx| {
//!         let res = tx.insert_into("dml_people")
//!             .add_columns(["name"])
//!             .add_values(Args::new().text("Gopher"))
//!             .exec(tx)
//!             .await?;
//!         tx.update("dml_people").set("active", true).eq("id", res.last_insert_id).exec(tx).await?;
//!         Ok(res.last_insert_id)
//!     })
//!     .await?;
//! # Ok(()) }
//! ```

use crate::args::Value;
use crate::client::{
    Connection, Connector, ExecResult, Executor, PooledConn, PreparedParts, Rows, with_timeout,
};
use crate::error::{DmlError, DmlResult};
use crate::monitor::{LogEvent, LogScope};
use crate::pool::{ConnSlot, SharedConn};
use crate::stmt::StmtConn;
use std::time::{Duration, Instant};

/// Runs the given block inside a transaction.
///
/// - Begins a transaction via `$executor.begin_tx().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)` and returns the original error.
///
/// The block must evaluate to `dmlkit::DmlResult<T>`.
///
/// ```ignore
/// dmlkit::transaction!(&pool, tx, {
///     dmlkit::qb::delete_from("dml_people").eq("id", 3).exec(&tx).await?;
///     Ok(())
/// })?;
/// ```
#[macro_export]
macro_rules! transaction {
    ($executor:expr, $tx:ident, $body:block) => {{
        let $tx = ($executor).begin_tx().await?;

        let __dmlkit_tx_body_result = async { $body }.await;
        match __dmlkit_tx_body_result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback) => Err($crate::DmlError::Rollback {
                    error: Box::new(error),
                    rollback: Box::new(rollback),
                }),
            },
        }
    }};
}

#[derive(Debug, Clone, Copy)]
enum Finish {
    Commit,
    Rollback,
}

/// An open transaction.
pub struct Tx<C: Connector> {
    conn: SharedConn<C>,
    scope: LogScope,
    started: Instant,
    query_timeout: Option<Duration>,
}

impl<C: Connector> std::fmt::Debug for Tx<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx")
            .field("pool_id", &self.scope.pool_id())
            .field("tx_id", &self.scope.tx_id())
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Tx<C> {
    pub(crate) async fn begin(
        mut conn: PooledConn<C>,
        scope: LogScope,
        query_timeout: Option<Duration>,
    ) -> DmlResult<Self> {
        let result = with_timeout(query_timeout, async {
            conn.begin()
                .await
                .map_err(|e| DmlError::driver("begin transaction", e))
        })
        .await;
        scope.transaction(LogEvent::BeginTx, None, result.as_ref().err());
        if let Err(error) = result {
            drop(PooledConn::<C>::take(conn));
            return Err(error);
        }
        Ok(Self {
            conn: ConnSlot::shared(conn, "transaction", true),
            scope,
            started: Instant::now(),
            query_timeout,
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.scope.tx_id()
    }

    pub async fn commit(mut self) -> DmlResult<()> {
        self.finish(Finish::Commit).await
    }

    pub async fn rollback(mut self) -> DmlResult<()> {
        self.finish(Finish::Rollback).await
    }

    /// Run `f`; commit when it returns `Ok`, roll back when it returns `Err`.
    ///
    /// The error of `f` is returned unchanged. If the rollback fails as well
    /// the result is [`DmlError::Rollback`] carrying both errors.
    pub async fn wrap<T, F>(self, f: F) -> DmlResult<T>
    where
        F: AsyncFnOnce(&Tx<C>) -> DmlResult<T>,
    {
        let result = f(&self).await;
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(error) => match self.rollback().await {
                Ok(()) => Err(error),
                Err(rollback) => Err(DmlError::Rollback {
                    error: Box::new(error),
                    rollback: Box::new(rollback),
                }),
            },
        }
    }

    async fn finish(&mut self, how: Finish) -> DmlResult<()> {
        let Some(mut conn) = self.conn.lock().await.take() else {
            return Err(DmlError::already_closed("transaction"));
        };
        let (event, context) = match how {
            Finish::Commit => (LogEvent::Commit, "commit transaction"),
            Finish::Rollback => (LogEvent::Rollback, "rollback transaction"),
        };
        let result = with_timeout(self.query_timeout, async {
            let outcome = match how {
                Finish::Commit => conn.commit().await,
                Finish::Rollback => conn.rollback().await,
            };
            outcome.map_err(|e| DmlError::driver(context, e))
        })
        .await;
        self.scope
            .transaction(event, Some(self.started.elapsed()), result.as_ref().err());
        if result.is_err() {
            // connection state unknown after a failed commit/rollback
            drop(PooledConn::<C>::take(conn));
        }
        result
    }
}

impl<C: Connector> Drop for Tx<C> {
    fn drop(&mut self) {
        let open = match self.conn.try_lock() {
            Ok(mut slot) => {
                let open = slot.is_open();
                slot.discard();
                open
            }
            // a prepared statement is running; the slot discards on release
            Err(_) => true,
        };
        if open {
            self.scope.warn(
                LogEvent::Rollback,
                "transaction dropped without commit or rollback; connection discarded",
            );
        }
    }
}

impl<C: Connector> Executor for Tx<C> {
    type Connector = C;

    fn scope(&self) -> &LogScope {
        &self.scope
    }

    fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    async fn raw_execute(&self, context: &str, sql: &str, args: &[Value]) -> DmlResult<ExecResult> {
        let mut slot = self.conn.lock().await;
        let conn = slot.get()?;
        let result = with_timeout(self.query_timeout, async {
            conn.execute(sql, args)
                .await
                .map_err(|e| DmlError::driver(context, e))
        })
        .await;
        slot.settle(result)
    }

    async fn raw_query(&self, context: &str, sql: &str, args: &[Value]) -> DmlResult<Rows> {
        let mut slot = self.conn.lock().await;
        let conn = slot.get()?;
        let result = with_timeout(self.query_timeout, async {
            conn.query(sql, args)
                .await
                .map_err(|e| DmlError::driver(context, e))
        })
        .await;
        slot.settle(result)
    }

    async fn raw_prepare(&self, context: &str, sql: &str) -> DmlResult<PreparedParts<C>> {
        let mut slot = self.conn.lock().await;
        let conn = slot.get()?;
        let result = with_timeout(self.query_timeout, async {
            conn.prepare(sql)
                .await
                .map_err(|e| DmlError::driver(context, e))
        })
        .await;
        let stmt = slot.settle(result)?;
        Ok((stmt, StmtConn::shared(&self.conn)))
    }
}
