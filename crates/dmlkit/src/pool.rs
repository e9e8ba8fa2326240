//! Connection pool and explicitly checked-out connections.
//!
//! [`ConnPool`] wraps a `deadpool` managed pool over any [`Connector`]. Every
//! statement run directly on the pool checks a connection out for that one
//! call; [`ConnPool::conn`] keeps one connection for a sequence of calls and
//! [`ConnPool::begin_tx`] reserves one for a transaction.
//!
//! # Example
//!
//! ```ignore
//! let pool = ConnPool::new(connector, PoolConfig::new().with_max_size(8))?;
//!
//! pool.insert_into("dml_people")
//!     .add_columns(["name", "email"])
//!     .add_record(&mut person)
//!     .exec(&pool)
//!     .await?;
//! ```

use crate::args::Value;
use crate::client::{
    Connection, Connector, ExecResult, Executor, PooledConn, PreparedParts, Rows, with_timeout,
};
use crate::error::{DmlError, DmlResult, DriverError};
use crate::monitor::{LogScope, Logger};
use crate::stmt::StmtConn;
use crate::transaction::Tx;
use deadpool::managed::{self, Metrics, Pool, PoolError, RecycleError, RecycleResult, TimeoutType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// `deadpool` manager creating connections through a [`Connector`].
pub struct DriverManager<C: Connector> {
    connector: C,
}

impl<C: Connector> DriverManager<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }
}

impl<C: Connector> managed::Manager for DriverManager<C> {
    type Type = C::Connection;
    type Error = DriverError;

    async fn create(&self) -> Result<C::Connection, DriverError> {
        self.connector.connect().await
    }

    async fn recycle(
        &self,
        conn: &mut C::Connection,
        _metrics: &Metrics,
    ) -> RecycleResult<DriverError> {
        conn.ping().await.map_err(RecycleError::Backend)
    }
}

/// Pool sizing and timeouts.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of open connections.
    pub max_size: usize,
    /// How long `conn()` / `begin_tx()` wait for a free connection. `None` waits forever.
    pub wait_timeout: Option<Duration>,
    /// Timeout for opening a new connection.
    pub create_timeout: Option<Duration>,
    /// Timeout for the health check of a returned connection.
    pub recycle_timeout: Option<Duration>,
    /// Per-statement timeout for exec / query / prepare / commit / rollback.
    pub query_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            wait_timeout: None,
            create_timeout: None,
            recycle_timeout: None,
            query_timeout: None,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = Some(timeout);
        self
    }

    pub fn with_recycle_timeout(mut self, timeout: Duration) -> Self {
        self.recycle_timeout = Some(timeout);
        self
    }

    /// Statements exceeding this duration are abandoned with [`DmlError::Timeout`].
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }
}

/// Return `conn` to the pool, unless `error` says a statement was cut off by
/// its timeout and left the connection mid-protocol.
fn release<C: Connector>(conn: PooledConn<C>, error: Option<&DmlError>) {
    if error.is_some_and(DmlError::is_timeout) {
        drop(PooledConn::<C>::take(conn));
    }
}

/// The connection of a [`Conn`] or [`Tx`], shared with the statements
/// prepared on it. Statements only hold it weakly.
pub(crate) type SharedConn<C> = Arc<Mutex<ConnSlot<C>>>;

/// Holder of an exclusively checked-out connection.
///
/// Empty once the owner has handed the connection on, finished with it, or
/// lost it to a timeout.
pub(crate) struct ConnSlot<C: Connector> {
    conn: Option<PooledConn<C>>,
    what: &'static str,
    detach_on_drop: bool,
}

impl<C: Connector> ConnSlot<C> {
    /// `what` names the owner in `AlreadyClosed` errors. With `detach_on_drop`
    /// a connection still held when the slot goes away leaves the pool.
    pub(crate) fn shared(
        conn: PooledConn<C>,
        what: &'static str,
        detach_on_drop: bool,
    ) -> SharedConn<C> {
        Arc::new(Mutex::new(Self {
            conn: Some(conn),
            what,
            detach_on_drop,
        }))
    }

    pub(crate) fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub(crate) fn get(&mut self) -> DmlResult<&mut PooledConn<C>> {
        self.conn
            .as_mut()
            .ok_or_else(|| DmlError::already_closed(self.what))
    }

    pub(crate) fn take(&mut self) -> Option<PooledConn<C>> {
        self.conn.take()
    }

    /// Drop the connection without returning it to the pool.
    pub(crate) fn discard(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(PooledConn::<C>::take(conn));
        }
    }

    /// Discard the connection if `result` is a timeout; later calls fail
    /// with `AlreadyClosed`.
    pub(crate) fn settle<T>(&mut self, result: DmlResult<T>) -> DmlResult<T> {
        if result.as_ref().err().is_some_and(DmlError::is_timeout) {
            self.discard();
        }
        result
    }
}

impl<C: Connector> Drop for ConnSlot<C> {
    fn drop(&mut self) {
        if self.detach_on_drop {
            self.discard();
        }
    }
}

struct PoolInner<C: Connector> {
    pool: Pool<DriverManager<C>>,
    config: PoolConfig,
    scope: LogScope,
}

/// A pool of driver connections. Cheap to clone.
pub struct ConnPool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for ConnPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnPool")
            .field("id", &self.id())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ConnPool<C> {
    /// Create a pool that logs nothing.
    pub fn new(connector: C, config: PoolConfig) -> DmlResult<Self> {
        Self::with_logger(connector, config, Logger::noop())
    }

    pub fn with_logger(connector: C, config: PoolConfig, logger: Logger) -> DmlResult<Self> {
        let pool = Pool::builder(DriverManager::new(connector))
            .max_size(config.max_size)
            .wait_timeout(config.wait_timeout)
            .create_timeout(config.create_timeout)
            .recycle_timeout(config.recycle_timeout)
            .runtime(deadpool::Runtime::Tokio1)
            .build()
            .map_err(|e| DmlError::Pool(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                pool,
                config,
                scope: LogScope::pool(logger),
            }),
        })
    }

    pub fn id(&self) -> &str {
        self.inner.scope.pool_id()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn logger(&self) -> &Logger {
        self.inner.scope.logger()
    }

    pub fn status(&self) -> deadpool::Status {
        self.inner.pool.status()
    }

    /// Stop handing out connections; idle ones are dropped.
    pub fn close(&self) {
        self.inner.pool.close();
    }

    pub(crate) async fn checkout(&self) -> DmlResult<PooledConn<C>> {
        match self.inner.pool.get().await {
            Ok(conn) => Ok(conn),
            Err(PoolError::Timeout(TimeoutType::Wait)) => Err(DmlError::Timeout(
                self.inner.config.wait_timeout.unwrap_or_default(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Check out one connection for exclusive use until dropped.
    pub async fn conn(&self) -> DmlResult<Conn<C>> {
        let conn = self.checkout().await?;
        Ok(Conn {
            conn: ConnSlot::shared(conn, "connection", false),
            scope: self.inner.scope.conn(),
            query_timeout: self.inner.config.query_timeout,
        })
    }

    /// Begin a transaction on a freshly checked-out connection.
    pub async fn begin_tx(&self) -> DmlResult<Tx<C>> {
        let conn = self.checkout().await?;
        Tx::begin(conn, self.inner.scope.tx(), self.inner.config.query_timeout).await
    }

    /// Run `f` in a transaction: commit on `Ok`, roll back on `Err`.
    pub async fn transaction<T, F>(&self, f: F) -> DmlResult<T>
    where
        F: AsyncFnOnce(&Tx<C>) -> DmlResult<T>,
    {
        self.begin_tx().await?.wrap(f).await
    }
}

impl<C: Connector> Executor for ConnPool<C> {
    type Connector = C;

    fn scope(&self) -> &LogScope {
        &self.inner.scope
    }

    fn query_timeout(&self) -> Option<Duration> {
        self.inner.config.query_timeout
    }

    async fn raw_execute(&self, context: &str, sql: &str, args: &[Value]) -> DmlResult<ExecResult> {
        let mut conn = self.checkout().await?;
        let result = with_timeout(self.query_timeout(), async {
            conn.execute(sql, args)
                .await
                .map_err(|e| DmlError::driver(context, e))
        })
        .await;
        release(conn, result.as_ref().err());
        result
    }

    async fn raw_query(&self, context: &str, sql: &str, args: &[Value]) -> DmlResult<Rows> {
        let mut conn = self.checkout().await?;
        let result = with_timeout(self.query_timeout(), async {
            conn.query(sql, args)
                .await
                .map_err(|e| DmlError::driver(context, e))
        })
        .await;
        release(conn, result.as_ref().err());
        result
    }

    async fn raw_prepare(&self, context: &str, sql: &str) -> DmlResult<PreparedParts<C>> {
        let mut conn = self.checkout().await?;
        let result = with_timeout(self.query_timeout(), async {
            conn.prepare(sql)
                .await
                .map_err(|e| DmlError::driver(context, e))
        })
        .await;
        match result {
            Ok(stmt) => Ok((stmt, StmtConn::pinned(conn))),
            Err(error) => {
                release(conn, Some(&error));
                Err(error)
            }
        }
    }
}

/// One checked-out connection. Returned to the pool on drop.
///
/// Statements prepared on a `Conn` stop working once it is dropped or turned
/// into a transaction. A statement timeout discards the connection and every
/// later call fails with [`DmlError::AlreadyClosed`].
pub struct Conn<C: Connector> {
    conn: SharedConn<C>,
    scope: LogScope,
    query_timeout: Option<Duration>,
}

impl<C: Connector> Conn<C> {
    pub fn id(&self) -> Option<&str> {
        self.scope.conn_id()
    }

    /// Begin a transaction on this connection.
    pub async fn begin_tx(self) -> DmlResult<Tx<C>> {
        let conn = self
            .conn
            .lock()
            .await
            .take()
            .ok_or_else(|| DmlError::already_closed("connection"))?;
        Tx::begin(conn, self.scope.tx(), self.query_timeout).await
    }

    /// Run `f` in a transaction on this connection.
    pub async fn transaction<T, F>(self, f: F) -> DmlResult<T>
    where
        F: AsyncFnOnce(&Tx<C>) -> DmlResult<T>,
    {
        self.begin_tx().await?.wrap(f).await
    }

    /// Return the connection to the pool.
    pub fn close(self) {
        drop(self);
    }
}

impl<C: Connector> Executor for Conn<C> {
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
