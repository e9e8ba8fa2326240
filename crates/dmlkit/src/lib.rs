//! # dmlkit
//!
//! A MySQL-flavoured DML builder and executor for Rust.
//!
//! ## Features
//!
//! - **Builders**: SELECT, INSERT/REPLACE, UPDATE, DELETE, UNION and WITH with consuming chained calls
//! - **Two render modes**: `?` placeholders plus an ordered argument list, or literals interpolated inline
//! - **Records**: one [`ColumnMapper`] implementation per type feeds inserts, named placeholders and scans
//! - **Prepared statements**: prepare once, execute with arguments or records, close exactly once
//! - **Pool, connection, transaction**: one [`Executor`] trait, the same builders work on all three
//! - **Instrumentation**: every I/O operation logs with pool, connection, transaction and statement ids
//!
//! The database driver is pluggable through [`Connector`], [`Connection`] and
//! [`DriverStatement`].
//!
//! ## Query Builder (qb)
//!
//! ```ignore
//! use dmlkit::{qb, Args, Cond, QueryBuilder};
//!
//! // SELECT
//! let (sql, args) = qb::select_from("dml_people")
//!     .columns(["id", "name"])
//!     .eq("email", "gopher@example.com")
//!     .order_by_desc("id")
//!     .limit(10)
//!     .to_sql()?;
//! // SELECT `id`, `name` FROM `dml_people` WHERE `email` = ? ORDER BY `id` DESC LIMIT 10
//!
//! // INSERT with records, assigns the generated id back
//! pool.insert_into("dml_people")
//!     .add_columns(["name", "email"])
//!     .add_record(&mut person)
//!     .exec(&pool)
//!     .await?;
//!
//! // UPDATE
//! qb::update("dml_people")
//!     .set("name", "Gopher")
//!     .eq("id", 7)
//!     .exec(&pool)
//!     .await?;
//!
//! // DELETE, interpolated
//! let (sql, _) = qb::delete_from("dml_people").eq("id", 7).interpolate().to_sql()?;
//! // DELETE FROM `dml_people` WHERE `id` = 7
//! ```

pub mod args;
pub mod client;
pub mod column_map;
pub mod error;
pub mod ident;
pub mod monitor;
pub mod pool;
pub mod prelude;
pub mod qb;
pub mod sql;
pub mod stmt;
pub mod transaction;

pub use args::{Arg, Args, Slice, Value};
pub use client::{Connection, Connector, DriverStatement, ExecResult, Executor, Rows};
pub use column_map::{ColumnMap, ColumnMapper, FromValue, MapMode, ToValue, unique_values};
pub use error::{DmlError, DmlResult, DriverError};
pub use ident::{Ident, IntoIdent};
pub use monitor::{
    BufferSink, CounterIds, LogEvent, LogLevel, LogRecord, LogScope, LogSink, Logger,
    MonitorConfig, NoopSink,
};
#[cfg(feature = "tracing")]
pub use monitor::TracingSink;
pub use pool::{Conn, ConnPool, DriverManager, PoolConfig};
pub use sql::{RenderMode, SqlWriter};
pub use stmt::Stmt;
pub use transaction::Tx;

// Re-export qb module for easy access
pub use qb::{
    Assign, AssignValue, CmpOp, Cond, Cte, Delete, InList, Insert, Operand, QueryBuilder, Select,
    StatementKind, StatementMeta, TableRef, Union, Update, With, WithBody, delete, delete_from,
    insert, insert_into, select, select_from, union, update, with,
};
