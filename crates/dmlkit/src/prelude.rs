//! Convenient imports for typical `dmlkit` usage.
//!
//! ```ignore
//! use dmlkit::prelude::*;
//! ```

pub use crate::{
    Args, ColumnMap, ColumnMapper, Cond, ConnPool, DmlError, DmlResult, Executor, PoolConfig,
    QueryBuilder, Value, qb,
};
