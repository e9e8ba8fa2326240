//! Statement builders for MySQL-style DML.
//!
//! Every builder accumulates clause state through consuming chained calls and
//! compiles with [`QueryBuilder::to_sql`] into SQL text plus the flattened
//! argument list. The same state renders in two modes:
//!
//! - **placeholder** (default): `?` markers and an ordered argument list
//! - **interpolated** (`.interpolate()`): literals inline, no arguments
//!
//! All validation (empty table, duplicate columns, placeholder/argument
//! counts, unknown record columns) happens while compiling, before any I/O.
//!
//! # Usage
//!
//! ```ignore
//! use dmlkit::qb::{self, Cond, QueryBuilder};
//!
//! let (sql, args) = qb::select_from("dml_people")
//!     .columns(["id", "name"])
//!     .where_(Cond::or(vec![Cond::eq("id", 1), Cond::like("name", "G%")]))
//!     .to_sql()?;
//!
//! qb::insert_into("dml_people")
//!     .add_columns(["name", "email"])
//!     .add_values(Args::new().text("Gopher").null())
//!     .exec(&pool)
//!     .await?;
//! ```

mod cond;
mod delete;
mod insert;
mod select;
mod traits;
mod union;
mod update;
mod with;

pub use cond::{CmpOp, Cond, InList, Operand};
pub use delete::Delete;
pub use insert::{Assign, AssignValue, Insert};
pub use select::Select;
pub use traits::{QueryBuilder, StatementKind, StatementMeta, TableRef};
pub use union::Union;
pub use update::Update;
pub use with::{Cte, With, WithBody};

/// SELECT without a table yet; set it with [`Select::from`].
pub fn select<'a>() -> Select<'a> {
    Select::new()
}

/// SELECT from a table.
///
/// # Example
/// ```ignore
/// let q = dmlkit::qb::select_from(("dml_people", "p")).column("p.id");
/// ```
pub fn select_from<'a>(table: impl Into<TableRef>) -> Select<'a> {
    Select::new().from(table)
}

/// INSERT builder for a table.
pub fn insert<'a>(table: impl Into<String>) -> Insert<'a> {
    Insert::new(table)
}

/// Alias for [`insert`].
pub fn insert_into<'a>(table: impl Into<String>) -> Insert<'a> {
    Insert::new(table)
}

pub fn update<'a>(table: impl Into<TableRef>) -> Update<'a> {
    Update::new(table)
}

pub fn delete<'a>(table: impl Into<TableRef>) -> Delete<'a> {
    Delete::new(table)
}

/// Alias for [`delete`].
pub fn delete_from<'a>(table: impl Into<TableRef>) -> Delete<'a> {
    Delete::new(table)
}

/// UNION of the given selects.
pub fn union<'a, I>(selects: I) -> Union<'a>
where
    I: IntoIterator<Item = Select<'a>>,
{
    Union::new(selects)
}

/// WITH builder; add CTEs with [`With::cte`].
pub fn with<'a>() -> With<'a> {
    With::new()
}
