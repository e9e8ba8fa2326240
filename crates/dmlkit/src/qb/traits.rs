//! Trait definitions for statement builders.

use crate::args::{Args, Value};
use crate::client::{self, ExecResult, Executor, Rows};
use crate::column_map::{ColumnMap, ColumnMapper, MapMode};
use crate::error::{DmlError, DmlResult};
use crate::ident::Ident;
use crate::sql::{RenderMode, SqlWriter};
use crate::stmt::Stmt;
use std::fmt;

/// Statement kind, used for the `<kind>_id` log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Union,
    With,
}

impl StatementKind {
    /// Name of the statement id field in log records.
    pub fn id_field(self) -> &'static str {
        match self {
            StatementKind::Select => "select_id",
            StatementKind::Insert => "insert_id",
            StatementKind::Update => "update_id",
            StatementKind::Delete => "delete_id",
            StatementKind::Union => "union_id",
            StatementKind::With => "with_id",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Union => "union",
            StatementKind::With => "with",
        }
    }
}

/// What the executor and the logger need to know about a compiled statement.
#[derive(Debug, Clone)]
pub struct StatementMeta {
    pub kind: StatementKind,
    pub id: Option<String>,
    pub table: String,
    /// The SQL carries its literals inline and may be logged verbatim.
    pub interpolated: bool,
}

impl StatementMeta {
    /// Error context for driver failures, e.g. ``exec insert `dml_people` ``.
    pub fn context(&self, op: &str) -> String {
        if self.table.is_empty() {
            format!("{op} {}", self.kind.as_str())
        } else {
            format!("{op} {} `{}`", self.kind.as_str(), self.table)
        }
    }
}

/// Table reference with optional alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    pub(crate) fn write(&self, w: &mut SqlWriter) -> DmlResult<()> {
        if self.name.is_empty() {
            return Err(DmlError::empty("table name"));
        }
        w.push_ident(&Ident::parse(&self.name)?);
        if let Some(alias) = &self.alias {
            w.push(" AS ").push_quoted(alias);
        }
        Ok(())
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
        }
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        Self { name, alias: None }
    }
}

impl From<(&str, &str)> for TableRef {
    fn from((name, alias): (&str, &str)) -> Self {
        Self {
            name: name.to_string(),
            alias: Some(alias.to_string()),
        }
    }
}

/// A record (ReadSelected) or collection (CollectSet) feeding named placeholders.
pub(crate) struct Binding<'a> {
    mode: MapMode,
    record: &'a mut dyn ColumnMapper,
}

impl<'a> Binding<'a> {
    pub(crate) fn record(record: &'a mut dyn ColumnMapper) -> Self {
        Self {
            mode: MapMode::ReadSelected,
            record,
        }
    }

    pub(crate) fn collection(record: &'a mut dyn ColumnMapper) -> Self {
        Self {
            mode: MapMode::CollectSet,
            record,
        }
    }

    /// Ask the bound record for exactly one argument per column.
    pub(crate) fn read(&mut self, columns: &[String]) -> DmlResult<Args> {
        let mut args = Args::with_capacity(columns.len());
        {
            let mut cm = match self.mode {
                MapMode::CollectSet => ColumnMap::collect_set(columns, &mut args),
                _ => ColumnMap::read_selected(columns, &mut args),
            };
            self.record.map_columns(&mut cm)?;
        }
        if args.len() != columns.len() {
            return Err(DmlError::mismatch(format!(
                "bound record produced {} values for columns {columns:?}",
                args.len()
            )));
        }
        Ok(args)
    }
}

impl fmt::Debug for Binding<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Resolve named placeholders against an optional binding.
pub(crate) fn resolve_named(
    binding: Option<&mut Binding<'_>>,
    names: &[String],
) -> DmlResult<Args> {
    if names.is_empty() {
        return Ok(Args::new());
    }
    match binding {
        Some(binding) => binding.read(names),
        None => Err(DmlError::validation(format!(
            "named placeholders {names:?} need a bound record"
        ))),
    }
}

/// Common interface of all statement builders.
///
/// Compilation takes `&mut self` because bound records are read through the
/// bidirectional [`ColumnMapper`] contract; builder configuration is never
/// changed by compiling, so compiling twice yields identical output.
pub trait QueryBuilder: Send {
    fn kind(&self) -> StatementKind;

    /// Target table, empty if not applicable.
    fn table_name(&self) -> &str;

    fn statement_id(&self) -> Option<&str>;

    fn is_interpolated(&self) -> bool;

    /// Compile in the given mode regardless of the interpolation flag.
    fn to_sql_mode(&mut self, mode: RenderMode) -> DmlResult<(String, Vec<Value>)>;

    /// Columns a record must provide per execution of the prepared form.
    ///
    /// Empty means "all columns in the record's own order".
    fn record_columns(&self) -> Vec<String> {
        Vec::new()
    }

    /// Hook run after a successful `exec`.
    fn after_exec(&mut self, _result: &ExecResult) {}

    /// Compile using the builder's interpolation flag.
    fn to_sql(&mut self) -> DmlResult<(String, Vec<Value>)> {
        let mode = if self.is_interpolated() {
            RenderMode::Interpolate
        } else {
            RenderMode::Placeholder
        };
        self.to_sql_mode(mode)
    }

    fn meta(&self) -> StatementMeta {
        StatementMeta {
            kind: self.kind(),
            id: self.statement_id().map(str::to_string),
            table: self.table_name().to_string(),
            interpolated: self.is_interpolated(),
        }
    }

    /// Compile and execute, returning rows affected and last insert id.
    fn exec<E: Executor>(
        &mut self,
        ex: &E,
    ) -> impl std::future::Future<Output = DmlResult<ExecResult>> + Send {
        async move {
            let (sql, args) = self.to_sql()?;
            let meta = self.meta();
            let result = client::execute(ex, &meta, &sql, &args).await?;
            self.after_exec(&result);
            Ok(result)
        }
    }

    /// Compile and run as a query, returning the raw rows.
    fn query<E: Executor>(
        &mut self,
        ex: &E,
    ) -> impl std::future::Future<Output = DmlResult<Rows>> + Send {
        async move {
            let (sql, args) = self.to_sql()?;
            let meta = self.meta();
            client::query(ex, &meta, &sql, &args).await
        }
    }

    /// Compile, query and scan every row into `mapper`. Returns the row count.
    fn load<E: Executor, M: ColumnMapper + ?Sized>(
        &mut self,
        ex: &E,
        mapper: &mut M,
    ) -> impl std::future::Future<Output = DmlResult<usize>> + Send {
        async move {
            let rows = self.query(ex).await?;
            rows.scan_into(mapper)
        }
    }

    /// Compile with placeholders and prepare on the executor.
    ///
    /// Values known at build time cannot be carried into a prepared statement;
    /// use positional placeholders and pass values on execution.
    fn prepare<E: Executor>(
        &mut self,
        ex: &E,
    ) -> impl std::future::Future<Output = DmlResult<Stmt<E::Connector>>> + Send {
        async move {
            let (sql, args) = self.to_sql_mode(RenderMode::Placeholder)?;
            if !args.is_empty() {
                return Err(DmlError::mismatch(format!(
                    "prepared statement cannot carry {} build-time values; use placeholders",
                    args.len()
                )));
            }
            let mut meta = self.meta();
            meta.interpolated = false;
            client::prepare(ex, meta, &sql, self.record_columns()).await
        }
    }
}
