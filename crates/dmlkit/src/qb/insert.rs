//! INSERT / REPLACE statement builder.

use super::select::Select;
use super::traits::{QueryBuilder, StatementKind};
use crate::args::{Arg, Args, Value};
use crate::client::ExecResult;
use crate::column_map::{ColumnMap, ColumnMapper};
use crate::error::{DmlError, DmlResult};
use crate::sql::{RenderMode, SqlWriter, write_literal};
use std::fmt;

/// Right-hand side of one `ON DUPLICATE KEY UPDATE` / `SET` assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignValue {
    /// Bound like any other argument: `?` or a literal depending on the render mode.
    Arg(Arg),
    /// Always written inline as a literal.
    Literal(Value),
    /// Positional `?` supplied at execution.
    Placeholder,
    /// Raw SQL expression.
    Expr(String),
    /// `VALUES(column)`, the value the row would have been inserted with.
    Values,
}

/// `column = value` assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub column: String,
    pub value: AssignValue,
}

impl Assign {
    pub fn arg(column: impl Into<String>, value: impl Into<Arg>) -> Self {
        Self {
            column: column.into(),
            value: AssignValue::Arg(value.into()),
        }
    }

    /// Value rendered inline in both modes, e.g. `` `something_id`=99 ``.
    pub fn literal(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: AssignValue::Literal(value.into()),
        }
    }

    pub fn placeholder(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: AssignValue::Placeholder,
        }
    }

    pub fn expr(column: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: AssignValue::Expr(sql.into()),
        }
    }

    /// `` `column`=VALUES(`column`) ``
    pub fn values(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: AssignValue::Values,
        }
    }

    pub(crate) fn write(&self, w: &mut SqlWriter) -> DmlResult<()> {
        w.push_ident_str(&self.column)?.push_char('=');
        match &self.value {
            AssignValue::Arg(arg) => {
                w.push_arg(arg)?;
            }
            AssignValue::Literal(value) => {
                let mut literal = String::new();
                write_literal(&mut literal, value)?;
                w.push(&literal);
            }
            AssignValue::Placeholder => {
                w.push_placeholder();
            }
            AssignValue::Expr(sql) => {
                w.push(sql);
            }
            AssignValue::Values => {
                w.push("VALUES(");
                w.push_ident_str(&self.column)?.push_char(')');
            }
        }
        Ok(())
    }

    pub(crate) fn is_placeholder(&self) -> bool {
        matches!(self.value, AssignValue::Placeholder)
    }
}

/// Write `a=.., b=..` assignments.
pub(crate) fn write_assignments(w: &mut SqlWriter, assigns: &[Assign]) -> DmlResult<()> {
    for (i, assign) in assigns.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        assign.write(w)?;
    }
    Ok(())
}

/// INSERT builder.
///
/// Rows come from explicit value tuples, bound records, or a SELECT. Without
/// any of them the statement renders placeholder tuples for preparing.
///
/// ```ignore
/// let (sql, args) = qb::insert_into("a")
///     .add_columns(["x", "y"])
///     .add_records([&mut r1 as &mut dyn ColumnMapper, &mut r2])
///     .to_sql()?;
/// assert_eq!(sql, "INSERT INTO `a` (`x`,`y`) VALUES (?,?),(?,?)");
/// ```
#[derive(Default)]
pub struct Insert<'a> {
    table: String,
    columns: Vec<String>,
    values: Vec<Args>,
    records: Vec<&'a mut dyn ColumnMapper>,
    record_placeholder_count: Option<usize>,
    row_count: Option<usize>,
    select: Option<Box<Select<'a>>>,
    on_duplicate: Vec<Assign>,
    replace: bool,
    ignore: bool,
    interpolate: bool,
    id: Option<String>,
    build_error: Option<String>,
}

impl fmt::Debug for Insert<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Insert")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("values", &self.values)
            .field("records", &self.records.len())
            .field("record_placeholder_count", &self.record_placeholder_count)
            .field("select", &self.select)
            .field("on_duplicate", &self.on_duplicate)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl<'a> Insert<'a> {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Append columns. A column listed twice fails at compile time.
    pub fn add_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            let column = column.into();
            if self.columns.contains(&column) && self.build_error.is_none() {
                self.build_error = Some(format!("duplicate insert column {column:?}"));
            }
            self.columns.push(column);
        }
        self
    }

    /// Append one or more value tuples. The flattened length must be a
    /// multiple of the tuple width.
    pub fn add_values(mut self, values: Args) -> Self {
        self.values.push(values);
        self
    }

    /// Append a record. With columns it is read in ReadSelected mode,
    /// otherwise in ReadAll mode.
    pub fn add_record(mut self, record: &'a mut dyn ColumnMapper) -> Self {
        self.records.push(record);
        self
    }

    pub fn add_records<I>(mut self, records: I) -> Self
    where
        I: IntoIterator<Item = &'a mut dyn ColumnMapper>,
    {
        self.records.extend(records);
        self
    }

    /// Tuple width for column-less inserts.
    pub fn set_record_placeholder_count(mut self, n: usize) -> Self {
        self.record_placeholder_count = Some(n);
        self
    }

    /// Number of placeholder tuples rendered when no values or records are given.
    pub fn set_row_count(mut self, n: usize) -> Self {
        self.row_count = Some(n);
        self
    }

    /// `INSERT INTO t (..) SELECT ..`
    pub fn from_select(mut self, select: Select<'a>) -> Self {
        self.select = Some(Box::new(select));
        self
    }

    pub fn on_duplicate_key(mut self, assigns: Vec<Assign>) -> Self {
        self.on_duplicate.extend(assigns);
        self
    }

    /// `` `c`=VALUES(`c`) `` for every column given.
    pub fn on_duplicate_key_values<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_duplicate
            .extend(columns.into_iter().map(Assign::values));
        self
    }

    /// `REPLACE INTO` instead of `INSERT INTO`.
    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    /// `INSERT IGNORE INTO`
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn interpolate(mut self) -> Self {
        self.interpolate = true;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_id_opt(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    /// Width of one VALUES tuple, if it can be known.
    fn tuple_width(&self) -> Option<usize> {
        if !self.columns.is_empty() {
            return Some(self.columns.len());
        }
        self.record_placeholder_count.filter(|n| *n > 0)
    }

    fn validate(&self) -> DmlResult<()> {
        if self.table.is_empty() {
            return Err(DmlError::empty("insert table name"));
        }
        if let Some(message) = &self.build_error {
            return Err(DmlError::validation(message.clone()));
        }
        if self.columns.is_empty()
            && self.values.is_empty()
            && self.records.is_empty()
            && self.select.is_none()
            && self.tuple_width().is_none()
        {
            return Err(DmlError::empty(format!(
                "insert into {:?} has no columns, values, records or select",
                self.table
            )));
        }
        if self.select.is_some() && (!self.values.is_empty() || !self.records.is_empty()) {
            return Err(DmlError::validation(
                "insert cannot combine a select with values or records",
            ));
        }
        Ok(())
    }

    /// Split flat values into tuples of `width`.
    fn chunk_rows(
        width: usize,
        values: Vec<Value>,
        source: &str,
        rows: &mut Vec<Vec<Value>>,
    ) -> DmlResult<()> {
        if values.is_empty() || values.len() % width != 0 {
            return Err(DmlError::mismatch(format!(
                "{source} produced {} values, expected a multiple of {width}",
                values.len()
            )));
        }
        rows.extend(values.chunks(width).map(<[Value]>::to_vec));
        Ok(())
    }

    /// Collect every VALUES row, record-major and column-minor.
    fn collect_rows(&mut self) -> DmlResult<Vec<Vec<Value>>> {
        let mut rows = Vec::new();

        let first_values_width = self.values.first().map(Args::flat_len);
        let width = self.tuple_width().or(first_values_width);

        for values in &self.values {
            let width = width.unwrap_or_default().max(1);
            Self::chunk_rows(width, values.flatten(), "value tuple", &mut rows)?;
        }

        if !self.records.is_empty() {
            let width = if self.columns.is_empty() {
                self.record_placeholder_count
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        DmlError::validation(
                            "records without columns need set_record_placeholder_count",
                        )
                    })?
            } else {
                self.columns.len()
            };
            for (i, record) in self.records.iter_mut().enumerate() {
                let mut args = Args::with_capacity(width);
                {
                    let mut cm = if self.columns.is_empty() {
                        ColumnMap::read_all(&mut args)
                    } else {
                        ColumnMap::read_selected(&self.columns, &mut args)
                    };
                    record.map_columns(&mut cm)?;
                }
                let values = args.flatten();
                if values.len() != width {
                    return Err(DmlError::mismatch(format!(
                        "record {i} produced {} values, expected {width}",
                        values.len()
                    )));
                }
                rows.push(values);
            }
        }
        Ok(rows)
    }

    fn write(&self, w: &mut SqlWriter, rows: &[Vec<Value>]) -> DmlResult<()> {
        if self.replace {
            w.push_keyword("REPLACE", self.id.as_deref());
        } else {
            w.push_keyword("INSERT", self.id.as_deref());
            if self.ignore {
                w.push(" IGNORE");
            }
        }
        w.push(" INTO ");
        w.push_ident_str(&self.table)?;

        if !self.columns.is_empty() {
            w.push(" (");
            for (i, column) in self.columns.iter().enumerate() {
                if i > 0 {
                    w.push_char(',');
                }
                w.push_ident_str(column)?;
            }
            w.push_char(')');
        }

        if let Some(select) = &self.select {
            w.push_char(' ');
            select.write(w)?;
        } else {
            w.push(" VALUES ");
            if rows.is_empty() {
                let width = self.tuple_width().unwrap_or_default();
                let count = self.row_count.unwrap_or(1).max(1);
                for i in 0..count {
                    if i > 0 {
                        w.push_char(',');
                    }
                    w.push_placeholder_tuple(width);
                }
            }
            for (i, row) in rows.iter().enumerate() {
                if i > 0 {
                    w.push_char(',');
                }
                w.push_char('(');
                for (j, value) in row.iter().enumerate() {
                    if j > 0 {
                        w.push_char(',');
                    }
                    w.push_value(value)?;
                }
                w.push_char(')');
            }
        }

        if !self.on_duplicate.is_empty() {
            w.push(" ON DUPLICATE KEY UPDATE ");
            write_assignments(w, &self.on_duplicate)?;
        }
        Ok(())
    }
}

impl QueryBuilder for Insert<'_> {
    fn kind(&self) -> StatementKind {
        StatementKind::Insert
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn statement_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn is_interpolated(&self) -> bool {
        self.interpolate
    }

    fn record_columns(&self) -> Vec<String> {
        let mut out = self.columns.clone();
        out.extend(
            self.on_duplicate
                .iter()
                .filter(|a| a.is_placeholder())
                .map(|a| a.column.clone()),
        );
        out
    }

    fn after_exec(&mut self, result: &ExecResult) {
        if result.last_insert_id > 0
            && let [record] = self.records.as_mut_slice()
        {
            record.assign_last_insert_id(result.last_insert_id);
        }
    }

    fn to_sql_mode(&mut self, mode: RenderMode) -> DmlResult<(String, Vec<Value>)> {
        self.validate()?;
        let rows = self.collect_rows()?;
        let named = match self.select.as_mut() {
            Some(select) => select.resolve_named()?,
            None => Args::new(),
        };
        let width = rows.first().map_or(0, Vec::len);
        let mut w = SqlWriter::new(mode, 64 + self.columns.len() * 16 + rows.len() * width * 4);
        w.set_named(named);
        self.write(&mut w, &rows)?;
        Ok(w.finish())
    }
}
