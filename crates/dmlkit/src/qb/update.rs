//! UPDATE statement builder.

use super::cond::{Cond, write_group};
use super::insert::Assign;
use super::select::{OrderTerm, write_limit, write_order_by};
use super::traits::{Binding, QueryBuilder, StatementKind, TableRef, resolve_named};
use crate::args::{Arg, Value};
use crate::column_map::ColumnMapper;
use crate::error::{DmlError, DmlResult};
use crate::sql::{RenderMode, SqlWriter};

#[derive(Debug, Clone, PartialEq)]
enum SetItem {
    Assign(Assign),
    /// Value taken from the bound record, or a positional `?` without one.
    Record(String),
}

/// UPDATE builder.
///
/// ```ignore
/// let (sql, args) = qb::update("dml_people")
///     .add_columns(["name", "email"])
///     .bind_record(&mut person)
///     .where_(Cond::eq_record("id"))
///     .to_sql()?;
/// // UPDATE `dml_people` SET `name`=?, `email`=? WHERE `id` = ?
/// ```
#[derive(Debug, Default)]
pub struct Update<'a> {
    table: TableRef,
    set: Vec<SetItem>,
    where_: Vec<Cond>,
    order_by: Vec<OrderTerm>,
    limit: Option<u64>,
    binding: Option<Binding<'a>>,
    interpolate: bool,
    id: Option<String>,
}

impl<'a> Update<'a> {
    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// `` `column`=value ``
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.set.push(SetItem::Assign(Assign::arg(column, value)));
        self
    }

    /// `` `column`=<raw sql> ``, e.g. `` set_expr("hits", "`hits`+1") ``.
    pub fn set_expr(mut self, column: impl Into<String>, sql: impl Into<String>) -> Self {
        self.set.push(SetItem::Assign(Assign::expr(column, sql)));
        self
    }

    /// `` `column`=? `` bound on execution of the prepared statement.
    pub fn set_placeholder(mut self, column: impl Into<String>) -> Self {
        self.set.push(SetItem::Assign(Assign::placeholder(column)));
        self
    }

    pub fn set_assign(mut self, assign: Assign) -> Self {
        self.set.push(SetItem::Assign(assign));
        self
    }

    /// SET columns whose values come from the bound record.
    pub fn add_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set
            .extend(columns.into_iter().map(|c| SetItem::Record(c.into())));
        self
    }

    /// Record read in ReadSelected mode for the SET columns and then for
    /// named WHERE placeholders.
    pub fn bind_record(mut self, record: &'a mut dyn ColumnMapper) -> Self {
        self.binding = Some(Binding::record(record));
        self
    }

    pub fn where_(mut self, cond: Cond) -> Self {
        self.where_.push(cond);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.where_(Cond::eq(column, value))
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(OrderTerm::Asc(column.into()));
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(OrderTerm::Desc(column.into()));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
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

    fn named_columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.binding.is_some() {
            for item in &self.set {
                if let SetItem::Record(column) = item {
                    out.push(column.clone());
                }
            }
        }
        for cond in &self.where_ {
            cond.named_columns(&mut out);
        }
        out
    }

    fn write(&self, w: &mut SqlWriter) -> DmlResult<()> {
        w.push_keyword("UPDATE", self.id.as_deref()).push_char(' ');
        self.table.write(w)?;
        w.push(" SET ");
        let bound = self.binding.is_some();
        for (i, item) in self.set.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            match item {
                SetItem::Assign(assign) => assign.write(w)?,
                SetItem::Record(column) => {
                    w.push_ident_str(column)?.push_char('=');
                    if bound {
                        w.push_named(column)?;
                    } else {
                        w.push_placeholder();
                    }
                }
            }
        }
        if self.where_.iter().any(|c| !c.is_empty()) {
            w.push(" WHERE ");
            write_group(w, &self.where_, " AND ")?;
        }
        write_order_by(w, &self.order_by)?;
        write_limit(w, self.limit, None);
        Ok(())
    }
}

impl QueryBuilder for Update<'_> {
    fn kind(&self) -> StatementKind {
        StatementKind::Update
    }

    fn table_name(&self) -> &str {
        &self.table.name
    }

    fn statement_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn is_interpolated(&self) -> bool {
        self.interpolate
    }

    fn record_columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        for item in &self.set {
            match item {
                SetItem::Record(column) => out.push(column.clone()),
                SetItem::Assign(assign) if assign.is_placeholder() => {
                    out.push(assign.column.clone())
                }
                SetItem::Assign(_) => {}
            }
        }
        for cond in &self.where_ {
            cond.placeholder_columns(&mut out);
        }
        out
    }

    fn to_sql_mode(&mut self, mode: RenderMode) -> DmlResult<(String, Vec<Value>)> {
        if self.table.is_empty() {
            return Err(DmlError::empty("update table name"));
        }
        if self.set.is_empty() {
            return Err(DmlError::empty(format!(
                "update of {:?} has no SET clause",
                self.table.name
            )));
        }
        let names = self.named_columns();
        let named = resolve_named(self.binding.as_mut(), &names)?;
        let mut w = SqlWriter::new(mode, 96 + self.set.len() * 16);
        w.set_named(named);
        self.write(&mut w)?;
        Ok(w.finish())
    }
}
