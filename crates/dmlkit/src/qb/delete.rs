//! DELETE statement builder.

use super::cond::{Cond, write_group};
use super::select::{OrderTerm, write_limit, write_order_by};
use super::traits::{Binding, QueryBuilder, StatementKind, TableRef, resolve_named};
use crate::args::{Arg, Slice, Value};
use crate::column_map::ColumnMapper;
use crate::error::{DmlError, DmlResult};
use crate::sql::{RenderMode, SqlWriter};

/// DELETE builder.
#[derive(Debug, Default)]
pub struct Delete<'a> {
    table: TableRef,
    where_: Vec<Cond>,
    order_by: Vec<OrderTerm>,
    limit: Option<u64>,
    binding: Option<Binding<'a>>,
    interpolate: bool,
    id: Option<String>,
}

impl<'a> Delete<'a> {
    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn where_(mut self, cond: Cond) -> Self {
        self.where_.push(cond);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.where_(Cond::eq(column, value))
    }

    pub fn in_list(self, column: impl Into<String>, values: impl Into<Slice>) -> Self {
        self.where_(Cond::in_list(column, values))
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

    pub fn bind_record(mut self, record: &'a mut dyn ColumnMapper) -> Self {
        self.binding = Some(Binding::record(record));
        self
    }

    /// Delete every row matching the collection, e.g. `WHERE id IN (..)` via `Cond::in_record`.
    pub fn bind_collection(mut self, collection: &'a mut dyn ColumnMapper) -> Self {
        self.binding = Some(Binding::collection(collection));
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
}

impl QueryBuilder for Delete<'_> {
    fn kind(&self) -> StatementKind {
        StatementKind::Delete
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
        for cond in &self.where_ {
            cond.placeholder_columns(&mut out);
        }
        out
    }

    fn to_sql_mode(&mut self, mode: RenderMode) -> DmlResult<(String, Vec<Value>)> {
        if self.table.is_empty() {
            return Err(DmlError::empty("delete table name"));
        }
        let mut names = Vec::new();
        for cond in &self.where_ {
            cond.named_columns(&mut names);
        }
        let named = resolve_named(self.binding.as_mut(), &names)?;

        let mut w = SqlWriter::new(mode, 96);
        w.set_named(named);
        w.push_keyword("DELETE", self.id.as_deref()).push(" FROM ");
        self.table.write(&mut w)?;
        if self.where_.iter().any(|c| !c.is_empty()) {
            w.push(" WHERE ");
            write_group(&mut w, &self.where_, " AND ")?;
        }
        write_order_by(&mut w, &self.order_by)?;
        write_limit(&mut w, self.limit, None);
        Ok(w.finish())
    }
}
