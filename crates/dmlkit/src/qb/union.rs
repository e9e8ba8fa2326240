//! UNION of two or more SELECT statements.

use super::select::{OrderTerm, Select, write_limit, write_order_by};
use super::traits::{QueryBuilder, StatementKind};
use crate::args::{Args, Value};
use crate::error::{DmlError, DmlResult};
use crate::sql::{RenderMode, SqlWriter};

/// UNION builder. Every select is wrapped in parentheses:
/// `(SELECT ..) UNION (SELECT ..) ORDER BY ..`.
#[derive(Debug, Default)]
pub struct Union<'a> {
    selects: Vec<Select<'a>>,
    all: bool,
    order_by: Vec<OrderTerm>,
    limit: Option<u64>,
    offset: Option<u64>,
    interpolate: bool,
    id: Option<String>,
}

impl<'a> Union<'a> {
    pub fn new<I>(selects: I) -> Self
    where
        I: IntoIterator<Item = Select<'a>>,
    {
        Self {
            selects: selects.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn add(mut self, select: Select<'a>) -> Self {
        self.selects.push(select);
        self
    }

    /// `UNION ALL`, keeping duplicate rows.
    pub fn all(mut self) -> Self {
        self.all = true;
        self
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

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
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

    pub(crate) fn validate(&self) -> DmlResult<()> {
        if self.selects.len() < 2 {
            return Err(DmlError::empty(format!(
                "union needs at least two selects, got {}",
                self.selects.len()
            )));
        }
        Ok(())
    }

    /// Named values of every select, each from its own bound record.
    pub(crate) fn resolve_named(&mut self) -> DmlResult<Args> {
        let mut named = Args::new();
        for select in &mut self.selects {
            named.extend(select.resolve_named()?);
        }
        Ok(named)
    }

    pub(crate) fn write(&self, w: &mut SqlWriter) -> DmlResult<()> {
        let separator = if self.all { " UNION ALL " } else { " UNION " };
        for (i, select) in self.selects.iter().enumerate() {
            if i > 0 {
                w.push(separator);
            }
            w.push_char('(');
            let own_id = select.statement_id();
            let id = if i == 0 {
                self.id.as_deref().or(own_id)
            } else {
                own_id
            };
            select.write_as(w, id)?;
            w.push_char(')');
        }
        write_order_by(w, &self.order_by)?;
        write_limit(w, self.limit, self.offset);
        Ok(())
    }

    pub(crate) fn placeholder_columns(&self) -> Vec<String> {
        self.selects
            .iter()
            .flat_map(|s| s.record_columns())
            .collect()
    }
}

impl QueryBuilder for Union<'_> {
    fn kind(&self) -> StatementKind {
        StatementKind::Union
    }

    fn table_name(&self) -> &str {
        self.selects.first().map_or("", |s| s.table_name())
    }

    fn statement_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn is_interpolated(&self) -> bool {
        self.interpolate
    }

    fn record_columns(&self) -> Vec<String> {
        self.placeholder_columns()
    }

    fn to_sql_mode(&mut self, mode: RenderMode) -> DmlResult<(String, Vec<Value>)> {
        self.validate()?;
        let named = self.resolve_named()?;
        let mut w = SqlWriter::new(mode, 128 * self.selects.len());
        w.set_named(named);
        self.write(&mut w)?;
        Ok(w.finish())
    }
}
