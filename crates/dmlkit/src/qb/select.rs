//! SELECT statement builder.

use super::cond::{Cond, write_group};
use super::traits::{Binding, QueryBuilder, StatementKind, TableRef, resolve_named};
use crate::args::{Arg, Args, Slice, Value};
use crate::column_map::ColumnMapper;
use crate::error::DmlResult;
use crate::sql::{RenderMode, SqlWriter};

/// One entry of the projection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Projection {
    Column(String),
    Aliased { column: String, alias: String },
    Expr { sql: String, alias: Option<String> },
}

impl Projection {
    fn write(&self, w: &mut SqlWriter) -> DmlResult<()> {
        match self {
            Projection::Column(column) => {
                w.push_ident_str(column)?;
            }
            Projection::Aliased { column, alias } => {
                w.push_ident_str(column)?.push(" AS ").push_quoted(alias);
            }
            Projection::Expr { sql, alias } => {
                w.push(sql);
                if let Some(alias) = alias {
                    w.push(" AS ").push_quoted(alias);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => " INNER JOIN ",
            JoinKind::Left => " LEFT JOIN ",
            JoinKind::Right => " RIGHT JOIN ",
            JoinKind::Cross => " CROSS JOIN ",
        }
    }
}

#[derive(Debug)]
pub(crate) struct Join {
    kind: JoinKind,
    table: TableRef,
    on: Vec<Cond>,
}

/// ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OrderTerm {
    Asc(String),
    Desc(String),
    Expr(String),
}

pub(crate) fn write_order_by(w: &mut SqlWriter, terms: &[OrderTerm]) -> DmlResult<()> {
    if terms.is_empty() {
        return Ok(());
    }
    w.push(" ORDER BY ");
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        match term {
            OrderTerm::Asc(col) => {
                w.push_ident_str(col)?;
            }
            OrderTerm::Desc(col) => {
                w.push_ident_str(col)?.push(" DESC");
            }
            OrderTerm::Expr(sql) => {
                w.push(sql);
            }
        }
    }
    Ok(())
}

/// MySQL has no OFFSET without LIMIT; the maximum row count stands in.
pub(crate) fn write_limit(w: &mut SqlWriter, limit: Option<u64>, offset: Option<u64>) {
    match (limit, offset) {
        (Some(limit), Some(offset)) => {
            w.push(&format!(" LIMIT {limit} OFFSET {offset}"));
        }
        (Some(limit), None) => {
            w.push(&format!(" LIMIT {limit}"));
        }
        (None, Some(offset)) => {
            w.push(&format!(" LIMIT {} OFFSET {offset}", u64::MAX));
        }
        (None, None) => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lock {
    ForUpdate,
    ShareMode,
}

/// SELECT builder.
///
/// ```ignore
/// let (sql, args) = qb::select_from("dml_people")
///     .columns(["id", "name"])
///     .where_(Cond::gt("id", 10))
///     .order_by_desc("id")
///     .limit(20)
///     .to_sql()?;
/// ```
#[derive(Debug, Default)]
pub struct Select<'a> {
    table: TableRef,
    projections: Vec<Projection>,
    distinct: bool,
    joins: Vec<Join>,
    where_: Vec<Cond>,
    group_by: Vec<String>,
    having: Vec<Cond>,
    order_by: Vec<OrderTerm>,
    limit: Option<u64>,
    offset: Option<u64>,
    lock: Option<Lock>,
    binding: Option<Binding<'a>>,
    interpolate: bool,
    id: Option<String>,
}

impl<'a> Select<'a> {
    /// Select with an empty projection list (renders `*`).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, table: impl Into<TableRef>) -> Self {
        self.table = table.into();
        self
    }

    // ==================== projection ====================

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projections
            .extend(columns.into_iter().map(|c| Projection::Column(c.into())));
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.projections.push(Projection::Column(column.into()));
        self
    }

    /// `` `column` AS `alias` ``
    pub fn column_as(mut self, column: impl Into<String>, alias: impl Into<String>) -> Self {
        self.projections.push(Projection::Aliased {
            column: column.into(),
            alias: alias.into(),
        });
        self
    }

    /// Raw SQL expression, written verbatim.
    pub fn expr(mut self, sql: impl Into<String>) -> Self {
        self.projections.push(Projection::Expr {
            sql: sql.into(),
            alias: None,
        });
        self
    }

    pub fn expr_as(mut self, sql: impl Into<String>, alias: impl Into<String>) -> Self {
        self.projections.push(Projection::Expr {
            sql: sql.into(),
            alias: Some(alias.into()),
        });
        self
    }

    /// Replace the projection with `COUNT(*)`.
    pub fn count(mut self) -> Self {
        self.projections = vec![Projection::Expr {
            sql: "COUNT(*)".to_string(),
            alias: None,
        }];
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ==================== joins ====================

    fn join(mut self, kind: JoinKind, table: impl Into<TableRef>, on: Vec<Cond>) -> Self {
        self.joins.push(Join {
            kind,
            table: table.into(),
            on,
        });
        self
    }

    pub fn inner_join(self, table: impl Into<TableRef>, on: Cond) -> Self {
        self.join(JoinKind::Inner, table, vec![on])
    }

    pub fn left_join(self, table: impl Into<TableRef>, on: Cond) -> Self {
        self.join(JoinKind::Left, table, vec![on])
    }

    pub fn right_join(self, table: impl Into<TableRef>, on: Cond) -> Self {
        self.join(JoinKind::Right, table, vec![on])
    }

    pub fn cross_join(self, table: impl Into<TableRef>) -> Self {
        self.join(JoinKind::Cross, table, Vec::new())
    }

    // ==================== WHERE / HAVING ====================

    /// Add a condition; multiple calls are joined with AND.
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

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn having(mut self, cond: Cond) -> Self {
        self.having.push(cond);
        self
    }

    // ==================== ordering / paging / locking ====================

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(OrderTerm::Asc(column.into()));
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(OrderTerm::Desc(column.into()));
        self
    }

    /// Raw ORDER BY term, e.g. `FIELD(id, 3, 1, 2)`.
    pub fn order_by_expr(mut self, sql: impl Into<String>) -> Self {
        self.order_by.push(OrderTerm::Expr(sql.into()));
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

    pub fn for_update(mut self) -> Self {
        self.lock = Some(Lock::ForUpdate);
        self
    }

    pub fn lock_in_share_mode(mut self) -> Self {
        self.lock = Some(Lock::ShareMode);
        self
    }

    // ==================== records / flags ====================

    /// Supply named placeholders (`Cond::eq_record`) from one record.
    pub fn bind_record(mut self, record: &'a mut dyn ColumnMapper) -> Self {
        self.binding = Some(Binding::record(record));
        self
    }

    /// Supply named placeholders (`Cond::in_record`) from a collection in CollectSet mode.
    pub fn bind_collection(mut self, collection: &'a mut dyn ColumnMapper) -> Self {
        self.binding = Some(Binding::collection(collection));
        self
    }

    /// Render values as literals instead of `?`.
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

    // ==================== compile ====================

    /// Named placeholder keys in render order (joins, where, having).
    pub(crate) fn named_columns(&self, out: &mut Vec<String>) {
        for join in &self.joins {
            for cond in &join.on {
                cond.named_columns(out);
            }
        }
        for cond in self.where_.iter().chain(&self.having) {
            cond.named_columns(out);
        }
    }

    pub(crate) fn resolve_named(&mut self) -> DmlResult<Args> {
        let mut names = Vec::new();
        self.named_columns(&mut names);
        resolve_named(self.binding.as_mut(), &names)
    }

    pub(crate) fn write(&self, w: &mut SqlWriter) -> DmlResult<()> {
        self.write_as(w, self.id.as_deref())
    }

    /// Write with an explicit statement id; a union stamps its id on the first select.
    pub(crate) fn write_as(&self, w: &mut SqlWriter, id: Option<&str>) -> DmlResult<()> {
        w.push_keyword("SELECT", id);
        if self.distinct {
            w.push(" DISTINCT");
        }
        w.push_char(' ');
        if self.projections.is_empty() {
            w.push_char('*');
        }
        for (i, projection) in self.projections.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            projection.write(w)?;
        }

        w.push(" FROM ");
        self.table.write(w)?;

        for join in &self.joins {
            w.push(join.kind.as_sql());
            join.table.write(w)?;
            if join.on.iter().any(|c| !c.is_empty()) {
                w.push(" ON ");
                write_group(w, &join.on, " AND ")?;
            }
        }

        if self.where_.iter().any(|c| !c.is_empty()) {
            w.push(" WHERE ");
            write_group(w, &self.where_, " AND ")?;
        }

        if !self.group_by.is_empty() {
            w.push(" GROUP BY ");
            for (i, column) in self.group_by.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.push_ident_str(column)?;
            }
        }

        if self.having.iter().any(|c| !c.is_empty()) {
            w.push(" HAVING ");
            write_group(w, &self.having, " AND ")?;
        }

        write_order_by(w, &self.order_by)?;
        write_limit(w, self.limit, self.offset);

        match self.lock {
            Some(Lock::ForUpdate) => {
                w.push(" FOR UPDATE");
            }
            Some(Lock::ShareMode) => {
                w.push(" LOCK IN SHARE MODE");
            }
            None => {}
        }
        Ok(())
    }
}

impl QueryBuilder for Select<'_> {
    fn kind(&self) -> StatementKind {
        StatementKind::Select
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
        for join in &self.joins {
            for cond in &join.on {
                cond.placeholder_columns(&mut out);
            }
        }
        for cond in self.where_.iter().chain(&self.having) {
            cond.placeholder_columns(&mut out);
        }
        out
    }

    fn to_sql_mode(&mut self, mode: RenderMode) -> DmlResult<(String, Vec<Value>)> {
        let named = self.resolve_named()?;
        let mut w = SqlWriter::new(mode, 128);
        w.set_named(named);
        self.write(&mut w)?;
        Ok(w.finish())
    }
}
