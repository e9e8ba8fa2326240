//! Common table expressions: `WITH [RECURSIVE] name AS (..) SELECT ..`.

use super::select::Select;
use super::traits::{QueryBuilder, StatementKind};
use super::union::Union;
use crate::args::{Args, Value};
use crate::error::{DmlError, DmlResult};
use crate::sql::{RenderMode, SqlWriter};

/// Body of a CTE or the statement following it.
#[derive(Debug)]
pub enum WithBody<'a> {
    Select(Select<'a>),
    Union(Union<'a>),
}

impl<'a> From<Select<'a>> for WithBody<'a> {
    fn from(select: Select<'a>) -> Self {
        WithBody::Select(select)
    }
}

impl<'a> From<Union<'a>> for WithBody<'a> {
    fn from(union: Union<'a>) -> Self {
        WithBody::Union(union)
    }
}

impl WithBody<'_> {
    fn table_name(&self) -> &str {
        match self {
            WithBody::Select(s) => s.table_name(),
            WithBody::Union(u) => u.table_name(),
        }
    }

    fn resolve_named(&mut self) -> DmlResult<Args> {
        match self {
            WithBody::Select(s) => s.resolve_named(),
            WithBody::Union(u) => u.resolve_named(),
        }
    }

    fn record_columns(&self) -> Vec<String> {
        match self {
            WithBody::Select(s) => s.record_columns(),
            WithBody::Union(u) => u.placeholder_columns(),
        }
    }

    fn write(&self, w: &mut SqlWriter) -> DmlResult<()> {
        match self {
            WithBody::Select(s) => s.write(w),
            WithBody::Union(u) => {
                u.validate()?;
                u.write(w)
            }
        }
    }
}

/// One named subquery.
#[derive(Debug)]
pub struct Cte<'a> {
    pub name: String,
    pub columns: Vec<String>,
    pub body: WithBody<'a>,
}

impl<'a> Cte<'a> {
    pub fn new(name: impl Into<String>, body: impl Into<WithBody<'a>>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            body: body.into(),
        }
    }

    /// Explicit column list: `` `name` (`a`,`b`) AS (..) ``.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// WITH builder.
///
/// ```ignore
/// let (sql, _) = qb::with()
///     .cte(Cte::new("recent", qb::select_from("dml_people").where_(Cond::gt("id", 10))))
///     .select(qb::select_from("recent").count())
///     .to_sql()?;
/// // WITH `recent` AS (SELECT * FROM `dml_people` WHERE `id` > ?) SELECT COUNT(*) FROM `recent`
/// ```
#[derive(Debug, Default)]
pub struct With<'a> {
    ctes: Vec<Cte<'a>>,
    recursive: bool,
    top: Option<WithBody<'a>>,
    interpolate: bool,
    id: Option<String>,
}

impl<'a> With<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cte(mut self, cte: Cte<'a>) -> Self {
        self.ctes.push(cte);
        self
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// The statement using the CTEs.
    pub fn select(mut self, top: impl Into<WithBody<'a>>) -> Self {
        self.top = Some(top.into());
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

impl QueryBuilder for With<'_> {
    fn kind(&self) -> StatementKind {
        StatementKind::With
    }

    fn table_name(&self) -> &str {
        self.top.as_ref().map_or("", WithBody::table_name)
    }

    fn statement_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn is_interpolated(&self) -> bool {
        self.interpolate
    }

    fn record_columns(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .ctes
            .iter()
            .flat_map(|cte| cte.body.record_columns())
            .collect();
        if let Some(top) = &self.top {
            out.extend(top.record_columns());
        }
        out
    }

    fn to_sql_mode(&mut self, mode: RenderMode) -> DmlResult<(String, Vec<Value>)> {
        if self.ctes.is_empty() {
            return Err(DmlError::empty("with statement has no common table expressions"));
        }
        let Some(top) = self.top.as_mut() else {
            return Err(DmlError::empty("with statement has no top-level select"));
        };

        let mut named = Args::new();
        for cte in &mut self.ctes {
            named.extend(cte.body.resolve_named()?);
        }
        named.extend(top.resolve_named()?);

        let mut w = SqlWriter::new(mode, 256);
        w.set_named(named);
        w.push_keyword("WITH", self.id.as_deref());
        if self.recursive {
            w.push(" RECURSIVE");
        }
        for (i, cte) in self.ctes.iter().enumerate() {
            w.push(if i == 0 { " " } else { ", " });
            w.push_ident_str(&cte.name)?;
            if !cte.columns.is_empty() {
                w.push(" (");
                for (j, column) in cte.columns.iter().enumerate() {
                    if j > 0 {
                        w.push_char(',');
                    }
                    w.push_ident_str(column)?;
                }
                w.push_char(')');
            }
            w.push(" AS (");
            cte.body.write(&mut w)?;
            w.push_char(')');
        }
        w.push_char(' ');
        if let Some(top) = &self.top {
            top.write(&mut w)?;
        }
        Ok(w.finish())
    }
}
