//! Predicate tree for WHERE / HAVING / JOIN ON clauses.
//!
//! [`Cond`] supports:
//! - AND/OR/NOT grouping with parentheses driven by nesting, not insertion order
//! - comparisons against values, other columns, positional `?` placeholders
//!   and record-bound named placeholders
//! - IN / NOT IN lists (empty lists render `1=0` / `1=1`), sub-selects, EXISTS
//! - raw templates with `?` markers whose count must match the given args

use super::select::Select;
use crate::args::{Arg, Args, Slice, Value};
use crate::error::DmlResult;
use crate::sql::SqlWriter;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    /// MySQL `<=>`
    NullSafeEq,
}

impl CmpOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Like => "LIKE",
            CmpOp::NotLike => "NOT LIKE",
            CmpOp::NullSafeEq => "<=>",
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug)]
pub enum Operand {
    /// A value known at build time.
    Arg(Arg),
    /// Another column.
    Column(String),
    /// Positional `?`, supplied at execution (prepared statements).
    Placeholder,
    /// Supplied by the bound record under this column name.
    Named(String),
    /// Raw SQL expression.
    Expr(String),
}

/// Right-hand side of IN / NOT IN.
#[derive(Debug)]
pub enum InList {
    Values(Arg),
    Placeholders(usize),
    Named(String),
    Select(Box<Select<'static>>),
}

/// Condition node.
#[derive(Debug)]
pub enum Cond {
    And(Vec<Cond>),
    Or(Vec<Cond>),
    Not(Box<Cond>),
    Compare {
        column: String,
        op: CmpOp,
        rhs: Operand,
    },
    NullCheck {
        column: String,
        is_null: bool,
    },
    In {
        column: String,
        list: InList,
        negated: bool,
    },
    Between {
        column: String,
        low: Operand,
        high: Operand,
        negated: bool,
    },
    Exists {
        select: Box<Select<'static>>,
        negated: bool,
    },
    Template {
        sql: String,
        args: Vec<Arg>,
    },
}

fn bare(column: &str) -> String {
    column
        .rsplit_once('.')
        .map_or(column, |(_, name)| name)
        .trim_matches('`')
        .to_string()
}

impl Cond {
    pub fn and(conds: Vec<Cond>) -> Self {
        Cond::And(conds)
    }

    pub fn or(conds: Vec<Cond>) -> Self {
        Cond::Or(conds)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(cond: Cond) -> Self {
        Cond::Not(Box::new(cond))
    }

    pub fn cmp(column: impl Into<String>, op: CmpOp, value: impl Into<Arg>) -> Self {
        Cond::Compare {
            column: column.into(),
            op,
            rhs: Operand::Arg(value.into()),
        }
    }

    /// `column = value`; a NULL value renders `IS NULL`, a slice renders `IN`.
    pub fn eq(column: impl Into<String>, value: impl Into<Arg>) -> Self {
        Self::cmp(column, CmpOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Arg>) -> Self {
        Self::cmp(column, CmpOp::Ne, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Arg>) -> Self {
        Self::cmp(column, CmpOp::Gt, value)
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Arg>) -> Self {
        Self::cmp(column, CmpOp::Gte, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Arg>) -> Self {
        Self::cmp(column, CmpOp::Lt, value)
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Arg>) -> Self {
        Self::cmp(column, CmpOp::Lte, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<Arg>) -> Self {
        Self::cmp(column, CmpOp::Like, pattern)
    }

    pub fn not_like(column: impl Into<String>, pattern: impl Into<Arg>) -> Self {
        Self::cmp(column, CmpOp::NotLike, pattern)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Cond::NullCheck {
            column: column.into(),
            is_null: true,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Cond::NullCheck {
            column: column.into(),
            is_null: false,
        }
    }

    pub fn in_list(column: impl Into<String>, values: impl Into<Slice>) -> Self {
        Cond::In {
            column: column.into(),
            list: InList::Values(Arg::Slice(values.into())),
            negated: false,
        }
    }

    pub fn not_in(column: impl Into<String>, values: impl Into<Slice>) -> Self {
        Cond::In {
            column: column.into(),
            list: InList::Values(Arg::Slice(values.into())),
            negated: true,
        }
    }

    pub fn between(column: impl Into<String>, low: impl Into<Arg>, high: impl Into<Arg>) -> Self {
        Cond::Between {
            column: column.into(),
            low: Operand::Arg(low.into()),
            high: Operand::Arg(high.into()),
            negated: false,
        }
    }

    pub fn not_between(
        column: impl Into<String>,
        low: impl Into<Arg>,
        high: impl Into<Arg>,
    ) -> Self {
        Cond::Between {
            column: column.into(),
            low: Operand::Arg(low.into()),
            high: Operand::Arg(high.into()),
            negated: true,
        }
    }

    /// `left = right` for two columns (join conditions).
    pub fn eq_col(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::cmp_col(left, CmpOp::Eq, right)
    }

    pub fn cmp_col(left: impl Into<String>, op: CmpOp, right: impl Into<String>) -> Self {
        Cond::Compare {
            column: left.into(),
            op,
            rhs: Operand::Column(right.into()),
        }
    }

    /// `column op <raw sql>`
    pub fn cmp_expr(column: impl Into<String>, op: CmpOp, expr: impl Into<String>) -> Self {
        Cond::Compare {
            column: column.into(),
            op,
            rhs: Operand::Expr(expr.into()),
        }
    }

    /// `column = ?`, bound when a prepared statement executes.
    pub fn eq_placeholder(column: impl Into<String>) -> Self {
        Self::cmp_placeholder(column, CmpOp::Eq)
    }

    pub fn cmp_placeholder(column: impl Into<String>, op: CmpOp) -> Self {
        Cond::Compare {
            column: column.into(),
            op,
            rhs: Operand::Placeholder,
        }
    }

    /// `column IN (?,?,..)` with `n` positional placeholders.
    pub fn in_placeholders(column: impl Into<String>, n: usize) -> Self {
        Cond::In {
            column: column.into(),
            list: InList::Placeholders(n),
            negated: false,
        }
    }

    /// `column BETWEEN ? AND ?`
    pub fn between_placeholders(column: impl Into<String>) -> Self {
        Cond::Between {
            column: column.into(),
            low: Operand::Placeholder,
            high: Operand::Placeholder,
            negated: false,
        }
    }

    /// `column = <value of the bound record's column>`.
    pub fn eq_record(column: impl Into<String>) -> Self {
        let column = column.into();
        let key = bare(&column);
        Self::cmp_record(column, CmpOp::Eq, key)
    }

    /// Comparison against the bound record's `key` column.
    pub fn cmp_record(column: impl Into<String>, op: CmpOp, key: impl Into<String>) -> Self {
        Cond::Compare {
            column: column.into(),
            op,
            rhs: Operand::Named(key.into()),
        }
    }

    /// `column IN (...)` with the de-duplicated values of a bound collection.
    pub fn in_record(column: impl Into<String>) -> Self {
        let column = column.into();
        let key = bare(&column);
        Cond::In {
            column,
            list: InList::Named(key),
            negated: false,
        }
    }

    pub fn in_select(column: impl Into<String>, select: Select<'static>) -> Self {
        Cond::In {
            column: column.into(),
            list: InList::Select(Box::new(select)),
            negated: false,
        }
    }

    pub fn not_in_select(column: impl Into<String>, select: Select<'static>) -> Self {
        Cond::In {
            column: column.into(),
            list: InList::Select(Box::new(select)),
            negated: true,
        }
    }

    pub fn exists(select: Select<'static>) -> Self {
        Cond::Exists {
            select: Box::new(select),
            negated: false,
        }
    }

    pub fn not_exists(select: Select<'static>) -> Self {
        Cond::Exists {
            select: Box::new(select),
            negated: true,
        }
    }

    /// Raw SQL with `?` markers, one per arg.
    ///
    /// # Example
    /// ```ignore
    /// Cond::raw("COUNT(*) > ? OR `flag` = ?", Args::new().int(2).bool(true))
    /// ```
    pub fn raw(sql: impl Into<String>, args: Args) -> Self {
        Cond::Template {
            sql: sql.into(),
            args: args.into_inner(),
        }
    }

    /// Raw SQL fragment without arguments.
    pub fn raw_sql(sql: impl Into<String>) -> Self {
        Cond::Template {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// Check if this condition renders nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Cond::And(conds) | Cond::Or(conds) => conds.iter().all(Cond::is_empty),
            Cond::Not(inner) => inner.is_empty(),
            Cond::Template { sql, .. } => sql.trim().is_empty(),
            _ => false,
        }
    }

    /// Record column names consumed by named placeholders, in render order.
    pub(crate) fn named_columns(&self, out: &mut Vec<String>) {
        match self {
            Cond::And(conds) | Cond::Or(conds) => {
                for c in conds {
                    c.named_columns(out);
                }
            }
            Cond::Not(inner) => inner.named_columns(out),
            Cond::Compare {
                rhs: Operand::Named(key),
                ..
            } => out.push(key.clone()),
            Cond::Between { low, high, .. } => {
                for op in [low, high] {
                    if let Operand::Named(key) = op {
                        out.push(key.clone());
                    }
                }
            }
            Cond::In { list, .. } => match list {
                InList::Named(key) => out.push(key.clone()),
                InList::Select(select) => select.named_columns(out),
                _ => {}
            },
            Cond::Exists { select, .. } => select.named_columns(out),
            _ => {}
        }
    }

    /// Columns of positional placeholders, in render order.
    pub(crate) fn placeholder_columns(&self, out: &mut Vec<String>) {
        match self {
            Cond::And(conds) | Cond::Or(conds) => {
                for c in conds {
                    c.placeholder_columns(out);
                }
            }
            Cond::Not(inner) => inner.placeholder_columns(out),
            Cond::Compare {
                column,
                rhs: Operand::Placeholder,
                ..
            } => out.push(bare(column)),
            Cond::Between {
                column, low, high, ..
            } => {
                for op in [low, high] {
                    if matches!(op, Operand::Placeholder) {
                        out.push(bare(column));
                    }
                }
            }
            Cond::In {
                column,
                list: InList::Placeholders(n),
                ..
            } => out.extend(std::iter::repeat_n(bare(column), *n)),
            _ => {}
        }
    }

    /// Render the condition.
    pub(crate) fn write(&self, w: &mut SqlWriter) -> DmlResult<()> {
        match self {
            Cond::And(conds) => write_group(w, conds, " AND "),
            Cond::Or(conds) => write_group(w, conds, " OR "),
            Cond::Not(inner) => {
                if inner.is_empty() {
                    return Ok(());
                }
                w.push("NOT (");
                inner.write(w)?;
                w.push(")");
                Ok(())
            }
            Cond::Compare { column, op, rhs } => write_compare(w, column, *op, rhs),
            Cond::NullCheck { column, is_null } => {
                w.push_ident_str(column)?;
                w.push(if *is_null { " IS NULL" } else { " IS NOT NULL" });
                Ok(())
            }
            Cond::In {
                column,
                list,
                negated,
            } => write_in(w, column, list, *negated),
            Cond::Between {
                column,
                low,
                high,
                negated,
            } => {
                w.push_ident_str(column)?;
                w.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                write_operand(w, low)?;
                w.push(" AND ");
                write_operand(w, high)
            }
            Cond::Exists { select, negated } => {
                w.push(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                select.write(w)?;
                w.push(")");
                Ok(())
            }
            Cond::Template { sql, args } => {
                w.push_template(sql, args)?;
                Ok(())
            }
        }
    }
}

/// Write conditions joined by AND / OR, parenthesising nested groups of the other kind.
pub(crate) fn write_group(w: &mut SqlWriter, conds: &[Cond], sep: &str) -> DmlResult<()> {
    let live = conds.iter().filter(|c| !c.is_empty()).count();
    let mut first = true;
    for cond in conds.iter().filter(|c| !c.is_empty()) {
        if !first {
            w.push(sep);
        }
        first = false;
        // a lone group at its level needs no parentheses
        let wrap = live > 1
            && match cond {
                Cond::And(inner) => {
                    sep == " OR " && inner.iter().filter(|c| !c.is_empty()).count() > 1
                }
                Cond::Or(inner) => {
                    sep == " AND " && inner.iter().filter(|c| !c.is_empty()).count() > 1
                }
                Cond::Template { .. } => true,
                _ => false,
            };
        if wrap {
            w.push("(");
            cond.write(w)?;
            w.push(")");
        } else {
            cond.write(w)?;
        }
    }
    Ok(())
}

fn write_operand(w: &mut SqlWriter, rhs: &Operand) -> DmlResult<()> {
    match rhs {
        Operand::Arg(arg) => {
            w.push_arg(arg)?;
        }
        Operand::Column(col) => {
            w.push_ident_str(col)?;
        }
        Operand::Placeholder => {
            w.push_placeholder();
        }
        Operand::Named(key) => {
            w.push_named(key)?;
        }
        Operand::Expr(sql) => {
            w.push(sql);
        }
    }
    Ok(())
}

fn write_compare(w: &mut SqlWriter, column: &str, op: CmpOp, rhs: &Operand) -> DmlResult<()> {
    match (op, rhs) {
        (CmpOp::Eq | CmpOp::Ne, Operand::Arg(Arg::Scalar(Value::Null))) => {
            w.push_ident_str(column)?;
            w.push(if op == CmpOp::Eq {
                " IS NULL"
            } else {
                " IS NOT NULL"
            });
            Ok(())
        }
        (CmpOp::Eq | CmpOp::Ne, Operand::Arg(Arg::Slice(slice))) => write_in(
            w,
            column,
            &InList::Values(Arg::Slice(slice.clone())),
            op == CmpOp::Ne,
        ),
        _ => {
            w.push_ident_str(column)?;
            w.push_char(' ').push(op.as_sql()).push_char(' ');
            write_operand(w, rhs)
        }
    }
}

fn write_in(w: &mut SqlWriter, column: &str, list: &InList, negated: bool) -> DmlResult<()> {
    if let InList::Values(Arg::Slice(slice)) = list
        && slice.is_empty()
    {
        w.push(if negated { "1=1" } else { "1=0" });
        return Ok(());
    }
    w.push_ident_str(column)?;
    w.push(if negated { " NOT IN " } else { " IN " });
    match list {
        InList::Values(Arg::Slice(slice)) => {
            w.push_slice(slice)?;
        }
        InList::Values(Arg::Scalar(value)) => {
            w.push_char('(');
            w.push_value(value)?;
            w.push_char(')');
        }
        InList::Placeholders(n) => {
            w.push_placeholder_tuple(*n);
        }
        InList::Named(key) => {
            w.push_named_list(key)?;
        }
        InList::Select(select) => {
            w.push_char('(');
            select.write(w)?;
            w.push_char(')');
        }
    }
    Ok(())
}
