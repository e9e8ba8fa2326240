//! Record ↔ column mapping.
//!
//! A record type implements [`ColumnMapper`] once and the same method serves
//! argument construction (INSERT values, UPDATE SET, WHERE placeholders) and
//! row scanning. Field binders take `&mut` so the direction is decided by the
//! [`MapMode`] of the [`ColumnMap`] passed in.
//!
//! ```ignore
//! impl ColumnMapper for Person {
//!     fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
//!         if cm.mode() == MapMode::ReadAll {
//!             cm.int(&mut self.id)?.text(&mut self.name)?.field(&mut self.email)?;
//!             return Ok(());
//!         }
//!         while cm.next() {
//!             match cm.column() {
//!                 "id" => cm.int(&mut self.id)?,
//!                 "name" => cm.text(&mut self.name)?,
//!                 "email" => cm.field(&mut self.email)?,
//!                 other => return Err(cm.unknown_column(other, "dml_person")),
//!             };
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::args::{Arg, Args, Slice, Value};
use crate::error::{DmlError, DmlResult};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::hash::Hash;

/// Direction and shape of one mapping pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Push a value for every column in the record's own fixed order.
    ReadAll,
    /// Push values only for the requested columns, in request order.
    ReadSelected,
    /// Write the current result row into the record.
    Scan,
    /// Push one de-duplicated slice per requested column (collections).
    CollectSet,
}

/// Bidirectional mapping between a record and columns.
pub trait ColumnMapper: Send {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()>;

    /// Called after a single-record INSERT with the driver's last insert id.
    fn assign_last_insert_id(&mut self, _id: u64) {}
}

impl<T: ColumnMapper + ?Sized> ColumnMapper for &mut T {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
        (**self).map_columns(cm)
    }

    fn assign_last_insert_id(&mut self, id: u64) {
        (**self).assign_last_insert_id(id)
    }
}

impl<T: ColumnMapper + ?Sized> ColumnMapper for Box<T> {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
        (**self).map_columns(cm)
    }

    fn assign_last_insert_id(&mut self, id: u64) {
        (**self).assign_last_insert_id(id)
    }
}

/// Conversion from a scanned driver value.
pub trait FromValue: Sized {
    const EXPECTED: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

/// Conversion into a driver value for read modes.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

fn text_of(value: &Value) -> Option<&str> {
    match value {
        Value::Text(s) => Some(s),
        Value::Bytes(b) => std::str::from_utf8(b).ok(),
        _ => None,
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(*v),
            Value::Uint(v) => i64::try_from(*v).ok(),
            Value::Bool(v) => Some(i64::from(*v)),
            other => text_of(other)?.parse().ok(),
        }
    }
}

impl FromValue for u64 {
    const EXPECTED: &'static str = "uint";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Uint(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            Value::Bool(v) => Some(u64::from(*v)),
            other => text_of(other)?.parse().ok(),
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Uint(v) => Some(*v as f64),
            Value::Decimal(d) => d.to_string().parse().ok(),
            other => text_of(other)?.parse().ok(),
        }
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::Uint(v) => Some(*v != 0),
            other => match text_of(other)? {
                "1" | "true" | "TRUE" => Some(true),
                "0" | "false" | "FALSE" => Some(false),
                _ => None,
            },
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "text";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
            Value::Int(v) => Some(v.to_string()),
            Value::Uint(v) => Some(v.to_string()),
            Value::Decimal(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

impl FromValue for Vec<u8> {
    const EXPECTED: &'static str = "bytes";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bytes(b) => Some(b.clone()),
            Value::Text(s) => Some(s.clone().into_bytes()),
            _ => None,
        }
    }
}

impl FromValue for NaiveDateTime {
    const EXPECTED: &'static str = "time";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Time(t) => Some(*t),
            other => {
                let s = text_of(other)?;
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()
            }
        }
    }
}

impl FromValue for Decimal {
    const EXPECTED: &'static str = "decimal";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Decimal(d) => Some(*d),
            Value::Int(v) => Some(Decimal::from(*v)),
            Value::Uint(v) => Some(Decimal::from(*v)),
            Value::Float(v) => Decimal::try_from(*v).ok(),
            other => text_of(other)?.parse().ok(),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Clone + Into<Value>> ToValue for T {
    fn to_value(&self) -> Value {
        self.clone().into()
    }
}

enum Target<'a> {
    Args(&'a mut Args),
    Row(&'a [Value]),
}

/// Cursor over a column list used for one record in one mapping pass.
pub struct ColumnMap<'a> {
    mode: MapMode,
    columns: &'a [String],
    cursor: Option<usize>,
    count: usize,
    target: Target<'a>,
}

impl<'a> ColumnMap<'a> {
    /// Every field in declaration order.
    pub fn read_all(args: &'a mut Args) -> Self {
        Self {
            mode: MapMode::ReadAll,
            columns: &[],
            cursor: None,
            count: 0,
            target: Target::Args(args),
        }
    }

    /// Only the listed columns, in list order.
    pub fn read_selected(columns: &'a [String], args: &'a mut Args) -> Self {
        Self {
            mode: MapMode::ReadSelected,
            columns,
            cursor: None,
            count: 0,
            target: Target::Args(args),
        }
    }

    /// Write row number `count` of a result set into the record.
    pub fn scan(columns: &'a [String], row: &'a [Value], count: usize) -> Self {
        Self {
            mode: MapMode::Scan,
            columns,
            cursor: None,
            count,
            target: Target::Row(row),
        }
    }

    /// One slice per listed column, collected across a collection.
    pub fn collect_set(columns: &'a [String], args: &'a mut Args) -> Self {
        Self {
            mode: MapMode::CollectSet,
            columns,
            cursor: None,
            count: 0,
            target: Target::Args(args),
        }
    }

    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Row index in Scan mode; 0 for the first row.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn columns(&self) -> &[String] {
        self.columns
    }

    /// Advance to the next column. Returns `false` once all are consumed.
    pub fn next(&mut self) -> bool {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.columns.len() {
            self.cursor = Some(next);
            true
        } else {
            self.cursor = Some(self.columns.len());
            false
        }
    }

    /// Bare name of the current column (qualifier and backticks stripped).
    pub fn column(&self) -> &str {
        match self.cursor.and_then(|c| self.columns.get(c)) {
            Some(col) => bare_name(col),
            None => "",
        }
    }

    /// Error for a column the record does not know.
    pub fn unknown_column(&self, column: &str, record: &str) -> DmlError {
        DmlError::column_not_found(column, record)
    }

    /// Error for a mode the record does not serve.
    pub fn unsupported(&self, record: &str) -> DmlError {
        DmlError::not_supported(format!("{record} does not support {:?}", self.mode))
    }

    fn current_value(&self) -> DmlResult<&'a Value> {
        let Target::Row(row) = self.target else {
            return Err(DmlError::not_supported("no result row in a read mode"));
        };
        let idx = self.cursor.ok_or_else(|| {
            DmlError::validation("ColumnMap::next must be called before scanning a field")
        })?;
        row.get(idx).ok_or_else(|| {
            DmlError::mismatch(format!(
                "result row has {} values but column {idx} was requested",
                row.len()
            ))
        })
    }

    fn push(&mut self, arg: Arg) -> DmlResult<&mut Self> {
        match &mut self.target {
            Target::Args(args) => {
                args.push(arg);
                Ok(self)
            }
            Target::Row(_) => Err(DmlError::not_supported(
                "cannot push arguments while scanning",
            )),
        }
    }

    /// Bind any field that converts both ways.
    pub fn field<T: FromValue + ToValue>(&mut self, field: &mut T) -> DmlResult<&mut Self> {
        match self.mode {
            MapMode::Scan => {
                let value = self.current_value()?;
                *field = T::from_value(value).ok_or_else(|| DmlError::TypeMismatch {
                    column: self.column().to_string(),
                    expected: T::EXPECTED,
                    found: value.type_name(),
                })?;
                Ok(self)
            }
            MapMode::ReadAll | MapMode::ReadSelected | MapMode::CollectSet => {
                let value = field.to_value();
                self.push(Arg::Scalar(value))
            }
        }
    }

    pub fn int(&mut self, field: &mut i64) -> DmlResult<&mut Self> {
        self.field(field)
    }

    pub fn uint(&mut self, field: &mut u64) -> DmlResult<&mut Self> {
        self.field(field)
    }

    pub fn float(&mut self, field: &mut f64) -> DmlResult<&mut Self> {
        self.field(field)
    }

    pub fn bool(&mut self, field: &mut bool) -> DmlResult<&mut Self> {
        self.field(field)
    }

    pub fn text(&mut self, field: &mut String) -> DmlResult<&mut Self> {
        self.field(field)
    }

    pub fn bytes(&mut self, field: &mut Vec<u8>) -> DmlResult<&mut Self> {
        self.field(field)
    }

    pub fn time(&mut self, field: &mut NaiveDateTime) -> DmlResult<&mut Self> {
        self.field(field)
    }

    pub fn decimal(&mut self, field: &mut Decimal) -> DmlResult<&mut Self> {
        self.field(field)
    }

    /// String list stored as a JSON array.
    pub fn text_list(&mut self, field: &mut Vec<String>) -> DmlResult<&mut Self> {
        match self.mode {
            MapMode::Scan => {
                let value = self.current_value()?;
                *field = match value {
                    Value::Null => Vec::new(),
                    other => text_of(other)
                        .and_then(|s| serde_json::from_str(s).ok())
                        .ok_or_else(|| DmlError::TypeMismatch {
                            column: self.column().to_string(),
                            expected: "json string array",
                            found: other.type_name(),
                        })?,
                };
                Ok(self)
            }
            _ => {
                let encoded = serde_json::to_string(&*field)
                    .map_err(|e| DmlError::Other(format!("encode string list: {e}")))?;
                self.push(Arg::Scalar(Value::Text(encoded)))
            }
        }
    }

    /// String list joined with a separator.
    ///
    /// Elements containing `sep` do not survive a round trip; prefer
    /// [`text_list`](Self::text_list) unless the column format is fixed.
    pub fn text_list_delimited(
        &mut self,
        field: &mut Vec<String>,
        sep: &str,
    ) -> DmlResult<&mut Self> {
        match self.mode {
            MapMode::Scan => {
                let value = self.current_value()?;
                *field = match value {
                    Value::Null => Vec::new(),
                    other => {
                        let s = text_of(other).ok_or_else(|| DmlError::TypeMismatch {
                            column: self.column().to_string(),
                            expected: "text",
                            found: other.type_name(),
                        })?;
                        if s.is_empty() {
                            Vec::new()
                        } else {
                            s.split(sep).map(str::to_string).collect()
                        }
                    }
                };
                Ok(self)
            }
            _ => {
                let joined = field.join(sep);
                self.push(Arg::Scalar(Value::Text(joined)))
            }
        }
    }

    /// Push a prepared argument (typically a slice in CollectSet mode).
    pub fn arg(&mut self, arg: impl Into<Arg>) -> DmlResult<&mut Self> {
        self.push(arg.into())
    }

    /// Push a slice argument.
    pub fn slice(&mut self, values: impl Into<Slice>) -> DmlResult<&mut Self> {
        self.push(Arg::Slice(values.into()))
    }
}

/// De-duplicate values keeping first-seen order.
pub fn unique_values<T, I>(values: I) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

fn bare_name(col: &str) -> &str {
    let name = col.rsplit_once('.').map_or(col, |(_, name)| name);
    name.trim_matches('`')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i64,
        name: String,
        email: Option<String>,
        tags: Vec<String>,
    }

    impl ColumnMapper for Person {
        fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
            if cm.mode() == MapMode::ReadAll {
                cm.int(&mut self.id)?
                    .text(&mut self.name)?
                    .field(&mut self.email)?
                    .text_list(&mut self.tags)?;
                return Ok(());
            }
            while cm.next() {
                match cm.column() {
                    "id" => cm.int(&mut self.id)?,
                    "name" => cm.text(&mut self.name)?,
                    "email" => cm.field(&mut self.email)?,
                    "tags" => cm.text_list(&mut self.tags)?,
                    other => return Err(cm.unknown_column(other, "dml_person")),
                };
            }
            Ok(())
        }
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn read_all_pushes_every_field_in_order() {
        let mut p = Person {
            id: 7,
            name: "Gopher".into(),
            email: None,
            tags: vec!["a".into()],
        };
        let mut args = Args::new();
        p.map_columns(&mut ColumnMap::read_all(&mut args)).unwrap();
        assert_eq!(
            args.flatten(),
            vec![
                Value::Int(7),
                Value::Text("Gopher".into()),
                Value::Null,
                Value::Text(r#"["a"]"#.into()),
            ]
        );
    }

    #[test]
    fn read_selected_follows_requested_order() {
        let mut p = Person {
            id: 7,
            name: "Gopher".into(),
            ..Default::default()
        };
        let columns = cols(&["name", "p.id"]);
        let mut args = Args::new();
        p.map_columns(&mut ColumnMap::read_selected(&columns, &mut args))
            .unwrap();
        assert_eq!(
            args.flatten(),
            vec![Value::Text("Gopher".into()), Value::Int(7)]
        );
    }

    #[test]
    fn read_selected_unknown_column() {
        let mut p = Person::default();
        let columns = cols(&["nope"]);
        let mut args = Args::new();
        let err = p
            .map_columns(&mut ColumnMap::read_selected(&columns, &mut args))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn scan_converts_values() {
        let columns = cols(&["id", "name", "email", "tags"]);
        let row = vec![
            Value::Text("42".into()),
            Value::Bytes(b"Gopher".to_vec()),
            Value::Null,
            Value::Text(r#"["x","y"]"#.into()),
        ];
        let mut p = Person::default();
        p.map_columns(&mut ColumnMap::scan(&columns, &row, 0))
            .unwrap();
        assert_eq!(
            p,
            Person {
                id: 42,
                name: "Gopher".into(),
                email: None,
                tags: vec!["x".into(), "y".into()],
            }
        );
    }

    #[test]
    fn scan_type_mismatch() {
        let columns = cols(&["id"]);
        let row = vec![Value::Float(1.5)];
        let mut p = Person::default();
        let err = p
            .map_columns(&mut ColumnMap::scan(&columns, &row, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            DmlError::TypeMismatch {
                expected: "int",
                found: "float",
                ..
            }
        ));
    }

    #[test]
    fn delimited_list_round_trip() {
        struct Codes(Vec<String>);
        impl ColumnMapper for Codes {
            fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
                cm.next();
                cm.text_list_delimited(&mut self.0, "|")?;
                Ok(())
            }
        }

        let columns = cols(&["codes"]);
        let mut codes = Codes(vec!["1FE9983E".into(), "28E76FBC".into()]);
        let mut args = Args::new();
        codes
            .map_columns(&mut ColumnMap::read_selected(&columns, &mut args))
            .unwrap();
        assert_eq!(args.flatten(), vec![Value::Text("1FE9983E|28E76FBC".into())]);

        let row = vec![Value::Text("A|B".into())];
        codes
            .map_columns(&mut ColumnMap::scan(&columns, &row, 0))
            .unwrap();
        assert_eq!(codes.0, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn unique_values_keeps_first_seen_order() {
        assert_eq!(unique_values(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn bare_name_strips_qualifier() {
        assert_eq!(bare_name("t.col"), "col");
        assert_eq!(bare_name("`t`.`col`"), "col");
        assert_eq!(bare_name("col"), "col");
    }
}
