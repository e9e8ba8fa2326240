//! Argument values and the ordered argument container.
//!
//! [`Value`] is the driver-level scalar handed to a [`Connection`](crate::client::Connection).
//! [`Arg`] is one entry of an [`Args`] container: either a scalar or a homogeneous slice that
//! expands into `(?,?,?)` when compiled.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;

/// A single driver-level value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Time(NaiveDateTime),
    Decimal(Decimal),
}

impl Value {
    /// Short type name used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Time(_) => "time",
            Value::Decimal(_) => "decimal",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! impl_value_from {
    ($($t:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v as $cast)
                }
            }
        )*
    };
}

impl_value_from!(
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => Uint as u64,
    u16 => Uint as u64,
    u32 => Uint as u64,
    u64 => Uint as u64,
    f32 => Float as f64,
    f64 => Float as f64,
);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Time(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v.naive_utc())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Time(v.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// A homogeneous list of values, rendered as a parenthesised tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum Slice {
    Bools(Vec<bool>),
    Ints(Vec<i64>),
    Uints(Vec<u64>),
    Floats(Vec<f64>),
    Texts(Vec<String>),
    Bytes(Vec<Vec<u8>>),
    Times(Vec<NaiveDateTime>),
    Decimals(Vec<Decimal>),
}

impl Slice {
    pub fn len(&self) -> usize {
        match self {
            Slice::Bools(v) => v.len(),
            Slice::Ints(v) => v.len(),
            Slice::Uints(v) => v.len(),
            Slice::Floats(v) => v.len(),
            Slice::Texts(v) => v.len(),
            Slice::Bytes(v) => v.len(),
            Slice::Times(v) => v.len(),
            Slice::Decimals(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends every element as a scalar [`Value`], keeping order.
    pub fn extend_values(&self, out: &mut Vec<Value>) {
        match self {
            Slice::Bools(v) => out.extend(v.iter().copied().map(Value::Bool)),
            Slice::Ints(v) => out.extend(v.iter().copied().map(Value::Int)),
            Slice::Uints(v) => out.extend(v.iter().copied().map(Value::Uint)),
            Slice::Floats(v) => out.extend(v.iter().copied().map(Value::Float)),
            Slice::Texts(v) => out.extend(v.iter().cloned().map(Value::Text)),
            Slice::Bytes(v) => out.extend(v.iter().cloned().map(Value::Bytes)),
            Slice::Times(v) => out.extend(v.iter().copied().map(Value::Time)),
            Slice::Decimals(v) => out.extend(v.iter().copied().map(Value::Decimal)),
        }
    }

    pub fn to_values(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.len());
        self.extend_values(&mut out);
        out
    }
}

/// One entry of an [`Args`] container.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Scalar(Value),
    Slice(Slice),
}

impl Arg {
    /// Number of placeholders this entry expands to.
    pub fn placeholder_len(&self) -> usize {
        match self {
            Arg::Scalar(_) => 1,
            Arg::Slice(s) => s.len(),
        }
    }
}

macro_rules! impl_arg_from_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    Arg::Scalar(v.into())
                }
            }
        )*
    };
}

impl_arg_from_scalar!(
    Value,
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    &str,
    Vec<u8>,
    &[u8],
    NaiveDateTime,
    DateTime<Utc>,
    NaiveDate,
    Decimal,
);

impl<T: Into<Value>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        Arg::Scalar(Value::from(v))
    }
}

impl From<Slice> for Arg {
    fn from(s: Slice) -> Self {
        Arg::Slice(s)
    }
}

macro_rules! impl_slice_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$t>> for Slice {
                fn from(v: Vec<$t>) -> Self {
                    Slice::$variant(v)
                }
            }
        )*
    };
}

impl_slice_from!(
    bool => Bools,
    i64 => Ints,
    u64 => Uints,
    f64 => Floats,
    String => Texts,
    Vec<u8> => Bytes,
    NaiveDateTime => Times,
    Decimal => Decimals,
);

impl From<Vec<&str>> for Slice {
    fn from(v: Vec<&str>) -> Self {
        Slice::Texts(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<i32>> for Slice {
    fn from(v: Vec<i32>) -> Self {
        Slice::Ints(v.into_iter().map(i64::from).collect())
    }
}

/// Ordered argument container.
///
/// Entry order must match the placeholder order the compiler emits.
///
/// ```ignore
/// let args = Args::new().int(1).text("A").int(2).text("B");
/// assert_eq!(args.len(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    items: Vec<Arg>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Append any scalar or slice.
    pub fn push(&mut self, arg: impl Into<Arg>) {
        self.items.push(arg.into());
    }

    /// Append a slice entry.
    pub fn push_slice(&mut self, slice: impl Into<Slice>) {
        self.items.push(Arg::Slice(slice.into()));
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.push(arg);
        self
    }

    pub fn null(self) -> Self {
        self.arg(Value::Null)
    }

    pub fn bool(self, v: bool) -> Self {
        self.arg(v)
    }

    pub fn int(self, v: i64) -> Self {
        self.arg(v)
    }

    pub fn uint(self, v: u64) -> Self {
        self.arg(v)
    }

    pub fn float(self, v: f64) -> Self {
        self.arg(v)
    }

    pub fn text(self, v: impl Into<String>) -> Self {
        self.arg(v.into())
    }

    pub fn bytes(self, v: impl Into<Vec<u8>>) -> Self {
        self.arg(v.into())
    }

    pub fn time(self, v: NaiveDateTime) -> Self {
        self.arg(v)
    }

    pub fn decimal(self, v: Decimal) -> Self {
        self.arg(v)
    }

    /// Append a nullable value; `None` becomes `NULL`.
    pub fn opt<T: Into<Value>>(self, v: Option<T>) -> Self {
        self.arg(Value::from(v))
    }

    pub fn ints(mut self, v: impl Into<Vec<i64>>) -> Self {
        let v: Vec<i64> = v.into();
        self.push_slice(v);
        self
    }

    pub fn uints(mut self, v: impl Into<Vec<u64>>) -> Self {
        let v: Vec<u64> = v.into();
        self.push_slice(v);
        self
    }

    pub fn floats(mut self, v: impl Into<Vec<f64>>) -> Self {
        let v: Vec<f64> = v.into();
        self.push_slice(v);
        self
    }

    pub fn texts<S: Into<String>>(mut self, v: impl IntoIterator<Item = S>) -> Self {
        self.push_slice(v.into_iter().map(Into::into).collect::<Vec<String>>());
        self
    }

    pub fn times(mut self, v: impl Into<Vec<NaiveDateTime>>) -> Self {
        let v: Vec<NaiveDateTime> = v.into();
        self.push_slice(v);
        self
    }

    pub fn decimals(mut self, v: impl Into<Vec<Decimal>>) -> Self {
        let v: Vec<Decimal> = v.into();
        self.push_slice(v);
        self
    }

    /// Number of container entries (a slice counts once).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of placeholders after slice expansion.
    pub fn flat_len(&self) -> usize {
        self.items.iter().map(Arg::placeholder_len).sum()
    }

    pub fn as_slice(&self) -> &[Arg] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Expand slices positionally into driver values.
    pub fn flatten(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.flat_len());
        for item in &self.items {
            match item {
                Arg::Scalar(v) => out.push(v.clone()),
                Arg::Slice(s) => s.extend_values(&mut out),
            }
        }
        out
    }

    pub fn into_inner(self) -> Vec<Arg> {
        self.items
    }
}

impl From<Vec<Arg>> for Args {
    fn from(items: Vec<Arg>) -> Self {
        Self { items }
    }
}

impl FromIterator<Arg> for Args {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl Extend<Arg> for Args {
    fn extend<I: IntoIterator<Item = Arg>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl IntoIterator for Args {
    type Item = Arg;
    type IntoIter = std::vec::IntoIter<Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Args {
    type Item = &'a Arg;
    type IntoIter = std::slice::Iter<'a, Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_expands_slices_in_order() {
        let args = Args::new().int(1).ints(vec![2i64, 3]).text("x");
        assert_eq!(args.len(), 3);
        assert_eq!(args.flat_len(), 4);
        assert_eq!(
            args.flatten(),
            vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
                Value::Text("x".into())
            ]
        );
    }

    #[test]
    fn none_becomes_null() {
        let args = Args::new().opt::<i64>(None).opt(Some("a"));
        assert_eq!(args.flatten(), vec![Value::Null, Value::Text("a".into())]);
    }

    #[test]
    fn narrow_integers_widen() {
        assert_eq!(Value::from(7i32), Value::Int(7));
        assert_eq!(Value::from(7u16), Value::Uint(7));
    }
}
