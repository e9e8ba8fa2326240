use super::literal::{check_finite, write_literal};
use crate::args::{Arg, Args, Slice, Value};
use crate::error::{DmlError, DmlResult};
use crate::ident::{Ident, write_quoted};
use std::collections::VecDeque;

/// How arguments are written into the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// `?` markers plus an ordered argument list.
    #[default]
    Placeholder,
    /// Literals inlined; the argument list is empty.
    Interpolate,
}

/// SQL text buffer shared by all statement builders.
#[derive(Debug)]
pub struct SqlWriter {
    buf: String,
    args: Vec<Value>,
    mode: RenderMode,
    named: VecDeque<Arg>,
}

impl SqlWriter {
    pub fn new(mode: RenderMode, capacity: usize) -> Self {
        Self {
            buf: String::with_capacity(capacity),
            args: Vec::new(),
            mode,
            named: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn push(&mut self, s: &str) -> &mut Self {
        self.buf.push_str(s);
        self
    }

    pub fn push_char(&mut self, c: char) -> &mut Self {
        self.buf.push(c);
        self
    }

    /// Write a statement keyword followed by the `/*ID:..*/` correlation comment.
    pub fn push_keyword(&mut self, keyword: &str, id: Option<&str>) -> &mut Self {
        self.buf.push_str(keyword);
        if let Some(id) = id {
            self.buf.push_str(" /*ID:");
            self.buf.push_str(&id.replace("*/", "* /"));
            self.buf.push_str("*/");
        }
        self
    }

    pub fn push_ident(&mut self, ident: &Ident) -> &mut Self {
        ident.write_sql(&mut self.buf);
        self
    }

    /// Parse and write a (possibly dotted) identifier.
    pub fn push_ident_str(&mut self, name: &str) -> DmlResult<&mut Self> {
        let ident = Ident::parse(name)?;
        Ok(self.push_ident(&ident))
    }

    /// Write a single identifier part without splitting on dots.
    pub fn push_quoted(&mut self, part: &str) -> &mut Self {
        write_quoted(&mut self.buf, part);
        self
    }

    /// Write a positional `?` which is bound at execution time.
    ///
    /// Stays `?` in both render modes.
    pub fn push_placeholder(&mut self) -> &mut Self {
        self.buf.push('?');
        self
    }

    /// Non-finite floats are rejected in both modes.
    pub fn push_value(&mut self, value: &Value) -> DmlResult<&mut Self> {
        match self.mode {
            RenderMode::Placeholder => {
                check_finite(value)?;
                self.buf.push('?');
                self.args.push(value.clone());
            }
            RenderMode::Interpolate => write_literal(&mut self.buf, value)?,
        }
        Ok(self)
    }

    /// Write a scalar as one marker, a slice as a parenthesised tuple.
    pub fn push_arg(&mut self, arg: &Arg) -> DmlResult<&mut Self> {
        match arg {
            Arg::Scalar(v) => self.push_value(v),
            Arg::Slice(s) => self.push_slice(s),
        }
    }

    /// Fails on an empty slice. IN lists deal with emptiness before they
    /// reach the writer.
    pub fn push_slice(&mut self, slice: &Slice) -> DmlResult<&mut Self> {
        if slice.is_empty() {
            return Err(DmlError::empty("value list has no elements"));
        }
        self.buf.push('(');
        for (i, v) in slice.to_values().iter().enumerate() {
            if i > 0 {
                self.buf.push(',');
            }
            self.push_value(v)?;
        }
        self.buf.push(')');
        Ok(self)
    }

    /// Write `(a,b,c)` where every entry may itself be a slice.
    pub fn push_tuple(&mut self, args: &[Arg]) -> DmlResult<&mut Self> {
        self.buf.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.buf.push(',');
            }
            self.push_arg(arg)?;
        }
        self.buf.push(')');
        Ok(self)
    }

    /// Write `(?,?,?)` with `n` positional placeholders.
    pub fn push_placeholder_tuple(&mut self, n: usize) -> &mut Self {
        self.buf.reserve(n * 2 + 1);
        self.buf.push('(');
        for i in 0..n {
            if i > 0 {
                self.buf.push(',');
            }
            self.buf.push('?');
        }
        self.buf.push(')');
        self
    }

    /// Write a raw fragment, replacing each `?` outside of quotes with the next arg.
    pub fn push_template(&mut self, template: &str, args: &[Arg]) -> DmlResult<&mut Self> {
        let mut next = 0usize;
        let mut quote: Option<char> = None;
        for ch in template.chars() {
            match quote {
                Some(q) => {
                    if ch == q {
                        quote = None;
                    }
                    self.buf.push(ch);
                }
                None => match ch {
                    '\'' | '"' | '`' => {
                        quote = Some(ch);
                        self.buf.push(ch);
                    }
                    '?' => {
                        let arg = args.get(next).ok_or_else(|| {
                            DmlError::mismatch(format!(
                                "template {template:?} has more placeholders than the {} args given",
                                args.len()
                            ))
                        })?;
                        self.push_arg(arg)?;
                        next += 1;
                    }
                    c => self.buf.push(c),
                },
            }
        }
        if next != args.len() {
            return Err(DmlError::mismatch(format!(
                "template {template:?} has {next} placeholders but {} args were given",
                args.len()
            )));
        }
        Ok(self)
    }

    /// Queue values for record-bound named placeholders, in clause order.
    pub(crate) fn set_named(&mut self, args: Args) {
        self.named = args.into_iter().collect();
    }

    pub(crate) fn push_named(&mut self, name: &str) -> DmlResult<&mut Self> {
        let arg = self.named.pop_front().ok_or_else(|| {
            DmlError::mismatch(format!("no bound value for named placeholder {name:?}"))
        })?;
        self.push_arg(&arg)
    }

    /// Like [`push_named`](Self::push_named) but always renders a tuple.
    pub(crate) fn push_named_list(&mut self, name: &str) -> DmlResult<&mut Self> {
        let arg = self.named.pop_front().ok_or_else(|| {
            DmlError::mismatch(format!("no bound value for named placeholder {name:?}"))
        })?;
        match &arg {
            Arg::Scalar(v) => {
                self.buf.push('(');
                self.push_value(v)?;
                self.buf.push(')');
                Ok(self)
            }
            Arg::Slice(s) if s.is_empty() => Err(DmlError::empty(format!(
                "bound collection has no values for {name:?}"
            ))),
            Arg::Slice(s) => self.push_slice(s),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn finish(self) -> (String, Vec<Value>) {
        (self.buf, self.args)
    }
}
