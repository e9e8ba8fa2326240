//! Identifier handling with MySQL backtick quoting.
//!
//! [`Ident`] represents a table or column name, supporting dotted notation
//! (`alias.column`) and parts that are already backtick-quoted.
//!
//! - Every part is rendered backtick-quoted, embedded backticks doubled
//! - A bare `*` part is rendered verbatim (`t.*`)
//! - Parts may not be empty or contain NUL
//!
//! # Example
//! ```ignore
//! use dmlkit::Ident;
//!
//! let t = Ident::parse("catalog.product_entity")?;
//! assert_eq!(t.to_sql(), "`catalog`.`product_entity`");
//! # Ok::<(), dmlkit::DmlError>(())
//! ```

use crate::error::{DmlError, DmlResult};

/// A SQL identifier (column, table, or schema name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<String>,
}

impl Ident {
    /// Create a single-part identifier without splitting on dots.
    pub fn quoted(name: &str) -> DmlResult<Self> {
        if name.is_empty() {
            return Err(DmlError::validation("Empty identifier"));
        }
        if name.contains('\0') {
            return Err(DmlError::validation(
                "Identifier cannot contain NUL character",
            ));
        }
        Ok(Self {
            parts: vec![name.to_string()],
        })
    }

    /// Parse an identifier string.
    ///
    /// - Dotted: `schema.table.column`
    /// - Quoted: `` `odd.name`.`col` ``
    /// - Star: `t.*`
    pub fn parse(s: &str) -> DmlResult<Self> {
        if s.is_empty() {
            return Err(DmlError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(DmlError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(DmlError::validation("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(DmlError::validation(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            if chars.peek() == Some(&'`') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('`') => {
                            if chars.peek() == Some(&'`') {
                                chars.next();
                                name.push('`');
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => return Err(DmlError::validation("Unclosed quoted identifier")),
                    }
                }
                if name.is_empty() {
                    return Err(DmlError::validation("Empty quoted identifier"));
                }
                parts.push(name);
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                if c == '`' {
                    return Err(DmlError::validation(format!(
                        "Unexpected backtick in identifier '{s}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(DmlError::validation("Empty identifier segment"));
            }
            parts.push(name);
        }

        if parts.is_empty() {
            return Err(DmlError::validation("Empty identifier"));
        }

        Ok(Self { parts })
    }

    /// The last part, i.e. the bare column or table name.
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let cap = self.parts.iter().map(|p| p.len() + 3).sum();
        let mut out = String::with_capacity(cap);
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            write_quoted(out, part);
        }
    }
}

/// Backtick-quote one identifier part, doubling embedded backticks.
pub(crate) fn write_quoted(out: &mut String, part: &str) {
    if part == "*" {
        out.push('*');
        return;
    }
    out.push('`');
    for ch in part.chars() {
        if ch == '`' {
            out.push_str("``");
        } else {
            out.push(ch);
        }
    }
    out.push('`');
}

/// Convert an input into an [`Ident`].
///
/// This is mainly for ergonomics in builder APIs.
pub trait IntoIdent {
    fn into_ident(self) -> DmlResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> DmlResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> DmlResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> DmlResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> DmlResult<Ident> {
        Ident::parse(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        let ident = Ident::parse("users").unwrap();
        assert_eq!(ident.to_sql(), "`users`");
    }

    #[test]
    fn ident_dotted() {
        let ident = Ident::parse("main_table.entity_id").unwrap();
        assert_eq!(ident.to_sql(), "`main_table`.`entity_id`");
        assert_eq!(ident.name(), "entity_id");
    }

    #[test]
    fn ident_keeps_case() {
        let ident = Ident::parse("CamelCase").unwrap();
        assert_eq!(ident.to_sql(), "`CamelCase`");
    }

    #[test]
    fn ident_quoted_with_escape() {
        let ident = Ident::parse("`has``tick`.`a.b`").unwrap();
        assert_eq!(ident.parts, vec!["has`tick".to_string(), "a.b".to_string()]);
        assert_eq!(ident.to_sql(), "`has``tick`.`a.b`");
    }

    #[test]
    fn ident_star() {
        let ident = Ident::parse("t.*").unwrap();
        assert_eq!(ident.to_sql(), "`t`.*");
    }

    #[test]
    fn ident_rejects_empty() {
        assert!(Ident::parse("").is_err());
        assert!(Ident::parse("a..b").is_err());
        assert!(Ident::parse("a.").is_err());
    }

    #[test]
    fn ident_rejects_unclosed_quote() {
        assert!(Ident::parse("`unclosed").is_err());
    }

    #[test]
    fn quoted_does_not_split() {
        let ident = Ident::quoted("a.b").unwrap();
        assert_eq!(ident.to_sql(), "`a.b`");
    }
}
