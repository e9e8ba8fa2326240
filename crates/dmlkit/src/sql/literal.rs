//! Literal rendering for interpolated statements.

use crate::args::Value;
use crate::error::{DmlError, DmlResult};
use chrono::{NaiveDateTime, Timelike};
use std::fmt::Write as _;

/// Write a single-quoted string literal.
///
/// `'` is doubled; backslash, NUL, LF, CR and 0x1A are backslash-escaped.
///
/// Assumes the server's default `sql_mode`. With `NO_BACKSLASH_ESCAPES`
/// enabled the escapes are stored literally, so a backslash comes back doubled.
pub fn write_quoted_str(out: &mut String, s: &str) {
    out.reserve(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

fn write_hex(out: &mut String, bytes: &[u8]) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    out.reserve(bytes.len() * 2 + 2);
    out.push_str("0x");
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
}

fn write_time(out: &mut String, t: &NaiveDateTime) {
    out.push('\'');
    if t.nanosecond() / 1_000 == 0 {
        let _ = write!(out, "{}", t.format("%Y-%m-%d %H:%M:%S"));
    } else {
        let _ = write!(out, "{}", t.format("%Y-%m-%d %H:%M:%S%.6f"));
    }
    out.push('\'');
}

/// MySQL stores neither NaN nor infinities.
pub(crate) fn check_finite(value: &Value) -> DmlResult<()> {
    match value {
        Value::Float(v) if !v.is_finite() => Err(DmlError::validation(format!(
            "non-finite float {v} cannot be stored"
        ))),
        _ => Ok(()),
    }
}

/// Render one value as a SQL literal.
pub fn write_literal(out: &mut String, value: &Value) -> DmlResult<()> {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Bool(true) => out.push('1'),
        Value::Bool(false) => out.push('0'),
        Value::Int(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Uint(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Float(v) => {
            check_finite(value)?;
            let _ = write!(out, "{v}");
        }
        Value::Decimal(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Text(s) => write_quoted_str(out, s),
        Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => write_quoted_str(out, s),
            Err(_) => write_hex(out, b),
        },
        Value::Time(t) => write_time(out, t),
    }
    Ok(())
}
