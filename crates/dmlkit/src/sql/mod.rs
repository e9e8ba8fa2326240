//! SQL text generation.
//!
//! All builders render through one [`SqlWriter`]. The writer walks the same
//! clauses in both [`RenderMode`]s; only the way an argument is written differs:
//!
//! - `Placeholder`: every argument becomes `?` and is appended to the output args
//! - `Interpolate`: every argument is rendered as a literal and no args are returned
//!
//! ```ignore
//! let mut w = SqlWriter::new(RenderMode::Interpolate, 64);
//! w.push("SELECT * FROM ");
//! w.push_ident_str("people")?;
//! w.push(" WHERE `name` = ");
//! w.push_arg(&Arg::from("O'Brien"))?;
//! assert_eq!(w.finish().0, "SELECT * FROM `people` WHERE `name` = 'O''Brien'");
//! ```

pub mod literal;
mod writer;


pub use literal::{write_literal, write_quoted_str};
pub use writer::{RenderMode, SqlWriter};
