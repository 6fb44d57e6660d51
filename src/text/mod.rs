//! # Text form
//!
//! Values print as source-like literals: numbers bare, strings in double quotes,
//! characters in single quotes, tuples in parentheses, lists in brackets and maps in
//! braces. An `any` prints its type in angle brackets before its value, so a whole
//! [`Any`](crate::any::Any) reads `<t2is>(1,"one")`. Empty optionals print nothing,
//! errors print as `err("type","message",<value>)`. Bytes outside printable ASCII are
//! escaped as `%xx`.
//!
//! The JSON form drops the types, prints tuples as arrays, empty optionals and void as
//! `null`, and backslash-escapes control characters in strings.
//!
//! The parser reads both forms back. A `<type>` prefix converts the value after it to
//! that type and wraps the result into an `a`.
//!
//! ```
//! use ufser::prelude::*;
//!
//! let a = Any::from_text("(1, \"one\", [2.5, 3.])").unwrap();
//! assert_eq!(a.typestring(), "t3isld");
//! assert_eq!(a.print().unwrap(), "<t3isld>(1,\"one\",[2.5,3.])");
//! assert_eq!(a.print_json().unwrap(), "[1,\"one\",[2.5,3]]");
//!
//! let b = Any::from_text("<I>5").unwrap();
//! assert_eq!(b.print().unwrap(), "<a><I>5");
//! ```

mod parse;
mod print;

pub use parse::{parse, ParseMode, TextError};
pub use print::{print_any, print_value, PrintOptions};
