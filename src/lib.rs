//! # ufser
//!
//! A typed binary serialization library. Every value travels with a *typestring*, a compact
//! description of its layout, and the payload itself carries no tags at all. Payloads can
//! be validated against their types, converted between types under a policy, and printed
//! to or parsed from a human readable text form.
//!
//! # Usage
//!
//! Native values implement [`Ser`](rep::Ser) and [`De`](rep::De), which fix their
//! typestring and how they are written and read.
//!
//! ```
//! use ufser::prelude::*;
//!
//! let point = (3i32, 4.5f64);
//! assert_eq!(<(i32, f64)>::ser_type(), "t2id");
//!
//! // encode
//! let encoded = encode_full(&point);
//!
//! // and then immediately decode
//! let decoded: (i32, f64) = decode_full(&encoded).unwrap();
//!
//! assert_eq!(point, decoded);
//! ```
//!
//! Values whose type is only known at runtime are held in an [`Any`](any::Any).
//!
//! ```
//! use ufser::prelude::*;
//!
//! let a = Any::new(&vec![1i32, 2, 3]);
//! assert_eq!(a.typestring(), "li");
//! assert_eq!(a.print().unwrap(), "<li>[1,2,3]");
//!
//! // widening ints needs a policy
//! assert!(a.get::<Vec<i64>>(SerPolicy::NONE).is_err());
//! assert_eq!(a.get::<Vec<i64>>(SerPolicy::INTS).unwrap(), vec![1, 2, 3]);
//! ```
//!
//! # An overview of the types
//!
//! | Typestring | Meaning                          | Native types                        |
//! | ---        | ---                              | ---                                 |
//! | `b`        | boolean                          | `bool`                              |
//! | `c`        | 8-bit character                  | `u8`, `i8`                          |
//! | `i`        | 32-bit integer                   | `i16`, `u16`, `i32`, `u32`          |
//! | `I`        | 64-bit integer                   | `i64`, `u64`, `isize`, `usize`      |
//! | `d`        | double                           | `f64`, `f32`                        |
//! | `s`        | string                           | `String`, `&str`                    |
//! | `a`        | any                              | [`Any`](any::Any)                   |
//! | `e`        | error                            | [`ErrorValue`]                      |
//! | `X`        | expected void                    | `Expected<()>`                      |
//! | `oT`       | optional                         | `Option<T>`                         |
//! | `xT`       | expected                         | `Expected<T>`                       |
//! | `lT`       | list                             | `Vec<T>`, `[T]`                     |
//! | `mKV`      | map                              | `BTreeMap<K, V>`, `HashMap<K, V>`   |
//! | `tNT1..TN` | tuple of `N >= 2` members        | tuples, `[T; N]`                    |
//!
//! The empty typestring is *void*: it has an empty payload, and is what `()` maps to.
//!
//! ## Conversions
//!
//! [`convert`](convert::convert) rewrites a payload of one type into another. Structural
//! conversions (between tuples, lists and maps of convertible members, or into an
//! optional) are always allowed. Everything lossy or surprising is behind a
//! [`SerPolicy`](policy::SerPolicy) flag.
//!
//! ```
//! use ufser::prelude::*;
//!
//! let v = encode_full(&(1i32, 2i32));
//! let out = convert("t2ii", "lI", SerPolicy::TUPLE_LIST | SerPolicy::INTS, &v).unwrap();
//! assert_eq!(decode_full::<Vec<i64>>(&out).unwrap(), vec![1, 2]);
//!
//! let e = convert("t2ii", "lI", SerPolicy::INTS, &v).unwrap_err();
//! assert_eq!(e.kind(), ErrorKind::TypeMismatch);
//! ```
//!
//! ## Text form
//!
//! See [`text`] for the syntax.
//!
//! ```
//! use ufser::prelude::*;
//!
//! let a = Any::from_text("{\"a\": 1, \"b\": 2}").unwrap();
//! assert_eq!(a.typestring(), "msi");
//! assert_eq!(a.print_json().unwrap(), "{\"a\":1,\"b\":2}");
//! ```
//!
//! # Specification
//!
//! This section describes the binary format. All numbers are big endian, and nothing is
//! aligned or padded.
//!
//! ## Primitives
//!
//! | Type | Width | Encoding                             |
//! | ---  | ---   | ---                                  |
//! | `b`  | 1     | `0` or `1`                           |
//! | `c`  | 1     | the byte                             |
//! | `i`  | 4     | two's complement                     |
//! | `I`  | 8     | two's complement                     |
//! | `d`  | 8     | IEEE 754 binary64                    |
//! | `s`  | 4 + n | `u32` length, then `n` bytes         |
//!
//! ## Compounds
//!
//! | Type  | Encoding                                                                |
//! | ---   | ---                                                                     |
//! | `oT`  | `0`, or `1` followed by a `T`                                           |
//! | `xT`  | `1` followed by a `T`, or `0` followed by an `e`                        |
//! | `X`   | `1`, or `0` followed by an `e`                                          |
//! | `lT`  | `u32` count, then that many `T`s                                        |
//! | `mKV` | `u32` count, then that many `K`, `V` pairs                              |
//! | `tN`  | the `N` members, back to back                                           |
//! | `e`   | two `s` (error type and message), then an `a`                           |
//! | `a`   | an `s` holding the typestring, then an `s` holding the payload          |
//!
//! A void `a` is therefore eight zero bytes. Counts and lengths are unsigned 32-bit, and
//! tuple arities are decimal digits after the `t`.

#![warn(
    deprecated_in_future,
    unsafe_code,
    unused_labels,
    keyword_idents,
    missing_copy_implementations,
    macro_use_extern_crate,
    unreachable_pub,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces
)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::len_zero)]

pub mod util;
pub mod errors;
pub mod policy;
pub mod typestring;
pub mod encoding;
pub mod rep;
pub mod error_value;
pub mod any;
pub mod scan;
pub mod convert;
pub mod defaults;
pub mod text;
pub mod prelude;

pub use any::{Any, AnyView};
pub use error_value::{ErrorValue, Expected};
pub use errors::ValueError;
pub use policy::SerPolicy;
