//! # Binary encoder and decoder
//!
//! Encode and decode functions for native values with a fixed typestring.
//!
//! # Example
//!
//! ```
//! use ufser::prelude::*;
//!
//! let some_data = (1i32, "two".to_string(), vec![3.0f64]);
//!
//! // encoded all at once
//! let enc_full = encode_full(&some_data);
//!
//! // or into a buffer of our own
//! let out = &mut Vec::new();
//! encode(&some_data, out);
//!
//! // they are equivalent
//! assert_eq!(*out, enc_full);
//! assert_eq!(<(i32, String, Vec<f64>)>::ser_type(), "t3isld");
//!
//! // decoding returns a `Result`
//! let dec: (i32, String, Vec<f64>) = decode_full(&enc_full).unwrap();
//! assert_eq!(dec, some_data);
//! ```

use crate::{
    errors::ValueError,
    rep::{De, Ser},
    typestring::Outcome,
};

pub mod ser;
pub use ser::*;
pub mod de;
pub use de::*;
pub(crate) mod constants;

/// Serializes `t` into `out`.
#[inline]
pub fn encode<T: Ser + ?Sized, S: Serializer>(t: &T, out: &mut S) { t.ser_to(out) }

/// Serializes `t` into a fresh buffer of exactly the right size.
pub fn encode_full<T: Ser + ?Sized>(t: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(t.ser_len());
    t.ser_to(&mut out);
    out
}

/// Deserializes a `T` from the front of `r`.
#[inline]
pub fn decode<'de, T: De<'de>>(r: &mut Reader<'de>) -> Result<T, ValueError> { T::de(r) }

/// Deserializes a `T` that spans all of `data`.
///
/// # Errors
///
/// Fails with a value mismatch if `data` is too short or too long for `T`.
pub fn decode_full<'de, T: De<'de>>(data: &'de [u8]) -> Result<T, ValueError> {
    let mut r = Reader::new(data);
    let t = T::de(&mut r)?;
    if r.is_empty() {
        Ok(t)
    } else {
        Err(ValueError::value_mismatch(
            Outcome::ExtraValueChars.message(),
            T::de_type().as_bytes(),
            None,
        ))
    }
}
