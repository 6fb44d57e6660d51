//! Serializable errors.

use crate::{
    any::Any,
    encoding::{Reader, Serializer, SerializerExt},
    errors::{ErrorKind, ValueError},
    rep::{overrun, De, Ser},
};
use std::fmt;

/// An error that travels as data: typestring `e`.
///
/// On the wire it is a type name (`s`), a message (`s`) and an attached value (`a`).
/// An `ErrorValue` with an empty type is not an error at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorValue {
    kind: String,
    message: String,
    value: Any,
}

/// A value or an error: typestring `xT`, or `X` when `T` is void-like.
pub type Expected<T> = Result<T, ErrorValue>;

impl ErrorValue {
    /// Creates a new `ErrorValue` without an attached value.
    pub fn new<K: Into<String>, M: Into<String>>(kind: K, message: M) -> Self {
        ErrorValue {
            kind: kind.into(),
            message: message.into(),
            value: Any::default(),
        }
    }

    /// Attaches `value` to the error.
    pub fn with_value(mut self, value: Any) -> Self {
        self.value = value;
        self
    }

    /// The error type.
    pub fn kind(&self) -> &str { &self.kind }

    /// The human readable message.
    pub fn message(&self) -> &str { &self.message }

    /// The attached value, void if none.
    pub fn value(&self) -> &Any { &self.value }

    /// Whether this is an error, i.e. the type is not empty.
    pub fn is_error(&self) -> bool { !self.kind.is_empty() }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl From<&ValueError> for ErrorValue {
    fn from(e: &ValueError) -> Self {
        let kind = match e.kind() {
            ErrorKind::Typestring => "typestring_error",
            ErrorKind::ValueMismatch => "value_mismatch_error",
            ErrorKind::TypeMismatch => "type_mismatch_error",
            ErrorKind::ExpectedWithError => "expected_with_error",
            ErrorKind::NotSerializable => "not_serializable_error",
        };
        ErrorValue::new(kind, e.message())
    }
}

impl Ser for ErrorValue {
    fn ser_type() -> String { "e".to_string() }

    fn ser_to<S: Serializer>(&self, out: &mut S) {
        out.put_bytes(self.kind.as_bytes());
        out.put_bytes(self.message.as_bytes());
        self.value.ser_to(out);
    }
}

impl<'de> De<'de> for ErrorValue {
    fn de_type() -> String { "e".to_string() }

    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        let kind = String::de(r).map_err(|_| overrun("e"))?;
        let message = String::de(r).map_err(|_| overrun("e"))?;
        let value = Any::de(r).map_err(|_| overrun("e"))?;
        Ok(ErrorValue {
            kind,
            message,
            value,
        })
    }
}

fn expected_type(inner: String) -> String {
    if inner.is_empty() {
        "X".to_string()
    } else {
        format!("x{}", inner)
    }
}

impl<T: Ser> Ser for Result<T, ErrorValue> {
    fn ser_type() -> String { expected_type(T::ser_type()) }

    fn ser_to<S: Serializer>(&self, out: &mut S) {
        out.put_bool(self.is_ok());
        match self {
            Ok(t) => t.ser_to(out),
            Err(e) => e.ser_to(out),
        }
    }
}

impl<'de, T: De<'de>> De<'de> for Result<T, ErrorValue> {
    fn de_type() -> String { expected_type(T::de_type()) }

    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        if r.read_bool().map_err(|_| overrun(&Self::de_type()))? {
            T::de(r).map(Ok)
        } else {
            ErrorValue::de(r).map(Err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{decode_full, encode_full};

    #[test]
    fn wire_form() {
        let e = ErrorValue::new("k", "msg");
        let enc = encode_full(&e);
        assert_eq!(&enc[..5], &[0, 0, 0, 1, b'k']);
        assert_eq!(enc.len(), 5 + 7 + 8);
        assert_eq!(decode_full::<ErrorValue>(&enc).unwrap(), e);
    }

    #[test]
    fn expected() {
        assert_eq!(<Expected<i32>>::ser_type(), "xi");
        assert_eq!(<Expected<()>>::ser_type(), "X");
        assert_eq!(encode_full(&Expected::<()>::Ok(())), vec![1]);
        let err: Expected<i32> = Err(ErrorValue::new("bad", ""));
        let back: Expected<i32> = decode_full(&encode_full(&err)).unwrap();
        assert_eq!(back.unwrap_err().to_string(), "bad");
    }

    #[test]
    fn empty_is_not_an_error() {
        assert!(!ErrorValue::default().is_error());
        assert!(ErrorValue::new("x", "").is_error());
    }
}
