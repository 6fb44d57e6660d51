//! Self-describing values.
//!
//! An [`Any`] owns a typestring and a payload of that type. An [`AnyView`] borrows
//! both. On the wire, inside an `a`, they are the length-prefixed typestring followed
//! by the length-prefixed payload.
//!
//! ```
//! use ufser::prelude::*;
//!
//! let a = Any::new(&(1i32, "one".to_string()));
//! assert_eq!(a.typestring(), "t2is");
//! assert_eq!(a.get::<(i64, String)>(SerPolicy::ALL).unwrap(), (1, "one".to_string()));
//!
//! let items = a.view().get_content(None).unwrap();
//! assert_eq!(items[1].get::<String>(SerPolicy::NONE).unwrap(), "one");
//! ```

use crate::{
    convert::convert,
    defaults::default_value,
    encoding::{
        constants::HAS_VALUE, encode_full, decode_full, Reader, Serializer, SerializerExt,
    },
    errors::{TypePos, ValueError},
    policy::SerPolicy,
    rep::{cached_type, de_type_of, overrun, ser_type_of, De, DeOwned, Ser},
    scan::{scan, scan_from},
    text::{self, ParseMode, PrintOptions, TextError},
    typestring::{caret_pos, parse_count, parse_type, Outcome},
    util::escape,
};
use bytes::{Bytes, BytesMut};
use std::{
    borrow::Cow,
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};
use tracing::debug;

const RAW_INVALID: &str = "Raw string does not contain a valid serialized any.";
const RAW_EXTRA: &str = "Raw string contains extra characters after a serialized any.";
const NOT_AN_ANY: &str = "Cannot unwrap <%1>, only <%2>";

/// A borrowed typestring and payload.
///
/// Views made with [`AnyView::new`] are trusted to be consistent. The content accessors
/// still check what they read, so a bad payload gives an error and never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AnyView<'a> {
    ty: &'a str,
    value: &'a [u8],
}

/// An owned typestring and payload, stored in one shared buffer.
///
/// Cloning is cheap. The default is void: empty type and empty payload.
#[derive(Clone, Default)]
pub struct Any {
    buf: Bytes,
    type_len: usize,
}

fn type_str(ty: &[u8]) -> Result<&str, ValueError> {
    std::str::from_utf8(ty)
        .map_err(|e| ValueError::typestring(Outcome::InvalidChar, ty, e.valid_up_to()))
}

fn read_raw<'a>(r: &mut Reader<'a>) -> Option<(&'a [u8], &'a [u8])> {
    let ty = r.read_bytes().ok()?;
    let value = r.read_bytes().ok()?;
    Some((ty, value))
}

impl<'a> AnyView<'a> {
    /// A view of `value` as type `ty`, without checking them.
    pub fn new(ty: &'a str, value: &'a [u8]) -> Self { AnyView { ty, value } }

    /// A view of `value` as type `ty`, scanning the value recursively first.
    ///
    /// # Errors
    ///
    /// Whatever [`scan`] finds.
    pub fn from_type_value(ty: &'a str, value: &'a [u8]) -> Result<Self, ValueError> {
        scan(ty.as_bytes(), value, false, true).map_err(|e| {
            debug!(ty = %ty, error = %e, "rejected payload");
            e
        })?;
        Ok(AnyView { ty, value })
    }

    /// A view of a serialized `a`: length-prefixed type then length-prefixed value.
    ///
    /// # Arguments
    ///
    /// * `raw: &[u8]` - Exactly one serialized `a`.
    /// * `check: bool` - Whether to scan the contained value recursively.
    ///
    /// # Errors
    ///
    /// A value mismatch if `raw` is not one serialized `a`, a typestring error if the
    /// type is not text, or what [`scan`] finds when `check` is set.
    pub fn from_raw(raw: &'a [u8], check: bool) -> Result<Self, ValueError> {
        let mut r = Reader::new(raw);
        let (ty, value) =
            read_raw(&mut r).ok_or_else(|| ValueError::value_mismatch(RAW_INVALID, b"a", None))?;
        if !r.is_empty() {
            return Err(ValueError::value_mismatch(RAW_EXTRA, b"a", None));
        }
        let ty = type_str(ty)?;
        if check {
            AnyView::from_type_value(ty, value)
        } else {
            Ok(AnyView { ty, value })
        }
    }

    /// The typestring.
    pub fn typestring(&self) -> &'a str { self.ty }

    /// The payload.
    pub fn value(&self) -> &'a [u8] { self.value }

    /// Whether this is void.
    pub fn is_void(&self) -> bool { self.ty.is_empty() }

    /// Whether the type has contents: lists, maps, tuples, optionals, expecteds, `a`
    /// and `e`.
    pub fn is_structured_type(&self) -> bool {
        matches!(
            self.ty.as_bytes().first(),
            Some(b'l' | b'm' | b't' | b'o' | b'x' | b'X' | b'a' | b'e')
        )
    }

    /// Copies the view into an [`Any`].
    pub fn to_any(&self) -> Any { Any::from_type_value_unchecked(self.ty, self.value) }

    /// Length of the type at `off` in the typestring.
    fn type_at(&self, off: usize) -> Result<usize, ValueError> {
        let b = &self.ty.as_bytes()[off..];
        match parse_type(b, false) {
            (len, Outcome::Ok) => Ok(len),
            (len, o) => Err(ValueError::typestring(
                o,
                self.ty.as_bytes(),
                off + caret_pos(b, len, o),
            )),
        }
    }

    /// Cuts the value of the type at `ty[off..off + len]` from the front of `v`.
    fn carve(&self, off: usize, len: usize, v: &mut &'a [u8]) -> Result<AnyView<'a>, ValueError> {
        let ty = &self.ty[off..off + len];
        let start = *v;
        let mut t = ty.as_bytes();
        scan_from(&mut t, v, false).map_err(|mut e| {
            let all = self.ty.as_bytes();
            e.prepend_type0(&escape(&all[..off + len - t.len()]));
            e.append_type0(&escape(&all[off + len..]));
            e
        })?;
        Ok(AnyView {
            ty,
            value: &start[..start.len() - v.len()],
        })
    }

    /// Cuts a value of a fixed type from the front of `v`.
    fn carve_fixed(&self, ty: &'static str, v: &mut &'a [u8]) -> Result<AnyView<'a>, ValueError> {
        let start = *v;
        scan_from(&mut ty.as_bytes(), v, false).map_err(|_| overrun(self.ty))?;
        Ok(AnyView {
            ty,
            value: &start[..start.len() - v.len()],
        })
    }

    fn count(&self, v: &mut &'a [u8]) -> Result<usize, ValueError> {
        let mut r = Reader::new(v);
        let n = r.read_len().map_err(|_| overrun(self.ty))?;
        *v = r.rest();
        Ok(n)
    }

    fn flag(&self, v: &mut &'a [u8]) -> Result<u8, ValueError> {
        let (f, rest) = v.split_first().ok_or_else(|| overrun(self.ty))?;
        *v = rest;
        Ok(*f)
    }

    fn error_parts(&self, v: &mut &'a [u8], out: &mut Vec<AnyView<'a>>) -> Result<(), ValueError> {
        for &ty in &["s", "s", "a"] {
            out.push(self.carve_fixed(ty, v)?);
        }
        Ok(())
    }

    /// The parts of a structured value.
    ///
    /// List elements and map keys; tuple members; the value of a present optional; the
    /// value, or an `e`, of an expected; the contained value of an `a`; the type,
    /// message and value of an `e`. Other types have no parts.
    ///
    /// # Arguments
    ///
    /// * `max: Option<usize>` - At most this many parts are returned.
    ///
    /// # Errors
    ///
    /// A value mismatch when the payload is too short, or a typestring error.
    ///
    /// # Example
    ///
    /// ```
    /// use ufser::prelude::*;
    ///
    /// let a = Any::new(&vec![1i32, 2, 3]);
    /// let first_two = a.view().get_content(Some(2)).unwrap();
    /// assert_eq!(first_two.len(), 2);
    /// assert_eq!(first_two[1].get::<i32>(SerPolicy::NONE).unwrap(), 2);
    /// ```
    pub fn get_content(&self, max: Option<usize>) -> Result<Vec<AnyView<'a>>, ValueError> {
        let limit = max.unwrap_or(usize::MAX);
        let b = self.ty.as_bytes();
        let mut v = self.value;
        let mut out = Vec::new();
        match b.first() {
            Some(b'l') => {
                let elen = self.type_at(1)?;
                let n = self.count(&mut v)?;
                for _ in 0..n.min(limit) {
                    out.push(self.carve(1, elen, &mut v)?);
                }
            }
            Some(b'm') => {
                let klen = self.type_at(1)?;
                let vlen = self.type_at(1 + klen)?;
                let n = self.count(&mut v)?;
                for _ in 0..n.min(limit) {
                    out.push(self.carve(1, klen, &mut v)?);
                    self.carve(1 + klen, vlen, &mut v)?;
                }
            }
            Some(b't') => {
                let (n, digits) = parse_count(&b[1..]);
                let mut off = 1 + digits;
                for _ in 0..(n as usize).min(limit) {
                    let len = self.type_at(off)?;
                    out.push(self.carve(off, len, &mut v)?);
                    off += len;
                }
            }
            Some(b'o') => {
                if self.flag(&mut v)? == HAS_VALUE {
                    let len = self.type_at(1)?;
                    out.push(self.carve(1, len, &mut v)?);
                }
            }
            Some(b'x') => {
                if self.flag(&mut v)? == HAS_VALUE {
                    let len = self.type_at(1)?;
                    out.push(self.carve(1, len, &mut v)?);
                } else {
                    out.push(self.carve_fixed("e", &mut v)?);
                }
            }
            Some(b'X') => {
                if self.flag(&mut v)? == HAS_VALUE {
                    out.push(AnyView::default());
                } else {
                    out.push(self.carve_fixed("e", &mut v)?);
                }
            }
            Some(b'a') => out.push(AnyView::from_raw(v, false)?),
            Some(b'e') => self.error_parts(&mut v, &mut out)?,
            _ => {}
        }
        out.truncate(limit);
        Ok(out)
    }

    /// The key-value pairs of a map, at most `max` of them.
    ///
    /// A list `lK` counts as a map with void values. Other types have no pairs.
    ///
    /// # Errors
    ///
    /// As for [`AnyView::get_content`].
    pub fn get_map_content(
        &self,
        max: Option<usize>,
    ) -> Result<Vec<(AnyView<'a>, AnyView<'a>)>, ValueError> {
        let limit = max.unwrap_or(usize::MAX);
        let mut v = self.value;
        match self.ty.as_bytes().first() {
            Some(b'm') => {
                let klen = self.type_at(1)?;
                let vlen = self.type_at(1 + klen)?;
                let n = self.count(&mut v)?;
                let mut out = Vec::with_capacity(n.min(limit).min(v.len()));
                for _ in 0..n.min(limit) {
                    let key = self.carve(1, klen, &mut v)?;
                    let val = self.carve(1 + klen, vlen, &mut v)?;
                    out.push((key, val));
                }
                Ok(out)
            }
            Some(b'l') => Ok(self
                .get_content(max)?
                .into_iter()
                .map(|k| (k, AnyView::default()))
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// How many parts [`AnyView::get_content`] would return, read from headers only.
    pub fn get_content_size(&self) -> usize {
        let b = self.ty.as_bytes();
        match b.first() {
            Some(b'l' | b'm') => Reader::new(self.value).read_len().unwrap_or(0),
            Some(b'o') => usize::from(self.value.first() == Some(&HAS_VALUE)),
            Some(b'x' | b'X' | b'a') => 1,
            Some(b't') => parse_count(&b[1..]).0 as usize,
            Some(b'e') => 3,
            _ => 0,
        }
    }

    /// Extracts a native value, converting under `policy` if the types differ.
    ///
    /// # Errors
    ///
    /// What [`convert`] or decoding finds.
    pub fn get<T: DeOwned>(&self, policy: SerPolicy) -> Result<T, ValueError> {
        let ty = de_type_of::<T>()?;
        if ty == self.ty {
            return decode_full(self.value);
        }
        let conv = convert(self.ty, &ty, policy, self.value)?;
        decode_full(&conv)
    }

    /// Extracts a value that may borrow from the payload.
    ///
    /// If a conversion is needed its result is kept in `scratch`, and the value borrows
    /// from there.
    ///
    /// ```
    /// use ufser::prelude::*;
    ///
    /// let a = Any::new("hi");
    /// let mut scratch = Vec::new();
    /// let s: &str = a.view().get_view(&mut scratch, SerPolicy::NONE).unwrap();
    /// assert_eq!(s, "hi");
    /// ```
    pub fn get_view<T: De<'a>>(
        &self,
        scratch: &'a mut Vec<u8>,
        policy: SerPolicy,
    ) -> Result<T, ValueError> {
        match convert(self.ty, &de_type_of::<T>()?, policy, self.value)? {
            Cow::Borrowed(b) => decode_full(b),
            Cow::Owned(v) => {
                *scratch = v;
                let s: &'a [u8] = scratch;
                decode_full(s)
            }
        }
    }

    /// Converts to type `ty`.
    ///
    /// # Arguments
    ///
    /// * `ty: &str` - The target type.
    /// * `policy: SerPolicy` - The conversions allowed.
    /// * `check: bool` - Whether to scan the source recursively first.
    pub fn convert_to(&self, ty: &str, policy: SerPolicy, check: bool) -> Result<Any, ValueError> {
        if check {
            scan(self.ty.as_bytes(), self.value, false, true)?;
        }
        let v = convert(self.ty, ty, policy, self.value)?;
        Ok(Any::from_type_value_unchecked(ty, &v))
    }

    /// Prints as `<type>value`.
    pub fn print(&self) -> Result<String, ValueError> {
        text::print_any(*self, &PrintOptions::default())
    }

    /// Prints with the given options.
    pub fn print_with(&self, opts: &PrintOptions) -> Result<String, ValueError> {
        text::print_any(*self, opts)
    }

    /// Prints the value as JSON, without a type.
    pub fn print_json(&self) -> Result<String, ValueError> {
        text::print_any(*self, &PrintOptions::json())
    }
}

impl Any {
    /// An `Any` holding `t`, with the typestring of `T`.
    ///
    /// The typestring is not checked, see [`Any::try_new`].
    pub fn new<T: Ser + ?Sized + 'static>(t: &T) -> Any {
        let ty = cached_type::<T>();
        let mut buf = BytesMut::with_capacity(ty.len() + t.ser_len());
        buf.extend_from_slice(ty.as_bytes());
        t.ser_to(&mut buf);
        Any {
            buf: buf.freeze(),
            type_len: ty.len(),
        }
    }

    /// Like [`Any::new`], rejecting types without a typestring.
    ///
    /// ```
    /// use ufser::any::Any;
    ///
    /// assert_eq!(Any::try_new(&Some(1i32)).unwrap().typestring(), "oi");
    /// assert!(Any::try_new(&Some(())).is_err());
    /// ```
    pub fn try_new<T: Ser + ?Sized + 'static>(t: &T) -> Result<Any, ValueError> {
        ser_type_of::<T>()?;
        Ok(Any::new(t))
    }

    /// Like [`Any::new`] for types that are not `'static`.
    pub fn from_value<T: Ser + ?Sized>(t: &T) -> Any {
        let ty = T::ser_type();
        let mut buf = BytesMut::with_capacity(ty.len() + t.ser_len());
        buf.extend_from_slice(ty.as_bytes());
        t.ser_to(&mut buf);
        Any {
            buf: buf.freeze(),
            type_len: ty.len(),
        }
    }

    /// An `Any` of type `ty` holding `value`, scanned recursively first.
    ///
    /// ```
    /// use ufser::any::Any;
    ///
    /// assert!(Any::from_type_value("i", &[0, 0, 0, 1]).is_ok());
    /// let e = Any::from_type_value("t2ii", &[0, 0, 0, 1]).unwrap_err();
    /// assert_eq!(e.message(), "Value does not match type <t2i*i>");
    /// ```
    pub fn from_type_value(ty: &str, value: &[u8]) -> Result<Any, ValueError> {
        AnyView::from_type_value(ty, value).map(|v| v.to_any())
    }

    /// An `Any` of type `ty` holding `value`, trusted to match.
    pub fn from_type_value_unchecked(ty: &str, value: &[u8]) -> Any {
        let mut buf = BytesMut::with_capacity(ty.len() + value.len());
        buf.extend_from_slice(ty.as_bytes());
        buf.extend_from_slice(value);
        Any {
            buf: buf.freeze(),
            type_len: ty.len(),
        }
    }

    /// An `Any` from a serialized `a`, see [`AnyView::from_raw`].
    pub fn from_raw(raw: &[u8], check: bool) -> Result<Any, ValueError> {
        AnyView::from_raw(raw, check).map(|v| v.to_any())
    }

    /// The default value of type `ty`.
    ///
    /// ```
    /// use ufser::any::Any;
    ///
    /// let a = Any::from_typestring("oi").unwrap();
    /// assert_eq!(a.value(), &[0]);
    /// ```
    pub fn from_typestring(ty: &str) -> Result<Any, ValueError> {
        default_value(ty).map(|v| Any::from_type_value_unchecked(ty, &v))
    }

    /// Parses the text form, see [`text`](crate::text). Lists and maps of mixed item
    /// types hold `a`s.
    pub fn from_text(s: &str) -> Result<Any, TextError> { text::parse(s, ParseMode::default()) }

    /// Borrows the contents.
    pub fn view(&self) -> AnyView<'_> {
        AnyView {
            // the type is only ever set from a `&str`
            ty: std::str::from_utf8(&self.buf[..self.type_len]).unwrap_or_default(),
            value: &self.buf[self.type_len..],
        }
    }

    /// The typestring.
    pub fn typestring(&self) -> &str { self.view().ty }

    /// The payload.
    pub fn value(&self) -> &[u8] { &self.buf[self.type_len..] }

    /// Whether this is void.
    pub fn is_void(&self) -> bool { self.type_len == 0 }

    /// See [`AnyView::is_structured_type`].
    pub fn is_structured_type(&self) -> bool { self.view().is_structured_type() }

    /// See [`AnyView::get_content`].
    pub fn get_content(&self, max: Option<usize>) -> Result<Vec<AnyView<'_>>, ValueError> {
        self.view().get_content(max)
    }

    /// See [`AnyView::get_map_content`].
    pub fn get_map_content(
        &self,
        max: Option<usize>,
    ) -> Result<Vec<(AnyView<'_>, AnyView<'_>)>, ValueError> {
        self.view().get_map_content(max)
    }

    /// See [`AnyView::get_content_size`].
    pub fn get_content_size(&self) -> usize { self.view().get_content_size() }

    /// Wraps into an `Any` of type `a`.
    pub fn wrap(&self) -> Any { Any::new(self) }

    /// The `Any` inside an `a`.
    ///
    /// # Errors
    ///
    /// A type mismatch if the type is not `a`, or what [`AnyView::from_raw`] finds.
    pub fn unwrap(&self) -> Result<Any, ValueError> {
        if self.typestring() != "a" {
            return Err(ValueError::type_mismatch(
                NOT_AN_ANY,
                TypePos::plain(self.typestring().as_bytes()),
                TypePos::plain(b"a"),
            ));
        }
        Any::from_raw(self.value(), false)
    }

    /// See [`AnyView::get`].
    pub fn get<T: DeOwned>(&self, policy: SerPolicy) -> Result<T, ValueError> {
        self.view().get(policy)
    }

    /// See [`AnyView::get_view`].
    pub fn get_view<'a, T: De<'a>>(
        &'a self,
        scratch: &'a mut Vec<u8>,
        policy: SerPolicy,
    ) -> Result<T, ValueError> {
        self.view().get_view(scratch, policy)
    }

    /// See [`AnyView::convert_to`].
    pub fn convert_to(&self, ty: &str, policy: SerPolicy, check: bool) -> Result<Any, ValueError> {
        self.view().convert_to(ty, policy, check)
    }

    /// See [`AnyView::print`].
    pub fn print(&self) -> Result<String, ValueError> { self.view().print() }

    /// See [`AnyView::print_with`].
    pub fn print_with(&self, opts: &PrintOptions) -> Result<String, ValueError> {
        self.view().print_with(opts)
    }

    /// See [`AnyView::print_json`].
    pub fn print_json(&self) -> Result<String, ValueError> { self.view().print_json() }

    /// The serialized `a` form.
    pub fn serialize(&self) -> Vec<u8> { encode_full(self) }
}

impl<'a> From<AnyView<'a>> for Any {
    fn from(v: AnyView<'a>) -> Self { v.to_any() }
}

impl<'a> From<&'a Any> for AnyView<'a> {
    fn from(a: &'a Any) -> Self { a.view() }
}

impl PartialEq for Any {
    fn eq(&self, other: &Self) -> bool { self.view() == other.view() }
}

impl Eq for Any {}

impl PartialOrd for Any {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Any {
    fn cmp(&self, other: &Self) -> Ordering { self.view().cmp(&other.view()) }
}

impl Hash for Any {
    fn hash<H: Hasher>(&self, state: &mut H) { self.view().hash(state) }
}

impl fmt::Debug for Any {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.print() {
            Ok(s) => write!(f, "Any({})", s),
            Err(_) => write!(f, "Any(<{}>{})", self.typestring(), escape(self.value())),
        }
    }
}

impl<'a> Ser for AnyView<'a> {
    fn ser_type() -> String { "a".to_string() }

    fn ser_to<S: Serializer>(&self, out: &mut S) {
        out.put_bytes(self.ty.as_bytes());
        out.put_bytes(self.value);
    }
}

impl<'de> De<'de> for AnyView<'de> {
    fn de_type() -> String { "a".to_string() }

    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        let (ty, value) = read_raw(r).ok_or_else(|| overrun("a"))?;
        Ok(AnyView {
            ty: type_str(ty)?,
            value,
        })
    }
}

impl Ser for Any {
    fn ser_type() -> String { "a".to_string() }

    fn ser_to<S: Serializer>(&self, out: &mut S) { self.view().ser_to(out) }
}

impl<'de> De<'de> for Any {
    fn de_type() -> String { "a".to_string() }

    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> { AnyView::de(r).map(|v| v.to_any()) }
}
