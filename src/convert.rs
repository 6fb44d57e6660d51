//! # Conversion engine
//!
//! Converts a payload of one typestring into the payload of another, within the limits
//! of a [`SerPolicy`]. Identical types are copied as they are.
//!
//! The engine walks the source and the target typestring together. Some source members
//! may vanish when the target has no room for them: `a` holding void, `X`, and lists
//! and tuples of such (see [`can_disappear`]). When a tuple member could either vanish
//! or convert, both are tried, left to right, and the first success wins.
//!
//! ```
//! use ufser::{convert::convert, encoding::encode_full, policy::SerPolicy};
//!
//! let v = encode_full(&(5i32, 1i32));
//! let out = convert("t2ii", "t2Id", SerPolicy::ALL, &v).unwrap();
//! assert_eq!(&out[..8], &5i64.to_be_bytes());
//! assert_eq!(&out[8..], &1.0f64.to_bits().to_be_bytes());
//!
//! let e = convert("t2ii", "t2Id", SerPolicy::INTS, &v).unwrap_err();
//! assert_eq!(
//!     e.message(),
//!     "Type mismatch when converting <t2i*i> to <t2I*d> (missing flag: convert:double)"
//! );
//! ```

use crate::{
    encoding::{
        constants::{HAS_VALUE, NO_VALUE, VOID_ANY},
        Reader, Serializer, SerializerExt,
    },
    error_value::ErrorValue,
    errors::{Diagnostic, TypePos, ValueError},
    policy::SerPolicy,
    rep::De,
    scan::{scan, scan_from},
    typestring::{caret_pos, can_disappear, check_type, parse_count, parse_type, Outcome, MAX_DEPTH},
    util::escape,
};
use byteorder::{BigEndian, ByteOrder};
use std::borrow::Cow;
use tracing::trace;

const TYPE_MISMATCH: &str = "Type mismatch when converting <%1> to <%2>";
const EXPECTED_ERRORS: &str = "Expected contains errors when converting <%1> to <%2>: %e";

/// The result of [`convert_collect`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Converted {
    /// The converted payload. Errors found in source expecteds left no trace here.
    pub value: Vec<u8>,
    /// Errors held by source expecteds that the target had no place for.
    pub errors: Vec<ErrorValue>,
    /// For each error, its position in the source and in the target typestring.
    pub positions: Vec<(usize, usize)>,
}

impl Converted {
    /// Turns collected errors into an [`ValueError::ExpectedWithError`], pointing at
    /// every place an error was found.
    pub fn into_error(self, from: &str, to: &str) -> ValueError {
        let spos: Vec<usize> = self.positions.iter().map(|p| p.0).collect();
        let tpos: Vec<usize> = self.positions.iter().map(|p| p.1).collect();
        ValueError::expected_with_error(
            EXPECTED_ERRORS,
            TypePos::new(from.as_bytes(), &spos),
            TypePos::new(to.as_bytes(), &tpos),
            self.errors,
        )
    }
}

/// Converts `value` of type `from` into type `to`.
///
/// Returns `value` itself when the two types are equal.
///
/// # Arguments
///
/// * `from: &str` - The type of `value`.
/// * `to: &str` - The requested type.
/// * `policy: SerPolicy` - The conversions allowed.
/// * `value: &[u8]` - The payload.
///
/// # Errors
///
/// A type mismatch when the types cannot be converted under `policy`, a value mismatch
/// when `value` does not match `from`, and [`ValueError::ExpectedWithError`] when
/// expecteds in the source held errors the target cannot hold.
pub fn convert<'v>(
    from: &str,
    to: &str,
    policy: SerPolicy,
    value: &'v [u8],
) -> Result<Cow<'v, [u8]>, ValueError> {
    if from == to {
        scan(from.as_bytes(), value, false, false)?;
        return Ok(Cow::Borrowed(value));
    }
    let conv = convert_collect(from, to, policy, value)?;
    if conv.errors.is_empty() {
        Ok(Cow::Owned(conv.value))
    } else {
        Err(conv.into_error(from, to))
    }
}

/// Like [`convert`], but errors held by source expecteds are returned alongside the
/// payload instead of failing the conversion.
pub fn convert_collect(
    from: &str,
    to: &str,
    policy: SerPolicy,
    value: &[u8],
) -> Result<Converted, ValueError> {
    let mut out = Vec::with_capacity(value.len());
    let sinks = run(from, to, policy, Some(value), Some(&mut out), true)?;
    Ok(Converted {
        value: out,
        errors: sinks.errors,
        positions: sinks.positions,
    })
}

/// Checks whether `from` converts to `to` under `policy`.
///
/// With a payload the check is exact, and an expected holding an error fails it. Without
/// one, it tells whether some value of `from` converts.
///
/// ```
/// use ufser::{convert::cant_convert, policy::SerPolicy};
///
/// assert!(cant_convert("xa", "X", SerPolicy::ANY, None).is_none());
/// assert!(cant_convert("xa", "X", SerPolicy::NONE, None).is_some());
/// assert!(cant_convert("xi", "X", SerPolicy::ALL, None).is_some());
/// ```
pub fn cant_convert(
    from: &str,
    to: &str,
    policy: SerPolicy,
    value: Option<&[u8]>,
) -> Option<ValueError> {
    run(from, to, policy, value, None, false).err()
}

fn run(
    from: &str,
    to: &str,
    policy: SerPolicy,
    value: Option<&[u8]>,
    out: Option<&mut Vec<u8>>,
    collect: bool,
) -> Result<Sinks, ValueError> {
    trace!(from, to, %policy, has_value = value.is_some(), "converting");
    check_type(from.as_bytes())?;
    check_type(to.as_bytes())?;
    let mut sinks = Sinks {
        collect,
        ..Default::default()
    };
    let mut conv = Conv {
        src: from.as_bytes(),
        spos: 0,
        send: from.len(),
        value,
        vpos: 0,
        dst: to.as_bytes(),
        tpos: 0,
        tend: to.len(),
        policy,
        parent: None,
        depth: 0,
    };
    conv.step(&mut sinks, &mut Out(out))?;
    if conv.spos < conv.send {
        return Err(conv.src_typestring(conv.spos, Outcome::ExtraTypeChars));
    }
    if conv.tpos < conv.tend {
        return Err(conv.type_error(None));
    }
    if let Some(v) = value {
        if conv.vpos < v.len() {
            return Err(ValueError::value_mismatch(
                Outcome::ExtraValueChars.message(),
                from.as_bytes(),
                None,
            ));
        }
    }
    Ok(sinks)
}

#[derive(Default)]
struct Sinks {
    collect: bool,
    errors: Vec<ErrorValue>,
    positions: Vec<(usize, usize)>,
}

impl Sinks {
    fn truncate(&mut self, len: usize) {
        self.errors.truncate(len);
        self.positions.truncate(len);
    }
}

/// Output of a conversion, absent when only checking.
struct Out<'o>(Option<&'o mut Vec<u8>>);

impl Out<'_> {
    fn len(&self) -> usize { self.0.as_ref().map_or(0, |o| o.len()) }

    fn truncate(&mut self, len: usize) {
        if let Some(o) = self.0.as_mut() {
            o.truncate(len)
        }
    }

    /// Overwrites the length written at `at`.
    fn patch_len(&mut self, at: usize, n: u32) {
        if let Some(o) = self.0.as_mut() {
            BigEndian::write_u32(&mut o[at..at + 4], n)
        }
    }
}

impl Serializer for Out<'_> {
    fn put_u8(&mut self, u: u8) {
        if let Some(o) = self.0.as_mut() {
            o.push(u)
        }
    }

    fn put_slice(&mut self, slice: &[u8]) {
        if let Some(o) = self.0.as_mut() {
            o.extend_from_slice(slice)
        }
    }
}

/// A conversion that descended into an `a`.
struct Frame<'a> {
    src: &'a [u8],
    spos: usize,
    parent: Option<&'a Frame<'a>>,
}

/// Conversion state: where we are in the source type, its payload and the target type.
///
/// `tend` may be narrower than `dst`, when a member must convert into part of the
/// target only.
#[derive(Clone, Copy)]
struct Conv<'a> {
    src: &'a [u8],
    spos: usize,
    send: usize,
    value: Option<&'a [u8]>,
    vpos: usize,
    dst: &'a [u8],
    tpos: usize,
    tend: usize,
    policy: SerPolicy,
    parent: Option<&'a Frame<'a>>,
    depth: usize,
}

/// Branching point of a tuple conversion: the member at `spos` could also vanish.
struct Branch {
    spos: usize,
    vpos: usize,
    tpos: usize,
    errors: usize,
    out: usize,
    remaining: u32,
}

enum Num {
    Int(i64),
    Float(f64),
}

/// The flag a conversion between two different primitives needs.
fn primitive_flag(from: u8, to: u8) -> Option<SerPolicy> {
    Some(match (from, to) {
        (b'b', b'c') | (b'b', b'i') | (b'b', b'I') => SerPolicy::BOOL,
        (b'c', b'b') | (b'i', b'b') | (b'I', b'b') => SerPolicy::BOOL,
        (b'c', b'i') | (b'c', b'I') | (b'i', b'I') => SerPolicy::INTS,
        (b'i', b'c') | (b'I', b'c') | (b'I', b'i') => SerPolicy::INTS_NARROWING,
        (b'i', b'd') | (b'I', b'd') | (b'd', b'i') | (b'd', b'I') => SerPolicy::DOUBLE,
        _ => return None,
    })
}

fn width(c: u8) -> usize {
    match c {
        b'b' | b'c' => 1,
        b'i' => 4,
        _ => 8,
    }
}

impl<'a> Conv<'a> {
    /// The source typestring with a caret at `pos`, inside the `any`s it was found in.
    fn src_at(&self, pos: usize) -> TypePos {
        let mut ty = self.src.to_vec();
        let mut pos = pos;
        let mut frame = self.parent;
        while let Some(f) = frame {
            let cut = (f.spos + 1).min(f.src.len());
            let mut wrapped = Vec::with_capacity(f.src.len() + ty.len() + 2);
            wrapped.extend_from_slice(&f.src[..cut]);
            wrapped.push(b'(');
            wrapped.extend_from_slice(&ty);
            wrapped.push(b')');
            wrapped.extend_from_slice(&f.src[cut..]);
            pos += cut + 1;
            ty = wrapped;
            frame = f.parent;
        }
        TypePos::new(&ty, &[pos])
    }

    fn dst_at(&self, pos: usize) -> TypePos { TypePos::new(self.dst, &[pos]) }

    /// Position of the outermost `a` we are inside of, or our own.
    fn root_spos(&self) -> usize {
        let mut pos = self.spos;
        let mut frame = self.parent;
        while let Some(f) = frame {
            pos = f.spos;
            frame = f.parent;
        }
        pos
    }

    fn type_error(&self, missing: Option<SerPolicy>) -> ValueError {
        let template = match missing {
            Some(flag) => format!("{} (missing flag: {})", TYPE_MISMATCH, SerPolicy::flag_name(flag)),
            None => TYPE_MISMATCH.to_string(),
        };
        self.mismatch(template)
    }

    fn mismatch<S: Into<String>>(&self, template: S) -> ValueError {
        ValueError::type_mismatch(template, self.src_at(self.spos), self.dst_at(self.tpos))
    }

    fn value_error(&self) -> ValueError {
        ValueError::ValueMismatch(
            Diagnostic::new(Outcome::ValueMismatch.message()).with_type0(self.src_at(self.spos)),
        )
    }

    fn src_typestring(&self, pos: usize, o: Outcome) -> ValueError {
        ValueError::Typestring(Diagnostic::new(o.message()).with_type0(self.src_at(pos)))
    }

    fn dst_typestring(&self, pos: usize, o: Outcome) -> ValueError {
        ValueError::Typestring(Diagnostic::new(o.message()).with_type0(self.dst_at(pos)))
    }

    /// Wraps an error found at this level into the `any`s we are inside of.
    fn encaps(&self, mut e: ValueError) -> ValueError {
        let mut frame = self.parent;
        while let Some(f) = frame {
            let cut = (f.spos + 1).min(f.src.len());
            e.encaps(&escape(&f.src[..cut]), &escape(&f.src[cut..]));
            frame = f.parent;
        }
        e
    }

    /// Length of the target type at `tpos`, which must not be void.
    fn target_len(&self) -> Result<usize, ValueError> {
        let ty = &self.dst[self.tpos..self.tend];
        match parse_type(ty, false) {
            (len, Outcome::Ok) => Ok(len),
            (len, o) => Err(self.dst_typestring(self.tpos + caret_pos(ty, len, o), o)),
        }
    }

    /// The same position, without a payload.
    fn types_only(&self) -> Conv<'a> {
        Conv {
            value: None,
            ..*self
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ValueError> {
        let value = self.value.unwrap_or_default();
        match value.get(self.vpos..self.vpos + n) {
            Some(bytes) => {
                self.vpos += n;
                Ok(bytes)
            }
            None => Err(self.value_error()),
        }
    }

    fn read_flag(&mut self) -> Result<u8, ValueError> { self.take(1).map(|b| b[0]) }

    /// Payload length of the `len` bytes of source type at `spos`.
    fn measure(&self, len: usize) -> Result<usize, ValueError> {
        let value = self.value.unwrap_or_default();
        let end = self.spos + len;
        let mut t = &self.src[self.spos..end];
        let mut v = &value[self.vpos.min(value.len())..];
        let before = v.len();
        match scan_from(&mut t, &mut v, false) {
            Ok(()) => Ok(before - v.len()),
            Err(mut e) => {
                e.prepend_type0(&escape(&self.src[..end - t.len()]));
                e.append_type0(&escape(&self.src[end..]));
                Err(self.encaps(e))
            }
        }
    }

    /// Moves past `len` bytes of source type, copying its payload to `out`.
    fn copy_source(&mut self, len: usize, out: &mut Out<'_>) -> Result<(), ValueError> {
        if let Some(value) = self.value {
            let vlen = self.measure(len)?;
            out.put_slice(&value[self.vpos..self.vpos + vlen]);
            self.vpos += vlen;
        }
        self.spos += len;
        Ok(())
    }

    /// Copies an error value from the payload.
    fn copy_error(&mut self, out: &mut Out<'_>) -> Result<ErrorValue, ValueError> {
        let value = self.value.unwrap_or_default();
        let mut r = Reader::new(&value[self.vpos.min(value.len())..]);
        let e = ErrorValue::de(&mut r).map_err(|_| self.value_error())?;
        out.put_slice(&value[self.vpos..self.vpos + r.position()]);
        self.vpos += r.position();
        Ok(e)
    }

    /// Converts one source type (or void, at the end of the source) into the target.
    fn step(&mut self, sinks: &mut Sinks, out: &mut Out<'_>) -> Result<(), ValueError> {
        // an expected or optional level may take two steps, one per side
        if self.depth >= 2 * MAX_DEPTH {
            return Err(self.src_typestring(self.spos, Outcome::TooDeep));
        }
        self.depth += 1;
        let res = self.step_one(sinks, out);
        self.depth -= 1;
        res
    }

    fn step_one(&mut self, sinks: &mut Sinks, out: &mut Out<'_>) -> Result<(), ValueError> {
        let rest = &self.src[self.spos..self.send];
        let slen = match parse_type(rest, true) {
            (len, Outcome::Ok) => len,
            (len, o) => return Err(self.src_typestring(self.spos + caret_pos(rest, len, o), o)),
        };
        if slen > 0
            && self.tpos + slen <= self.tend
            && self.dst[self.tpos..self.tpos + slen] == rest[..slen]
        {
            self.copy_source(slen, out)?;
            self.tpos += slen;
            return Ok(());
        }
        if slen == 0 {
            return self.from_void(out);
        }
        let s = rest[0];
        let c = if self.tpos < self.tend { self.dst[self.tpos] } else { 0 };
        match c {
            b'a' => return self.to_any(slen, out),
            b'x' | b'X' => return self.to_expected(s, c, slen, sinks, out),
            b'o' if s != b'o' => {
                if self.value.is_some() {
                    out.put_u8(HAS_VALUE);
                }
                self.tpos += 1;
                return self.step(sinks, out);
            }
            _ => {}
        }
        match s {
            b'b' | b'c' | b'i' | b'I' | b'd' => self.primitive(s, c, out),
            b's' => {
                if c == b'l' && self.dst.get(self.tpos + 1) == Some(&b'c') && self.tpos + 1 < self.tend {
                    if !self.policy.allows(SerPolicy::AUX) {
                        return Err(self.type_error(Some(SerPolicy::AUX)));
                    }
                    self.copy_source(1, out)?;
                    self.tpos += 2;
                    Ok(())
                } else {
                    Err(self.type_error(None))
                }
            }
            b'a' => self.from_any(sinks, out),
            b'x' | b'X' => self.from_expected(s, c, slen, sinks, out),
            b'o' => {
                if self.value.is_some() && self.read_flag()? == NO_VALUE {
                    if c != b'o' {
                        self.vpos -= 1;
                        return Err(self.mismatch(
                            "Empty optional <%1> can only convert to an optional and not <%2>",
                        ));
                    }
                    out.put_u8(NO_VALUE);
                    self.spos += 1;
                    self.tpos += 1;
                    return self.check_types(sinks);
                }
                self.spos += 1;
                self.step(sinks, out)
            }
            b'l' => self.from_list(c, sinks, out),
            b'm' => self.from_map(c, sinks, out),
            b't' => self.from_tuple(c, sinks, out),
            _ => Err(self.type_error(None)),
        }
    }

    /// Advances both types as far as a conversion of types alone would.
    fn check_types(&mut self, sinks: &mut Sinks) -> Result<(), ValueError> {
        let mut types = self.types_only();
        types.step(sinks, &mut Out(None))?;
        self.spos = types.spos;
        self.tpos = types.tpos;
        Ok(())
    }

    fn from_void(&mut self, out: &mut Out<'_>) -> Result<(), ValueError> {
        if self.tpos == self.tend {
            return Ok(());
        }
        match self.dst[self.tpos] {
            b'a' => {
                if !self.policy.allows(SerPolicy::ANY) {
                    return Err(self.type_error(Some(SerPolicy::ANY)));
                }
                out.put_slice(&VOID_ANY);
                self.tpos += 1;
            }
            b'X' => {
                if !self.policy.allows(SerPolicy::EXPECTED) {
                    return Err(self.type_error(Some(SerPolicy::EXPECTED)));
                }
                out.put_u8(HAS_VALUE);
                self.tpos += 1;
            }
            b'o' => {
                let len = self.target_len()?;
                if !self.policy.allows(SerPolicy::AUX) {
                    return Err(self.type_error(Some(SerPolicy::AUX)));
                }
                out.put_u8(NO_VALUE);
                self.tpos += len;
            }
            _ => return Err(self.type_error(None)),
        }
        Ok(())
    }

    fn to_any(&mut self, slen: usize, out: &mut Out<'_>) -> Result<(), ValueError> {
        if !self.policy.allows(SerPolicy::ANY) {
            return Err(self.type_error(Some(SerPolicy::ANY)));
        }
        if let Some(value) = self.value {
            let vlen = self.measure(slen)?;
            out.put_bytes(&self.src[self.spos..self.spos + slen]);
            out.put_bytes(&value[self.vpos..self.vpos + vlen]);
            self.vpos += vlen;
        }
        self.spos += slen;
        self.tpos += 1;
        Ok(())
    }

    /// Target is `xT` or `X`.
    fn to_expected(
        &mut self,
        s: u8,
        c: u8,
        slen: usize,
        sinks: &mut Sinks,
        out: &mut Out<'_>,
    ) -> Result<(), ValueError> {
        match (s, c) {
            (b'e', _) => {
                if self.value.is_some() {
                    out.put_u8(NO_VALUE);
                }
                self.copy_source(1, out)?;
                let len = self.target_len()?;
                self.tpos += len;
                Ok(())
            }
            (b'X', b'X') => {
                self.copy_source(1, out)?;
                self.tpos += 1;
                Ok(())
            }
            (b'x', b'X') => {
                if self.value.is_some() && self.value_byte() == Some(NO_VALUE) {
                    self.copy_source(slen, out)?;
                } else {
                    if self.value.is_some() {
                        self.read_flag()?;
                        out.put_u8(HAS_VALUE);
                    }
                    let mut inner = *self;
                    inner.spos += 1;
                    inner.tend = inner.tpos;
                    inner.step(sinks, out)?;
                    self.spos = inner.spos;
                    self.vpos = inner.vpos;
                }
                self.tpos += 1;
                Ok(())
            }
            (b'X', b'x') => {
                self.tpos += 1;
                if self.value.is_some() && self.value_byte() == Some(NO_VALUE) {
                    self.copy_source(1, out)?;
                    let len = self.target_len()?;
                    self.tpos += len;
                } else {
                    if self.value.is_some() {
                        self.read_flag()?;
                        out.put_u8(HAS_VALUE);
                    }
                    let mut inner = *self;
                    inner.send = inner.spos;
                    inner.step(sinks, out)?;
                    self.tpos = inner.tpos;
                    self.spos += 1;
                }
                Ok(())
            }
            (b'x', b'x') => {
                self.spos += 1;
                self.tpos += 1;
                if self.value.is_some() {
                    if self.read_flag()? == NO_VALUE {
                        out.put_u8(NO_VALUE);
                        self.copy_error(out)?;
                        return self.check_types(sinks);
                    }
                    out.put_u8(HAS_VALUE);
                }
                self.step(sinks, out)
            }
            _ => {
                if !self.policy.allows(SerPolicy::EXPECTED) {
                    return Err(self.type_error(Some(SerPolicy::EXPECTED)));
                }
                if self.value.is_some() {
                    out.put_u8(HAS_VALUE);
                }
                // an `X` holds nothing, the source goes on into what follows it
                self.tpos += 1;
                self.step(sinks, out)
            }
        }
    }

    fn value_byte(&self) -> Option<u8> { self.value.and_then(|v| v.get(self.vpos).copied()) }

    /// Source is `xT` or `X`, target is neither.
    fn from_expected(
        &mut self,
        s: u8,
        c: u8,
        slen: usize,
        sinks: &mut Sinks,
        out: &mut Out<'_>,
    ) -> Result<(), ValueError> {
        if !self.policy.allows(SerPolicy::EXPECTED) {
            return Err(self.type_error(Some(SerPolicy::EXPECTED)));
        }
        if c == b'e' {
            if self.value.is_some() {
                if self.value_byte() != Some(NO_VALUE) {
                    if self.value_byte().is_none() {
                        return Err(self.value_error());
                    }
                    return Err(
                        self.mismatch("Cannot convert a ready expected to an error <%1> to <%2>")
                    );
                }
                self.vpos += 1;
                self.copy_error(out)?;
            }
            self.spos += slen;
            self.tpos += 1;
            return Ok(());
        }
        if self.value.is_some() && self.read_flag()? == NO_VALUE {
            let (spos, tpos) = (self.root_spos(), self.tpos);
            let here = *self;
            self.spos += 1;
            if s == b'x' {
                self.check_types(sinks)?;
            }
            if !sinks.collect {
                return Err(here.mismatch("Expected contains error <%1> when converting to <%2>"));
            }
            let e = self.copy_error(&mut Out(None))?;
            sinks.errors.push(e);
            sinks.positions.push((spos, tpos));
            return Ok(());
        }
        self.spos += 1;
        if s == b'X' {
            // nothing to convert, vanishes
            return Ok(());
        }
        self.step(sinks, out)
    }

    fn primitive(&mut self, s: u8, c: u8, out: &mut Out<'_>) -> Result<(), ValueError> {
        let flag = match primitive_flag(s, c) {
            Some(flag) => flag,
            None => return Err(self.type_error(None)),
        };
        if !self.policy.allows(flag) {
            return Err(self.type_error(Some(flag)));
        }
        if self.value.is_some() {
            let bytes = self.take(width(s))?;
            let n = match s {
                b'b' => Num::Int(i64::from(bytes[0] != 0)),
                b'c' => Num::Int(i64::from(bytes[0])),
                b'i' => Num::Int(i64::from(BigEndian::read_i32(bytes))),
                b'I' => Num::Int(BigEndian::read_i64(bytes)),
                _ => Num::Float(BigEndian::read_f64(bytes)),
            };
            // narrowing truncates silently
            match (c, n) {
                (b'b', Num::Int(v)) => out.put_bool(v != 0),
                (b'c', Num::Int(v)) => out.put_char(v as u8),
                (b'i', Num::Int(v)) => out.put_i32(v as i32),
                (b'I', Num::Int(v)) => out.put_i64(v),
                (b'd', Num::Int(v)) => out.put_f64(v as f64),
                (b'i', Num::Float(f)) => out.put_i32(f as i32),
                (b'I', Num::Float(f)) => out.put_i64(f as i64),
                _ => return Err(self.type_error(None)),
            }
        }
        self.spos += 1;
        self.tpos += 1;
        Ok(())
    }

    fn from_any(&mut self, sinks: &mut Sinks, out: &mut Out<'_>) -> Result<(), ValueError> {
        if !self.policy.allows(SerPolicy::ANY) {
            return Err(self.type_error(Some(SerPolicy::ANY)));
        }
        let value = match self.value {
            Some(v) => v,
            None => {
                self.spos += 1;
                if self.tpos < self.tend {
                    self.tpos += self.target_len()?;
                }
                return Ok(());
            }
        };
        let mut r = Reader::new(&value[self.vpos.min(value.len())..]);
        let ty = r.read_bytes().map_err(|_| self.value_error())?;
        let val = r.read_bytes().map_err(|_| self.value_error())?;
        let frame = Frame {
            src: self.src,
            spos: self.spos,
            parent: self.parent,
        };
        let mut inner = Conv {
            src: ty,
            spos: 0,
            send: ty.len(),
            value: Some(val),
            vpos: 0,
            dst: self.dst,
            tpos: self.tpos,
            tend: self.tend,
            policy: self.policy,
            parent: Some(&frame),
            depth: self.depth,
        };
        inner.step(sinks, out)?;
        if inner.spos < inner.send {
            return Err(inner.src_typestring(inner.spos, Outcome::ExtraTypeChars));
        }
        if inner.vpos < val.len() {
            return Err(ValueError::ValueMismatch(
                Diagnostic::new(Outcome::ExtraValueChars.message())
                    .with_type0(inner.src_at(inner.spos)),
            ));
        }
        self.tpos = inner.tpos;
        self.spos += 1;
        self.vpos += r.position();
        Ok(())
    }

    fn from_list(&mut self, c: u8, sinks: &mut Sinks, out: &mut Out<'_>) -> Result<(), ValueError> {
        if c == b's'
            && self.src.get(self.spos + 1) == Some(&b'c')
            && self.policy.allows(SerPolicy::AUX)
        {
            self.copy_source(2, out)?;
            self.tpos += 1;
            return Ok(());
        }
        if c == b't' {
            return self.list_to_tuple(sinks, out);
        }
        // elements convert into the element type, or vanish when the target is no list
        let mut elem = *self;
        elem.spos += 1;
        if c == b'l' {
            elem.tpos += 1;
        } else {
            elem.tend = elem.tpos;
        }
        let count = if self.value.is_some() {
            let len = elem.take(4)?;
            if c == b'l' {
                out.put_slice(len);
            }
            BigEndian::read_u32(len)
        } else {
            0
        };
        // elements vanishing from a list would leave its element type unused
        let unmoved = if c == b'l' { Some(elem.tpos) } else { None };
        if count == 0 {
            elem.check_types(sinks)?;
            if unmoved == Some(elem.tpos) {
                return Err(elem.mismatch("Strange target type <%1> -> <%2>"));
            }
        } else {
            let (spos, tpos) = (elem.spos, elem.tpos);
            for _ in 0..count {
                elem.spos = spos;
                elem.tpos = tpos;
                elem.step(sinks, out)?;
                if unmoved == Some(elem.tpos) {
                    return Err(elem.mismatch("Strange target type <%1> -> <%2>"));
                }
            }
        }
        self.spos = elem.spos;
        self.vpos = elem.vpos;
        self.tpos = elem.tpos;
        Ok(())
    }

    fn list_to_tuple(&mut self, sinks: &mut Sinks, out: &mut Out<'_>) -> Result<(), ValueError> {
        if !self.policy.allows(SerPolicy::TUPLE_LIST) {
            return Err(self.type_error(Some(SerPolicy::TUPLE_LIST)));
        }
        let (n, digits) = parse_count(&self.dst[self.tpos + 1..self.tend]);
        if n < 2 {
            return Err(self.dst_typestring(self.tpos + 1 + digits, Outcome::NumberTooSmall));
        }
        if self.value.is_some() {
            let len = BigEndian::read_u32(self.take(4)?);
            if len != n {
                self.vpos -= 4;
                return Err(ValueError::ValueMismatch(
                    Diagnostic::new(format!(
                        "Size mismatch when converting <%1> to <%2> ({}!={}).",
                        len, n
                    ))
                    .with_type0(self.src_at(self.spos))
                    .with_type1(self.dst_at(self.tpos)),
                ));
            }
        }
        let elem = self.spos + 1;
        self.tpos += 1 + digits;
        for _ in 0..n {
            self.spos = elem;
            self.step(sinks, out)?;
        }
        Ok(())
    }

    fn from_map(&mut self, c: u8, sinks: &mut Sinks, out: &mut Out<'_>) -> Result<(), ValueError> {
        let mut kv = *self;
        match c {
            b'm' => {}
            b'l' => kv.tend = self.tpos + self.target_len()?,
            _ => return Err(self.type_error(None)),
        }
        let count = if self.value.is_some() {
            let len = kv.take(4)?;
            out.put_slice(len);
            BigEndian::read_u32(len)
        } else {
            1
        };
        if count == 0 {
            self.vpos = kv.vpos;
            return self.check_types(sinks);
        }
        for _ in 0..count {
            kv.spos = self.spos + 1;
            kv.tpos = self.tpos + 1;
            kv.step(sinks, out)?;
            if c == b'm' && kv.tpos == self.tpos + 1 {
                return Err(kv.mismatch("Strange target type <%1> -> <%2>"));
            }
            let mapped = kv.tpos;
            kv.step(sinks, out)?;
            if c == b'm' && kv.tpos == mapped {
                return Err(kv.mismatch("Strange target type <%1> -> <%2>"));
            }
        }
        self.spos = kv.spos;
        self.vpos = kv.vpos;
        self.tpos = kv.tpos;
        Ok(())
    }

    fn from_tuple(&mut self, c: u8, sinks: &mut Sinks, out: &mut Out<'_>) -> Result<(), ValueError> {
        let target = &self.dst[self.tpos..self.tend];
        let ttlen = match parse_type(target, true) {
            (len, Outcome::Ok) => len,
            (len, o) => return Err(self.dst_typestring(self.tpos + caret_pos(target, len, o), o)),
        };
        let (n, digits) = parse_count(&self.src[self.spos + 1..self.send]);
        if n < 2 {
            return Err(self.src_typestring(self.spos + 1 + digits, Outcome::NumberTooSmall));
        }
        let mut elem = *self;
        elem.tend = self.tpos + ttlen;
        elem.spos = self.spos + 1 + digits;
        if c == b't' {
            let (n2, digits2) = parse_count(&self.dst[self.tpos + 1..elem.tend]);
            if n2 < 2 {
                return Err(self.dst_typestring(self.tpos + 1 + digits2, Outcome::NumberTooSmall));
            }
            elem.tpos = self.tpos + 1 + digits2;
        }

        let mut first_err = None;
        if c == b'l' && self.policy.allows(SerPolicy::TUPLE_LIST) {
            let (out_len, errors_len) = (out.len(), sinks.errors.len());
            let (elem_at, list_end) = (self.tpos + 1, self.tpos + ttlen);
            let mut as_list = *self;
            as_list.spos = elem.spos;
            as_list.tend = list_end;
            // members that vanish are not counted
            out.put_len(0);
            let mut count = 0;
            let mut res = Ok(());
            for _ in 0..n {
                as_list.tpos = elem_at;
                res = as_list.step(sinks, out);
                if res.is_err() {
                    break;
                }
                if as_list.tpos == list_end {
                    count += 1;
                } else if as_list.tpos != elem_at {
                    res = Err(as_list.type_error(None));
                    break;
                }
            }
            match res {
                Ok(()) => {
                    out.patch_len(out_len, count);
                    self.spos = as_list.spos;
                    self.vpos = as_list.vpos;
                    self.tpos = list_end;
                    return Ok(());
                }
                Err(e) => {
                    out.truncate(out_len);
                    sinks.truncate(errors_len);
                    first_err = Some(e);
                }
            }
        }

        let mut stack: Vec<Branch> = Vec::new();
        let mut remaining = n;
        let mut noted = false;
        loop {
            let mut ok = true;
            while remaining > 0 {
                let could_vanish = can_disappear(&elem.src[elem.spos..elem.send]).is_some();
                if could_vanish {
                    stack.push(Branch {
                        spos: elem.spos,
                        vpos: elem.vpos,
                        tpos: elem.tpos,
                        errors: sinks.errors.len(),
                        out: out.len(),
                        remaining,
                    });
                }
                let before = elem.tpos;
                remaining -= 1;
                match elem.step(sinks, out) {
                    Ok(()) => {
                        if could_vanish && elem.tpos == before {
                            // vanished already, nothing to try instead
                            stack.pop();
                        }
                    }
                    Err(e) => {
                        first_err.get_or_insert(e);
                        ok = false;
                        break;
                    }
                }
            }
            if ok && elem.tpos == elem.tend {
                break;
            }
            if !noted && !stack.is_empty() {
                if let Some(e) = first_err.as_mut() {
                    e.append_msg(" (With any incoming value.)");
                    noted = true;
                }
            }
            loop {
                let b = match stack.pop() {
                    Some(b) => b,
                    None => return Err(first_err.unwrap_or_else(|| self.type_error(None))),
                };
                trace!(spos = b.spos, tpos = b.tpos, "backtracking in tuple");
                elem.spos = b.spos;
                elem.vpos = b.vpos;
                elem.tpos = b.tpos;
                sinks.truncate(b.errors);
                out.truncate(b.out);
                let mut gone = elem;
                gone.tend = gone.tpos;
                if gone.step(sinks, out).is_ok() {
                    elem.spos = gone.spos;
                    elem.vpos = gone.vpos;
                    remaining = b.remaining - 1;
                    break;
                }
            }
        }
        self.spos = elem.spos;
        self.vpos = elem.vpos;
        self.tpos = elem.tpos;
        Ok(())
    }
}
