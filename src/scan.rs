//! Validation of payloads against typestrings.
//!
//! Scanning walks a typestring and a payload together, checking that the payload is
//! long enough for every value and that counts, flags and nested `any`s are consistent.
//! It never materializes values.
//!
//! The payload may be supplied in chunks, see [`scan_chunks`]. A chunk boundary may
//! fall inside a string or a list, but never inside a fixed-width value or a length.

use crate::{
    errors::ValueError,
    typestring::{caret_pos, is_all_expected_void, parse_count, parse_type, Outcome, MAX_DEPTH},
    util::escape,
};
use byteorder::{BigEndian, ByteOrder};
use std::borrow::Cow;
use tracing::trace;

/// How much of the typestring and the payload a scan consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scanned {
    /// Bytes of typestring.
    pub type_len: usize,
    /// Bytes of payload.
    pub value_len: usize,
}

type MoreFn<'v, 'f> = &'f mut dyn FnMut() -> Option<&'v [u8]>;

/// A payload being scanned, possibly arriving in chunks.
pub(crate) struct ValueIn<'v, 'f> {
    cur: &'v [u8],
    more: Option<MoreFn<'v, 'f>>,
    consumed: usize,
    depth: usize,
}

impl<'v, 'f> ValueIn<'v, 'f> {
    pub(crate) fn whole(value: &'v [u8]) -> Self { ValueIn::nested(value, 0) }

    fn nested(value: &'v [u8], depth: usize) -> Self {
        ValueIn {
            cur: value,
            more: None,
            consumed: 0,
            depth,
        }
    }

    /// Makes sure the current chunk is not empty, unless the input is over.
    fn refill(&mut self) -> bool {
        while self.cur.is_empty() {
            match self.more.as_mut().and_then(|m| m()) {
                Some(chunk) => self.cur = chunk,
                None => return false,
            }
        }
        true
    }

    fn fixed(&mut self, n: usize) -> Option<&'v [u8]> {
        if !self.refill() || self.cur.len() < n {
            return None;
        }
        let (head, tail) = self.cur.split_at(n);
        self.cur = tail;
        self.consumed += n;
        Some(head)
    }

    fn flag(&mut self) -> Option<u8> { self.fixed(1).map(|b| b[0]) }

    fn len(&mut self) -> Option<usize> { self.fixed(4).map(|b| BigEndian::read_u32(b) as usize) }

    fn take(&mut self, n: usize) -> Option<Cow<'v, [u8]>> {
        if n == 0 {
            return Some(Cow::Borrowed(&[]));
        }
        if !self.refill() {
            return None;
        }
        if self.cur.len() >= n {
            return self.fixed(n).map(Cow::Borrowed);
        }
        // the length is untrusted, grow with what actually arrives
        let mut buf = Vec::with_capacity(self.cur.len());
        while buf.len() < n {
            if !self.refill() {
                return None;
            }
            let k = (n - buf.len()).min(self.cur.len());
            buf.extend_from_slice(&self.cur[..k]);
            self.cur = &self.cur[k..];
            self.consumed += k;
        }
        Some(Cow::Owned(buf))
    }

    fn skip(&mut self, mut n: usize) -> bool {
        while n > 0 {
            if !self.refill() {
                return false;
            }
            let k = n.min(self.cur.len());
            self.cur = &self.cur[k..];
            self.consumed += k;
            n -= k;
        }
        true
    }

    fn exhausted(&mut self) -> bool { !self.refill() }
}

fn mismatch(ty: &[u8]) -> ValueError {
    ValueError::value_mismatch(Outcome::ValueMismatch.message(), ty, Some(0))
}

fn bad_type(ty: &[u8], len: usize, o: Outcome) -> ValueError {
    ValueError::typestring(o, ty, caret_pos(ty, len, o))
}

/// Scans one value of the type at the front of `ty`.
///
/// On success `ty` is advanced past the type. On failure `ty` is left at the suffix that
/// the error's typestring ends with, so callers only need to prepend what they consumed.
pub(crate) fn scan_one(ty: &mut &[u8], v: &mut ValueIn<'_, '_>, check: bool) -> Result<(), ValueError> {
    if v.depth >= MAX_DEPTH {
        return Err(ValueError::typestring(Outcome::TooDeep, ty, 0));
    }
    v.depth += 1;
    let res = scan_value(ty, v, check);
    v.depth -= 1;
    res
}

fn scan_value(ty: &mut &[u8], v: &mut ValueIn<'_, '_>, check: bool) -> Result<(), ValueError> {
    let t = *ty;
    let c = match t.first() {
        None => return Ok(()),
        Some(c) => *c,
    };
    match c {
        b'b' | b'c' | b'i' | b'I' | b'd' => {
            let width = match c {
                b'b' | b'c' => 1,
                b'i' => 4,
                _ => 8,
            };
            v.fixed(width).ok_or_else(|| mismatch(t))?;
            *ty = &t[1..];
        }
        b's' => {
            let len = v.len().ok_or_else(|| mismatch(t))?;
            if !v.skip(len) {
                return Err(mismatch(t));
            }
            *ty = &t[1..];
        }
        b'a' => {
            let tlen = v.len().ok_or_else(|| mismatch(t))?;
            let inner_ty = v.take(tlen).ok_or_else(|| mismatch(t))?;
            let vlen = v.len().ok_or_else(|| mismatch(t))?;
            if check {
                let inner_val = v.take(vlen).ok_or_else(|| mismatch(t))?;
                *ty = &t[1..];
                scan_any(&inner_ty, &inner_val, v.depth).map_err(|mut e| {
                    e.encaps("", &escape(&t[1..]));
                    e
                })?;
            } else {
                if !v.skip(vlen) {
                    return Err(mismatch(t));
                }
                *ty = &t[1..];
            }
        }
        b'e' => {
            let mut fields: &[u8] = b"ssa";
            let res = scan_one(&mut fields, v, check)
                .and_then(|_| scan_one(&mut fields, v, check))
                .and_then(|_| scan_one(&mut fields, v, check));
            if let Err(mut e) = res {
                if !fields.is_empty() {
                    return Err(mismatch(t));
                }
                // found inside the attached value, which reads `(..)` already
                e.append_type0(&escape(&t[1..]));
                *ty = &t[1..];
                return Err(e);
            }
            *ty = &t[1..];
        }
        b'X' => {
            if v.flag().ok_or_else(|| mismatch(t))? == 0 {
                scan_one(&mut &b"e"[..], v, check).map_err(|_| mismatch(t))?;
            }
            *ty = &t[1..];
        }
        b'o' | b'x' => {
            let flag = v.flag().ok_or_else(|| mismatch(t))?;
            let inner = &t[1..];
            let (len, o) = parse_type(inner, false);
            if !o.is_ok() {
                *ty = inner;
                return Err(bad_type(inner, len, o));
            }
            if flag != 0 {
                *ty = inner;
                scan_one(ty, v, check)?;
            } else {
                if c == b'x' {
                    scan_one(&mut &b"e"[..], v, check).map_err(|_| mismatch(t))?;
                }
                *ty = &inner[len..];
            }
        }
        b'l' => {
            let count = v.len().ok_or_else(|| mismatch(t))?;
            let elem = &t[1..];
            let (len, o) = parse_type(elem, false);
            if !o.is_ok() {
                *ty = elem;
                return Err(bad_type(elem, len, o));
            }
            for _ in 0..count {
                let mut e = elem;
                if let Err(err) = scan_one(&mut e, v, check) {
                    *ty = e;
                    return Err(err);
                }
            }
            *ty = &elem[len..];
        }
        b'm' => {
            let count = v.len().ok_or_else(|| mismatch(t))?;
            let kv = &t[1..];
            let (len, o) = parse_type(kv, false);
            if !o.is_ok() {
                *ty = kv;
                return Err(bad_type(kv, len, o));
            }
            if is_all_expected_void(&kv[..len]) {
                return Err(ValueError::typestring(Outcome::InvalidChar, t, 1));
            }
            let (vlen, o) = parse_type(&kv[len..], false);
            if !o.is_ok() {
                *ty = &kv[len..];
                return Err(bad_type(&kv[len..], vlen, o));
            }
            for _ in 0..count {
                let mut e = kv;
                let res = scan_one(&mut e, v, check).and_then(|_| scan_one(&mut e, v, check));
                if let Err(err) = res {
                    *ty = e;
                    return Err(err);
                }
            }
            *ty = &kv[len + vlen..];
        }
        b't' => {
            let (n, digits) = parse_count(&t[1..]);
            if n < 2 {
                return Err(ValueError::typestring(Outcome::NumberTooSmall, t, 1 + digits));
            }
            *ty = &t[1 + digits..];
            for _ in 0..n {
                if ty.is_empty() {
                    return Err(ValueError::typestring(Outcome::UnexpectedEnd, ty, 0));
                }
                scan_one(ty, v, check)?;
            }
        }
        _ => return Err(ValueError::typestring(Outcome::InvalidChar, t, 0)),
    }
    Ok(())
}

/// Scans the content of an `any`, which must be exactly one type and its value.
///
/// On failure the error's typestring is the whole of `ty`.
fn scan_any(ty: &[u8], value: &[u8], depth: usize) -> Result<(), ValueError> {
    let mut t = ty;
    let mut v = ValueIn::nested(value, depth);
    let res = scan_one(&mut t, &mut v, true).and_then(|_| {
        if !t.is_empty() {
            Err(ValueError::typestring(Outcome::ExtraTypeChars, t, 0))
        } else if !v.exhausted() {
            Err(ValueError::value_mismatch(Outcome::ExtraValueChars.message(), t, Some(0)))
        } else {
            Ok(())
        }
    });
    res.map_err(|mut e| {
        e.prepend_type0(&escape(&ty[..ty.len() - t.len()]));
        e
    })
}

/// Scans one value of the type at the front of `ty` from the front of `value`,
/// advancing both. Errors follow the convention of [`scan_one`].
pub(crate) fn scan_from(ty: &mut &[u8], value: &mut &[u8], check: bool) -> Result<(), ValueError> {
    let mut v = ValueIn::whole(value);
    let res = scan_one(ty, &mut v, check);
    *value = &value[v.consumed..];
    res
}

/// Checks that `value` holds one value of the type at the start of `ty`.
///
/// Unless `allow_longer` is set, both `ty` and `value` must be consumed exactly. With
/// `check_recursively`, the contents of `any`s are scanned too, and errors found
/// there are reported inside parentheses: `t2a(*@)s`.
///
/// # Arguments
///
/// * `ty: &[u8]` - The typestring.
/// * `value: &[u8]` - The payload.
/// * `allow_longer: bool` - Whether trailing type characters and payload bytes are fine.
/// * `check_recursively: bool` - Whether to descend into `any`s.
///
/// # Errors
///
/// A typestring error for malformed types, a value mismatch for payloads that do not fit.
///
/// # Example
///
/// ```
/// use ufser::scan::scan;
///
/// let s = scan(b"t2ci", &[b'x', 0, 0, 0, 1], false, true).unwrap();
/// assert_eq!((s.type_len, s.value_len), (4, 5));
///
/// let e = scan(b"t2ci", &[b'x', 0, 0], false, true).unwrap_err();
/// assert_eq!(e.message(), "Value does not match type <t2c*i>");
/// ```
pub fn scan(
    ty: &[u8],
    value: &[u8],
    allow_longer: bool,
    check_recursively: bool,
) -> Result<Scanned, ValueError> {
    let mut t = ty;
    let mut v = ValueIn::whole(value);
    finish(ty, &mut t, &mut v, allow_longer, check_recursively)
}

fn finish(
    ty: &[u8],
    t: &mut &[u8],
    v: &mut ValueIn<'_, '_>,
    allow_longer: bool,
    check: bool,
) -> Result<Scanned, ValueError> {
    scan_one(t, v, check).map_err(|mut e| {
        e.prepend_type0(&escape(&ty[..ty.len() - t.len()]));
        e
    })?;
    let scanned = Scanned {
        type_len: ty.len() - t.len(),
        value_len: v.consumed,
    };
    if !allow_longer {
        if !t.is_empty() {
            return Err(ValueError::typestring(Outcome::ExtraTypeChars, ty, scanned.type_len));
        }
        if !v.exhausted() {
            return Err(ValueError::value_mismatch(
                Outcome::ExtraValueChars.message(),
                ty,
                None,
            ));
        }
    }
    Ok(scanned)
}

/// Like [`scan`], with the typestring and the payload supplied in chunks.
///
/// `more_type` and `more_value` are called for the next chunk when the current one is
/// used up and return `None` at the end of the input. Both inputs must be consumed
/// exactly.
///
/// ```
/// use ufser::scan::scan_chunks;
///
/// let mut types = vec![&b"t2"[..], &b"si"[..]].into_iter();
/// let mut chunks = vec![&[0u8, 0, 0, 3, b'a'][..], &[b'b'][..], &[b'c', 0, 0, 0, 7][..]].into_iter();
/// let s = scan_chunks(|| types.next(), || chunks.next(), true).unwrap();
/// assert_eq!((s.type_len, s.value_len), (4, 11));
/// ```
pub fn scan_chunks<'v, T, V>(
    mut more_type: T,
    mut more_value: V,
    check_recursively: bool,
) -> Result<Scanned, ValueError>
where
    T: FnMut() -> Option<&'v [u8]>,
    V: FnMut() -> Option<&'v [u8]>,
{
    // typestrings are short, gather them whole
    let mut ty = Vec::new();
    while let Some(chunk) = more_type() {
        ty.extend_from_slice(chunk);
    }
    trace!(ty = %escape(&ty), "scanning chunked payload");
    let mut t = &ty[..];
    let mut v = ValueIn {
        cur: &[],
        more: Some(&mut more_value),
        consumed: 0,
        depth: 0,
    };
    finish(&ty, &mut t, &mut v, false, check_recursively)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_full;

    fn any_bytes(ty: &str, value: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(ty.len() as u32).to_be_bytes());
        out.extend_from_slice(ty.as_bytes());
        out.extend_from_slice(&(value.len() as u32).to_be_bytes());
        out.extend_from_slice(value);
        out
    }

    #[test]
    fn primitives() {
        assert!(scan(b"i", &encode_full(&5i32), false, false).is_ok());
        assert!(scan(b"", b"", false, false).is_ok());
        let e = scan(b"i", b"", false, false).unwrap_err();
        assert_eq!(e.message(), "Value does not match type <i>");
        let e = scan(b"c", b"ab", false, false).unwrap_err();
        assert_eq!(e.message(), "Extra characters after value <c>");
        assert_eq!(scan(b"c", b"ab", true, false).unwrap().value_len, 1);
    }

    #[test]
    fn typestring_problems() {
        let e = scan(b"t2ccc", b"ab", false, true).unwrap_err();
        assert_eq!(e.message(), "Extra characters after typestring <t2cc*c>");
        let e = scan(b"t2c", b"ab", false, true).unwrap_err();
        assert_eq!(e.message(), "Unexpected end of typestring <t2c*>");
        let e = scan(b"t1c", b"a", false, true).unwrap_err();
        assert_eq!(e.message(), "Number at least 2 expected <t1*c>");
        let e = scan(b"@", b"", false, true).unwrap_err();
        assert_eq!(e.message(), "Invalid character <@>");
    }

    #[test]
    fn lists_and_maps() {
        let v = encode_full(&vec![1i32, 2, 3]);
        assert_eq!(scan(b"li", &v, false, false).unwrap().value_len, 16);
        let e = scan(b"li", &v[..15], false, false).unwrap_err();
        assert_eq!(e.message(), "Value does not match type <l*i>");
        // an empty list still needs a valid element type
        let e = scan(b"l@", &[0, 0, 0, 0], false, false).unwrap_err();
        assert_eq!(e.message(), "Invalid character <l*@>");
        let m: std::collections::BTreeMap<String, i32> = vec![("a".to_string(), 1)].into_iter().collect();
        assert!(scan(b"msi", &encode_full(&m), false, false).is_ok());
    }

    #[test]
    fn optionals_and_expecteds() {
        assert!(scan(b"oi", &[0], false, false).is_ok());
        assert!(scan(b"oi", &[1, 0, 0, 0, 9], false, false).is_ok());
        assert!(scan(b"X", &[1], false, false).is_ok());
        let err = encode_full(&("k".to_string(), "m".to_string(), crate::any::Any::default()));
        let mut x = vec![0];
        x.extend_from_slice(&err);
        assert!(scan(b"X", &x, false, false).is_ok());
        assert!(scan(b"xd", &x, false, false).is_ok());
        assert!(scan(b"e", &err, false, false).is_ok());
    }

    #[test]
    fn inside_any() {
        let mut v = any_bytes("@", b"");
        v.extend_from_slice(&encode_full("x"));
        let e = scan(b"t2as", &v, false, true).unwrap_err();
        assert_eq!(e.message(), "Invalid character <t2a(*@)s>");
        // not looked at without recursion
        assert!(scan(b"t2as", &v, false, false).is_ok());

        let v = any_bytes("i", b"");
        let e = scan(b"la", &[&[0, 0, 0, 1][..], &v].concat(), false, true).unwrap_err();
        assert_eq!(e.message(), "Value does not match type <la(*i)>");

        let v = any_bytes("c", b"ab");
        let e = scan(b"a", &v, false, true).unwrap_err();
        assert_eq!(e.message(), "Extra characters after value <a(c*)>");
    }

    #[test]
    fn inside_error_values() {
        let mut v = encode_full("k");
        v.extend_from_slice(&encode_full("m"));
        v.extend_from_slice(&any_bytes("@", b""));
        v.extend_from_slice(&encode_full("x"));
        let e = scan(b"t2es", &v, false, true).unwrap_err();
        assert_eq!(e.message(), "Invalid character <t2e(*@)s>");
        assert!(scan(b"t2es", &v, false, false).is_ok());

        let e = scan(b"t2es", &v[..6], false, true).unwrap_err();
        assert_eq!(e.message(), "Value does not match type <t2*es>");
    }

    #[test]
    fn oversized_lengths() {
        // a length far beyond the payload is a mismatch, not an allocation
        let e = scan(b"a", &[0xff, 0xff, 0xff, 0xff, b'i'], false, true).unwrap_err();
        assert_eq!(e.message(), "Value does not match type <a>");
        let e = scan(b"s", &[0xff, 0xff, 0xff, 0xf0, b'x'], false, true).unwrap_err();
        assert_eq!(e.kind(), crate::errors::ErrorKind::ValueMismatch);

        let head = [0x7f, 0xff, 0xff, 0xff, b'i'];
        let mut types = vec![&b"a"[..]].into_iter();
        let mut chunks = vec![&head[..], &[0, 0, 0, 1][..]].into_iter();
        assert!(scan_chunks(|| types.next(), || chunks.next(), true).is_err());
    }

    #[test]
    fn nesting_is_capped() {
        // every level an `a` holding the next
        let mut v = Vec::new();
        for _ in 0..MAX_DEPTH + 1 {
            v = any_bytes("a", &v);
        }
        let e = scan(b"a", &v, false, true).unwrap_err();
        assert!(e.message().starts_with("Nesting too deep"), "{}", e.message());
        assert!(scan(b"a", &v, false, false).is_ok());

        // tuples nested through their first member, rejected before any payload is read
        let ty = format!("{}{}", "t2".repeat(MAX_DEPTH + 1), "i".repeat(MAX_DEPTH + 2));
        let e = scan(ty.as_bytes(), &[], false, false).unwrap_err();
        assert!(e.message().starts_with("Nesting too deep"), "{}", e.message());
    }

    #[test]
    fn chunked() {
        let v = encode_full(&vec!["hello".to_string(), "world".to_string()]);
        let mut types = vec![&b"l"[..], &b"s"[..]].into_iter();
        let mut chunks = v.chunks(3).collect::<Vec<_>>().into_iter();
        // a boundary inside a length prefix
        assert!(scan_chunks(|| types.next(), || chunks.next(), false).is_err());

        let mut types = vec![&b"ls"[..]].into_iter();
        let mut chunks = vec![&v[..4], &v[4..10], &v[10..]].into_iter();
        let s = scan_chunks(|| types.next(), || chunks.next(), false).unwrap();
        assert_eq!(s.value_len, v.len());
    }
}
