//! Default payloads.

use crate::{
    encoding::constants::{HAS_VALUE, LEN_LEN, NO_VALUE, VOID_ANY},
    errors::ValueError,
    typestring::{caret_pos, check_type, parse_count, parse_type, Outcome},
};

/// The default payload of `ty`: zero numbers, empty strings and containers, empty
/// optionals, expecteds holding their default value, and a void `a`.
///
/// # Errors
///
/// A typestring error if `ty` is not exactly one type (or void).
///
/// # Example
///
/// ```
/// use ufser::defaults::default_value;
///
/// assert_eq!(default_value("t2ci").unwrap(), vec![0; 5]);
/// assert_eq!(default_value("xoi").unwrap(), vec![1, 0]);
/// assert_eq!(default_value("").unwrap(), vec![]);
/// ```
pub fn default_value(ty: &str) -> Result<Vec<u8>, ValueError> {
    check_type(ty.as_bytes())?;
    let mut out = Vec::new();
    let mut t = ty.as_bytes();
    while !t.is_empty() {
        push_default(&mut t, &mut out).map_err(|pos| {
            ValueError::typestring(Outcome::InvalidChar, ty.as_bytes(), ty.len() - pos)
        })?;
    }
    Ok(out)
}

/// Appends the default of the type at the front of `ty`, advancing it. On failure returns
/// the length of what was left.
fn push_default(ty: &mut &[u8], out: &mut Vec<u8>) -> Result<(), usize> {
    let t = *ty;
    let c = *t.first().ok_or(0usize)?;
    *ty = &t[1..];
    match c {
        b'b' | b'c' => out.push(0),
        b'i' | b's' => out.extend_from_slice(&[0; LEN_LEN]),
        b'I' | b'd' => out.extend_from_slice(&[0; 8]),
        b'a' => out.extend_from_slice(&VOID_ANY),
        b'X' => out.push(HAS_VALUE),
        // two empty strings and a void any
        b'e' => out.extend_from_slice(&[0; 2 * LEN_LEN + VOID_ANY.len()]),
        b'l' | b'o' | b'm' => {
            let mut len = 0;
            let nested = if c == b'm' { 2 } else { 1 };
            for _ in 0..nested {
                let rest = &ty[len..];
                match parse_type(rest, false) {
                    (l, Outcome::Ok) => len += l,
                    (l, o) => return Err(rest.len() - caret_pos(rest, l, o)),
                }
            }
            *ty = &ty[len..];
            if c == b'o' {
                out.push(NO_VALUE);
            } else {
                out.extend_from_slice(&[0; LEN_LEN]);
            }
        }
        b'x' => {
            out.push(HAS_VALUE);
            push_default(ty, out)?;
        }
        b't' => {
            let (n, digits) = parse_count(ty);
            if n < 2 {
                return Err(ty.len());
            }
            *ty = &ty[digits..];
            for _ in 0..n {
                push_default(ty, out)?;
            }
        }
        _ => return Err(t.len()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encoding::decode_full, error_value::ErrorValue, scan::scan};
    use std::collections::BTreeMap;

    #[test]
    fn defaults_decode() {
        assert_eq!(decode_full::<i64>(&default_value("I").unwrap()).unwrap(), 0);
        assert_eq!(decode_full::<String>(&default_value("s").unwrap()).unwrap(), "");
        let m: BTreeMap<String, f64> = decode_full(&default_value("msd").unwrap()).unwrap();
        assert!(m.is_empty());
        let e: ErrorValue = decode_full(&default_value("e").unwrap()).unwrap();
        assert!(!e.is_error());
        assert_eq!(default_value("X").unwrap(), vec![1]);
    }

    #[test]
    fn defaults_scan() {
        for ty in &["t3bca", "lt2sd", "oxe", "mit2XI", "xxX", "a"] {
            let v = default_value(ty).unwrap();
            assert!(scan(ty.as_bytes(), &v, false, true).is_ok(), "{}", ty);
        }
    }

    #[test]
    fn bad_types() {
        let e = default_value("t2i").unwrap_err();
        assert_eq!(e.message(), "Unexpected end of typestring <t2i*>");
        assert!(default_value("ii").is_err());
    }
}
