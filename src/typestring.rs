//! The typestring grammar.
//!
//! A typestring is a compact ASCII description of a serialized value:
//!
//! | Char | Meaning |
//! | --- | --- |
//! | `b` `c` `i` `I` `d` | bool, byte, `i32`, `i64`, `f64` |
//! | `s` | string |
//! | `a` | any: a nested typestring and value |
//! | `e` | error value |
//! | `X` | expected-of-void |
//! | `oT` `xT` `lT` | optional, expected, list of `T` |
//! | `mKV` | map from `K` to `V` |
//! | `tN..` | tuple of `N >= 2` members, `N` in decimal |
//!
//! The empty typestring is the void-like type.

use crate::{errors::ValueError, policy::SerPolicy};

/// How deeply types, payloads and text may nest before they are rejected.
pub const MAX_DEPTH: usize = 256;

/// Outcome of parsing a typestring, or of matching a value against one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Success.
    Ok,
    /// The typestring ended inside a type.
    UnexpectedEnd,
    /// A character that does not start a type.
    InvalidChar,
    /// A tuple count missing or below two.
    NumberTooSmall,
    /// A complete type was followed by more characters.
    ExtraTypeChars,
    /// The payload does not fit the type.
    ValueMismatch,
    /// A complete value was followed by more bytes.
    ExtraValueChars,
    /// Nesting beyond [`MAX_DEPTH`].
    TooDeep,
}

impl Outcome {
    /// The fixed text used in diagnostics.
    pub fn message(self) -> &'static str {
        match self {
            Outcome::Ok => "Ok",
            Outcome::UnexpectedEnd => "Unexpected end of typestring",
            Outcome::InvalidChar => "Invalid character",
            Outcome::NumberTooSmall => "Number at least 2 expected",
            Outcome::ExtraTypeChars => "Extra characters after typestring",
            Outcome::ValueMismatch => "Value does not match type",
            Outcome::ExtraValueChars => "Extra characters after value",
            Outcome::TooDeep => "Nesting too deep",
        }
    }

    /// Whether this is [`Outcome::Ok`].
    pub fn is_ok(self) -> bool { self == Outcome::Ok }
}

/// Parses one type from the start of `ty`.
///
/// Returns the length of the type, or on failure the offset of the problem. An empty
/// input is a (void-like) type only if `accept_void` is set. Missing or too small tuple
/// counts are reported at the offset where the count starts.
///
/// # Arguments
///
/// * `ty: &[u8]` - The typestring, possibly followed by other characters.
/// * `accept_void: bool` - Whether the empty typestring is acceptable here.
///
/// # Example
///
/// ```
/// use ufser::typestring::{parse_type, Outcome};
///
/// assert_eq!(parse_type(b"t2iX", false), (4, Outcome::Ok));
/// assert_eq!(parse_type(b"li", false), (2, Outcome::Ok));
/// assert_eq!(parse_type(b"t0", false), (1, Outcome::NumberTooSmall));
/// assert_eq!(parse_type(b"o", false), (1, Outcome::UnexpectedEnd));
/// ```
pub fn parse_type(ty: &[u8], accept_void: bool) -> (usize, Outcome) { parse_at(ty, accept_void, 0) }

fn parse_at(ty: &[u8], accept_void: bool, depth: usize) -> (usize, Outcome) {
    if depth >= MAX_DEPTH {
        return (0, Outcome::TooDeep);
    }
    let c = match ty.first() {
        Some(c) => *c,
        None if accept_void => return (0, Outcome::Ok),
        None => return (0, Outcome::UnexpectedEnd),
    };
    match c {
        b'b' | b'c' | b'i' | b'I' | b'd' | b's' | b'a' | b'e' | b'X' => (1, Outcome::Ok),
        b'l' | b'o' | b'x' => {
            let (len, o) = parse_at(&ty[1..], false, depth + 1);
            (len + 1, o)
        }
        b'm' => {
            let (klen, o) = parse_at(&ty[1..], false, depth + 1);
            if !o.is_ok() {
                return (klen + 1, o);
            }
            if is_all_expected_void(&ty[1..1 + klen]) {
                return (1, Outcome::InvalidChar);
            }
            let (vlen, o) = parse_at(&ty[1 + klen..], false, depth + 1);
            (1 + klen + vlen, o)
        }
        b't' => {
            let (n, digits) = parse_count(&ty[1..]);
            if n < 2 {
                return (1, Outcome::NumberTooSmall);
            }
            let mut len = 1 + digits;
            for _ in 0..n {
                let (l, o) = parse_at(&ty[len..], false, depth + 1);
                len += l;
                if !o.is_ok() {
                    return (len, o);
                }
            }
            (len, Outcome::Ok)
        }
        _ => (0, Outcome::InvalidChar),
    }
}

/// Reads the decimal tuple count at the start of `ty`.
///
/// Returns the count (saturating) and the number of digits read.
pub fn parse_count(ty: &[u8]) -> (u32, usize) {
    let digits = ty.iter().take_while(|c| c.is_ascii_digit()).count();
    let n = ty[..digits].iter().fold(0u32, |n, c| {
        n.saturating_mul(10).saturating_add(u32::from(c - b'0'))
    });
    (n, digits)
}

/// Where a diagnostic should put its caret for a failed [`parse_type`].
///
/// Count problems are pointed at after the digits, other problems where they were found.
pub(crate) fn caret_pos(ty: &[u8], len: usize, outcome: Outcome) -> usize {
    if outcome == Outcome::NumberTooSmall {
        len + ty[len.min(ty.len())..].iter().take_while(|c| c.is_ascii_digit()).count()
    } else {
        len
    }
}

/// Checks that `ty` is exactly one type (or void).
///
/// # Errors
///
/// Returns a typestring error pointing at the problem.
pub fn check_type(ty: &[u8]) -> Result<(), ValueError> {
    match parse_type(ty, true) {
        (len, Outcome::Ok) if len == ty.len() => Ok(()),
        (len, Outcome::Ok) => Err(ValueError::typestring(Outcome::ExtraTypeChars, ty, len)),
        (len, o) => Err(ValueError::typestring(o, ty, caret_pos(ty, len, o))),
    }
}

/// Whether `ty` is the void-like type.
#[inline]
pub fn is_void(ty: &[u8]) -> bool { ty.is_empty() }

/// Whether `ty` is composed only of `X`, expecteds of such and tuples of such.
///
/// These types carry no data beyond the has-value flags, and cannot be map keys.
pub fn is_all_expected_void(ty: &[u8]) -> bool { all_x_len(ty) == Some(ty.len()) }

fn all_x_len(ty: &[u8]) -> Option<usize> {
    match ty.first()? {
        b'X' => Some(1),
        b'x' => all_x_len(&ty[1..]).map(|l| l + 1),
        b't' => {
            let (n, digits) = parse_count(&ty[1..]);
            if n < 2 {
                return None;
            }
            let mut len = 1 + digits;
            for _ in 0..n {
                len += all_x_len(&ty[len..])?;
            }
            Some(len)
        }
        _ => None,
    }
}

/// Whether a value of the first type in `ty` could convert to void.
///
/// Returns the policy flags such a conversion needs, or `None` if it can never happen.
/// Such types are built of `a`, `X`, expecteds, lists and tuples of such.
///
/// ```
/// use ufser::{policy::SerPolicy, typestring::can_disappear};
///
/// assert_eq!(can_disappear(b"t2aX"), Some(SerPolicy::ANY | SerPolicy::EXPECTED));
/// assert_eq!(can_disappear(b"li"), None);
/// ```
pub fn can_disappear(ty: &[u8]) -> Option<SerPolicy> { disappear(ty).map(|(_, p)| p) }

fn disappear(ty: &[u8]) -> Option<(usize, SerPolicy)> {
    let c = match ty.first() {
        None => return Some((0, SerPolicy::NONE)),
        Some(c) => *c,
    };
    match c {
        b'a' => Some((1, SerPolicy::ANY)),
        b'X' => Some((1, SerPolicy::EXPECTED)),
        b'x' => disappear(&ty[1..]).map(|(l, p)| (l + 1, p | SerPolicy::EXPECTED)),
        b'l' => disappear(&ty[1..]).map(|(l, p)| (l + 1, p)),
        b't' => {
            let (n, digits) = parse_count(&ty[1..]);
            if n < 2 {
                return None;
            }
            let mut len = 1 + digits;
            let mut policy = SerPolicy::NONE;
            for _ in 0..n {
                if len >= ty.len() {
                    return None;
                }
                let (l, p) = disappear(&ty[len..])?;
                len += l;
                policy |= p;
            }
            Some((len, policy))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives() {
        for c in b"bciIdsaeX" {
            assert_eq!(parse_type(&[*c], false), (1, Outcome::Ok));
        }
        assert_eq!(parse_type(b"", true), (0, Outcome::Ok));
        assert_eq!(parse_type(b"", false), (0, Outcome::UnexpectedEnd));
    }

    #[test]
    fn compounds() {
        assert_eq!(parse_type(b"mslt2ids", false), (7, Outcome::Ok));
        assert_eq!(parse_type(b"t3iXt2dsc", false), (8, Outcome::Ok));
        assert_eq!(parse_type(b"t12iiiiiiiiiiii", false), (15, Outcome::Ok));
        assert_eq!(parse_type(b"oxlc", false), (4, Outcome::Ok));
    }

    #[test]
    fn problems() {
        assert_eq!(parse_type(b"t1c", false), (1, Outcome::NumberTooSmall));
        assert_eq!(parse_type(b"tc", false), (1, Outcome::NumberTooSmall));
        assert_eq!(parse_type(b"t2c", false), (3, Outcome::UnexpectedEnd));
        assert_eq!(parse_type(b"l@", false), (1, Outcome::InvalidChar));
        assert_eq!(parse_type(b"mi", false), (2, Outcome::UnexpectedEnd));
        assert_eq!(parse_type(b"mXi", false), (1, Outcome::InvalidChar));
        assert_eq!(parse_type(b"mt2XXi", false), (1, Outcome::InvalidChar));
        assert_eq!(parse_type(b"lt2i@", false), (4, Outcome::InvalidChar));
    }

    #[test]
    fn nesting_is_capped() {
        let deep = format!("{}i", "l".repeat(MAX_DEPTH - 1));
        assert_eq!(parse_type(deep.as_bytes(), false), (MAX_DEPTH, Outcome::Ok));
        let deeper = format!("{}i", "l".repeat(MAX_DEPTH));
        assert_eq!(parse_type(deeper.as_bytes(), false), (MAX_DEPTH, Outcome::TooDeep));
        let e = check_type(format!("{}i", "o".repeat(100_000)).as_bytes()).unwrap_err();
        assert!(e.message().starts_with("Nesting too deep <"));
    }

    #[test]
    fn check_whole() {
        assert!(check_type(b"t2ii").is_ok());
        assert!(check_type(b"").is_ok());
        let e = check_type(b"t2ccc").unwrap_err();
        assert_eq!(e.message(), "Extra characters after typestring <t2cc*c>");
        let e = check_type(b"t1c").unwrap_err();
        assert_eq!(e.message(), "Number at least 2 expected <t1*c>");
        let e = check_type(b"tc").unwrap_err();
        assert_eq!(e.message(), "Number at least 2 expected <t*c>");
        let e = check_type(b"t2c").unwrap_err();
        assert_eq!(e.message(), "Unexpected end of typestring <t2c*>");
    }

    #[test]
    fn all_expected_void() {
        assert!(is_all_expected_void(b"X"));
        assert!(is_all_expected_void(b"t2XxX"));
        assert!(!is_all_expected_void(b"t2Xi"));
        assert!(!is_all_expected_void(b""));
        assert!(!is_all_expected_void(b"XX"));
    }

    #[test]
    fn disappearing() {
        assert_eq!(can_disappear(b""), Some(SerPolicy::NONE));
        assert_eq!(can_disappear(b"a"), Some(SerPolicy::ANY));
        assert_eq!(can_disappear(b"xa"), Some(SerPolicy::ANY | SerPolicy::EXPECTED));
        assert_eq!(can_disappear(b"lX"), Some(SerPolicy::EXPECTED));
        assert_eq!(can_disappear(b"t2ai"), None);
        assert_eq!(can_disappear(b"oa"), None);
        assert_eq!(can_disappear(b"msa"), None);
    }
}
