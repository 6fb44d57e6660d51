/// Whether `b` is printed as itself by [`push_escaped`].
#[inline]
pub fn is_plain(b: u8, escape_char: u8, extra: &[u8]) -> bool {
    (0x20..0x7f).contains(&b) && b != escape_char && !extra.contains(&b)
}

/// Appends `b` to `out`, escaped as `<escape_char>xx` (lowercase hex) unless it is
/// printable ASCII not listed in `extra`.
///
/// # Arguments
///
/// * `out: &mut String` - The output.
/// * `b: u8` - The byte to print.
/// * `escape_char: u8` - The escape character, itself always escaped.
/// * `extra: &[u8]` - Additional characters to escape.
///
/// # Example
///
/// ```
/// use ufser::util::push_escaped;
///
/// let mut out = String::new();
/// for b in b"a%\x01\"" {
///     push_escaped(&mut out, *b, b'%', b"\"");
/// }
/// assert_eq!(out, "a%25%01%22");
/// ```
pub fn push_escaped(out: &mut String, b: u8, escape_char: u8, extra: &[u8]) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    if is_plain(b, escape_char, extra) {
        out.push(char::from(b));
    } else {
        out.push(char::from(escape_char));
        out.push(char::from(HEX[usize::from(b >> 4)]));
        out.push(char::from(HEX[usize::from(b & 0xf)]));
    }
}

/// Escapes `bytes` with `%` as escape character.
pub fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for b in bytes {
        push_escaped(&mut out, *b, b'%', &[]);
    }
    out
}

/// Escapes a typestring for use in a diagnostic, moving `positions` along.
pub(crate) fn escape_type(ty: &[u8], positions: &mut [usize]) -> String {
    let mut out = String::with_capacity(ty.len());
    let mut map = Vec::with_capacity(ty.len() + 1);
    for b in ty {
        map.push(out.len());
        push_escaped(&mut out, *b, b'%', &[]);
    }
    map.push(out.len());
    for p in positions.iter_mut() {
        *p = map[(*p).min(ty.len())];
    }
    out
}

/// Value of a hex digit.
#[inline]
pub fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Reverses [`escape`]; malformed escapes are kept verbatim.
pub fn unescape(text: &[u8], escape_char: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        if text[i] == escape_char && i + 2 < text.len() {
            if let (Some(h), Some(l)) = (hex_digit(text[i + 1]), hex_digit(text[i + 2])) {
                out.push(h * 16 + l);
                i += 3;
                continue;
            }
        }
        out.push(text[i]);
        i += 1;
    }
    out
}

#[macro_export]
/// Helper macro implementing [`Ser`](crate::rep::Ser) and [`De`](crate::rep::De) for
/// integer types that share a wire representation.
macro_rules! int_rep {
    ($t:ty, $wire:ty, $ty:expr, $put:ident, $read:ident) => {
        impl $crate::rep::Ser for $t {
            fn ser_type() -> String { $ty.to_string() }
            #[inline]
            fn ser_to<S: $crate::encoding::Serializer>(&self, out: &mut S) {
                $crate::encoding::SerializerExt::$put(out, *self as $wire)
            }
        }

        impl<'de> $crate::rep::De<'de> for $t {
            fn de_type() -> String { $ty.to_string() }
            #[inline]
            fn de(r: &mut $crate::encoding::Reader<'de>) -> Result<Self, $crate::errors::ValueError> {
                Ok(r.$read().map_err(|_| $crate::rep::overrun($ty))? as $t)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_roundtrip() {
        let raw = b"\x00ab%\xff";
        let esc = escape(raw);
        assert_eq!(esc, "%00ab%25%ff");
        assert_eq!(unescape(esc.as_bytes(), b'%'), raw.to_vec());
    }

    #[test]
    fn bad_escapes_kept() {
        assert_eq!(unescape(b"%zz%4", b'%'), b"%zz%4".to_vec());
    }
}
