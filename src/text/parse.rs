use crate::{
    any::Any,
    convert::convert,
    encoding::SerializerExt,
    policy::SerPolicy,
    rep::tuple_type,
    typestring::{parse_type, MAX_DEPTH},
    util::hex_digit,
};
use byteorder::{BigEndian, ByteOrder};
use failure::Fail;
use std::convert::TryFrom;
use tracing::debug;

/// How the text parser treats lists and maps whose items differ in type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Mismatching item types are an error.
    Normal,
    /// Mismatching items are all wrapped into `a`.
    Liberal,
    /// Like `Liberal`, but every list item and map value is wrapped, numbers are always
    /// doubles and characters are one-byte strings.
    Json,
}

impl Default for ParseMode {
    fn default() -> Self { ParseMode::Liberal }
}

/// A failure to parse text, at a byte offset of the input.
#[derive(Debug, Clone, PartialEq, Eq, Fail)]
#[fail(display = "{} (at offset {})", message, offset)]
pub struct TextError {
    /// What went wrong.
    pub message: String,
    /// Where it went wrong.
    pub offset: usize,
}

type Parsed = Result<String, TextError>;

struct Parser<'t> {
    text: &'t [u8],
    pos: usize,
    mode: ParseMode,
    depth: usize,
}

/// Wraps the value written to `out` since `start` into an `a` of type `ty`.
fn wrap_any(out: &mut Vec<u8>, start: usize, ty: &str) {
    let value = out.split_off(start);
    out.put_bytes(ty.as_bytes());
    out.put_bytes(&value);
}

fn starts_with_nocase(text: &[u8], word: &[u8]) -> bool {
    text.len() >= word.len() && text[..word.len()].eq_ignore_ascii_case(word)
}

impl<'t> Parser<'t> {
    fn rest(&self) -> &'t [u8] { &self.text[self.pos..] }

    fn peek(&self) -> Option<u8> { self.text.get(self.pos).copied() }

    fn skip_ws(&mut self) {
        while self.peek().map_or(false, |c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn fail<S: Into<String>>(&self, message: S) -> TextError {
        TextError {
            message: message.into(),
            offset: self.pos,
        }
    }

    fn value(&mut self, out: &mut Vec<u8>) -> Parsed {
        if self.depth >= MAX_DEPTH {
            return Err(self.fail("Nesting too deep."));
        }
        self.depth += 1;
        let res = self.item(out);
        self.depth -= 1;
        res
    }

    fn item(&mut self, out: &mut Vec<u8>) -> Parsed {
        self.skip_ws();
        let c = match self.peek() {
            None => return Ok(String::new()),
            Some(c) => c,
        };
        match c {
            b'\'' => return self.character(out),
            b'"' => return self.string(out),
            b'[' => return self.list(out),
            b'{' => return self.map(out),
            b'(' => return self.tuple(out),
            b'<' => return self.typed(out),
            _ => {}
        }
        if let Some(res) = self.number(out) {
            return res;
        }
        let rest = self.rest();
        if starts_with_nocase(rest, b"true") {
            self.pos += 4;
            out.put_bool(true);
            return Ok("b".to_string());
        }
        if starts_with_nocase(rest, b"false") {
            self.pos += 5;
            out.put_bool(false);
            return Ok("b".to_string());
        }
        if rest.starts_with(b"null") {
            self.pos += 4;
            return Ok(String::new());
        }
        if rest.starts_with(b"error") {
            self.pos += 5;
            return self.error_value(out);
        }
        if rest.starts_with(b"err") {
            self.pos += 3;
            return self.error_value(out);
        }
        let shown = String::from_utf8_lossy(&rest[..rest.len().min(7)]);
        let mut msg = format!(
            "Did not recognize this: '{}{}",
            shown,
            if rest.len() > 7 { "...'." } else { "'." }
        );
        if c.is_ascii_alphabetic() {
            msg.push_str(" (Maybe missing '\"' for strings?)");
        }
        Err(self.fail(msg))
    }

    fn character(&mut self, out: &mut Vec<u8>) -> Parsed {
        let rest = self.rest();
        let c = if rest.len() >= 3 && rest[2] == b'\'' {
            self.pos += 3;
            rest[1]
        } else if rest.len() >= 5 && rest[1] == b'%' && rest[4] == b'\'' {
            match (hex_digit(rest[2]), hex_digit(rest[3])) {
                (Some(h), Some(l)) => {
                    self.pos += 5;
                    h * 16 + l
                }
                _ => return Err(self.fail("Strange character literal.")),
            }
        } else {
            return Err(self.fail("Strange character literal."));
        };
        if self.mode == ParseMode::Json {
            out.put_bytes(&[c]);
            Ok("s".to_string())
        } else {
            out.put_char(c);
            Ok("c".to_string())
        }
    }

    fn string(&mut self, out: &mut Vec<u8>) -> Parsed {
        let body = &self.rest()[1..];
        let mut end = None;
        let mut i = 0;
        while i < body.len() {
            match body[i] {
                b'\\' => i += 2,
                b'"' => {
                    end = Some(i);
                    break;
                }
                _ => i += 1,
            }
        }
        let end = end.ok_or_else(|| self.fail("Missing terminating quotation mark."))?;
        out.put_bytes(&unescape_string(&body[..end]));
        self.pos += end + 2;
        Ok("s".to_string())
    }

    /// Parses a number if one starts here, like `strtod` would see it. Integers are
    /// `i` when they fit 31 bits and `I` otherwise.
    fn number(&mut self, out: &mut Vec<u8>) -> Option<Parsed> {
        let rest = self.rest();
        let neg = rest.first() == Some(&b'-');
        let sign = usize::from(neg || rest.first() == Some(&b'+'));
        let body = &rest[sign..];

        // special values
        for word in &[&b"infinity"[..], &b"inf"[..], &b"nan"[..]] {
            if starts_with_nocase(body, word) {
                self.pos += sign + word.len();
                let d = if word[0] == b'n' {
                    f64::NAN
                } else if neg {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                };
                out.put_f64(d);
                return Some(Ok("d".to_string()));
            }
        }

        // hexadecimal integers
        if body.len() > 2 && body[0] == b'0' && body[1] == b'x' && hex_digit(body[2]).is_some() {
            let digits = body[2..].iter().take_while(|c| hex_digit(**c).is_some()).count();
            let text = std::str::from_utf8(&body[2..2 + digits]).unwrap_or_default();
            let mag = u64::from_str_radix(text, 16).ok();
            let res = self.integer(mag, neg, out);
            if res.is_ok() {
                self.pos += sign + 2 + digits;
            }
            return Some(res);
        }

        let int_digits = body.iter().take_while(|c| c.is_ascii_digit()).count();
        let mut len = int_digits;
        let mut frac_digits = 0;
        let mut is_float = false;
        if body.get(len) == Some(&b'.') {
            frac_digits = body[len + 1..].iter().take_while(|c| c.is_ascii_digit()).count();
            if int_digits + frac_digits > 0 {
                is_float = true;
                len += 1 + frac_digits;
            }
        }
        if int_digits + frac_digits == 0 {
            return None;
        }
        if matches!(body.get(len).copied(), Some(b'e' | b'E')) {
            let mut e = len + 1;
            if matches!(body.get(e).copied(), Some(b'+' | b'-')) {
                e += 1;
            }
            let exp_digits = body[e.min(body.len())..]
                .iter()
                .take_while(|c| c.is_ascii_digit())
                .count();
            if exp_digits > 0 {
                is_float = true;
                len = e + exp_digits;
            }
        }

        if !is_float && self.mode != ParseMode::Json {
            let text = std::str::from_utf8(&body[..int_digits]).unwrap_or_default();
            let res = self.integer(text.parse::<u64>().ok(), neg, out);
            if res.is_ok() {
                self.pos += sign + int_digits;
            }
            return Some(res);
        }

        let text = std::str::from_utf8(&rest[..sign + len]).unwrap_or_default();
        let d = match text.parse::<f64>() {
            Ok(d) if d.is_finite() => d,
            _ => return Some(Err(self.fail("Number out-of range for double."))),
        };
        self.pos += sign + len;
        out.put_f64(d);
        Some(Ok("d".to_string()))
    }

    fn integer(&self, mag: Option<u64>, neg: bool, out: &mut Vec<u8>) -> Parsed {
        let mag = match mag {
            Some(m) if !neg || m <= 1 << 63 => m,
            _ if neg => return Err(self.fail("Integer out-of range for int64.")),
            _ => return Err(self.fail("Integer out-of range for uint64.")),
        };
        // beyond i64::MAX the bits are kept, as `uint64`
        let i = if neg { (mag as i64).wrapping_neg() } else { mag as i64 };
        if i32::try_from(i).is_ok() && (neg || mag <= 0x7fff_ffff) {
            out.put_i32(i as i32);
            Ok("i".to_string())
        } else {
            out.put_i64(i);
            Ok("I".to_string())
        }
    }

    /// After an item, expects a separator or the closing bracket. Returns whether the
    /// container is closed.
    fn separator(&mut self, close: u8, what: &str) -> Result<bool, TextError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.fail(format!("Missing closing '{}'.", char::from(close)))),
            Some(c) if c == close => Ok(true),
            Some(b',') | Some(b';') => {
                self.pos += 1;
                self.skip_ws();
                Ok(false)
            }
            Some(_) => Err(self.fail(format!("{} must be separated by ';' or ','.", what))),
        }
    }

    fn close(&mut self, close: u8) -> Result<(), TextError> {
        if self.peek() == Some(close) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.fail(format!("Missing closing '{}'.", char::from(close))))
        }
    }

    fn list(&mut self, out: &mut Vec<u8>) -> Parsed {
        self.pos += 1;
        self.skip_ws();
        let start_pos = self.pos;
        let count_at = out.len();
        let mut wrap = self.mode == ParseMode::Json;
        loop {
            out.truncate(count_at);
            out.put_len(0);
            self.pos = start_pos;
            let mut n = 0u32;
            let mut elem: Option<String> = None;
            let mut restart = false;
            while self.peek().map_or(false, |c| c != b']') {
                let before = out.len();
                let t = self.value(out)?;
                if wrap {
                    wrap_any(out, before, &t);
                } else if let Some(e) = elem.as_deref().filter(|e| *e != t) {
                    if self.mode == ParseMode::Normal {
                        return Err(self.fail(format!(
                            "Mismatching types in list: <{}> and <{}>.",
                            e, t
                        )));
                    }
                    debug!(offset = self.pos, "wrapping list items into any");
                    restart = true;
                    break;
                } else if elem.is_none() {
                    elem = Some(t);
                }
                n += 1;
                if self.separator(b']', "List items")? {
                    break;
                }
            }
            if !restart && !wrap && n > 0 && elem.as_deref() == Some("") {
                // a list of voids has no element type to speak of
                restart = true;
            }
            if restart {
                wrap = true;
                continue;
            }
            self.close(b']')?;
            BigEndian::write_u32(&mut out[count_at..count_at + 4], n);
            return Ok(match elem {
                Some(e) if !wrap => format!("l{}", e),
                _ => "la".to_string(),
            });
        }
    }

    fn map(&mut self, out: &mut Vec<u8>) -> Parsed {
        self.pos += 1;
        self.skip_ws();
        let start_pos = self.pos;
        let count_at = out.len();
        let mut wrap = self.mode == ParseMode::Json;
        loop {
            out.truncate(count_at);
            out.put_len(0);
            self.pos = start_pos;
            let mut n = 0u32;
            let mut key: Option<String> = None;
            let mut mapped: Option<String> = None;
            let mut restart = false;
            while self.peek().map_or(false, |c| c != b'}') {
                let kpos = self.pos;
                let t = self.value(out)?;
                if t.is_empty() {
                    self.pos = kpos;
                    return Err(self.fail("Map keys must not be void."));
                }
                if let Some(k) = key.as_deref().filter(|k| *k != t) {
                    return Err(self.fail(format!("Mismatching key types: <{}> and <{}>.", k, t)));
                }
                if key.is_none() {
                    key = Some(t);
                }
                self.skip_ws();
                match self.peek() {
                    None => return Err(self.fail("Missing mapped value and closing '}'.")),
                    Some(b':') | Some(b'=') => self.pos += 1,
                    Some(_) => {
                        return Err(self.fail("Keys and values must be separated by ':' or '='."))
                    }
                }
                let before = out.len();
                let t = self.value(out)?;
                if wrap {
                    wrap_any(out, before, &t);
                } else if let Some(m) = mapped.as_deref().filter(|m| *m != t) {
                    if self.mode == ParseMode::Normal {
                        return Err(self.fail(format!(
                            "Mismatching mapped types: <{}> and <{}>.",
                            m, t
                        )));
                    }
                    debug!(offset = self.pos, "wrapping mapped values into any");
                    restart = true;
                    break;
                } else if mapped.is_none() {
                    mapped = Some(t);
                }
                n += 1;
                if self.separator(b'}', "Map items")? {
                    break;
                }
            }
            if !restart && !wrap && n > 0 && mapped.as_deref() == Some("") {
                restart = true;
            }
            if restart {
                wrap = true;
                continue;
            }
            self.close(b'}')?;
            BigEndian::write_u32(&mut out[count_at..count_at + 4], n);
            let mapped = if wrap { Some("a".to_string()) } else { mapped };
            return Ok(match (key, mapped) {
                (Some(k), Some(m)) => format!("m{}{}", k, m),
                _ => "maa".to_string(),
            });
        }
    }

    fn tuple(&mut self, out: &mut Vec<u8>) -> Parsed {
        self.pos += 1;
        self.skip_ws();
        let mut members = Vec::new();
        while self.peek().map_or(false, |c| c != b')') {
            members.push(self.value(out)?);
            if self.separator(b')', "Tuple items")? {
                break;
            }
        }
        self.close(b')')?;
        if members.len() < 2 {
            return Err(self.fail("Tuples need at least 2 elements."));
        }
        Ok(tuple_type(&members))
    }

    /// `<type>value`, `<>value` or `<>`: an `a`.
    fn typed(&mut self, out: &mut Vec<u8>) -> Parsed {
        let open = self.pos;
        self.pos += 1;
        self.skip_ws();
        let rest = self.rest();
        if rest.is_empty() {
            self.pos = open;
            return Err(self.fail("Missing typestring or closing '>' after '<'."));
        }
        let len = if rest[0] == b'>' {
            0
        } else {
            match parse_type(rest, true) {
                (len, o) if o.is_ok() => len,
                (len, o) => {
                    self.pos += len;
                    return Err(self.fail(format!("{}.", o.message())));
                }
            }
        };
        let target = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len;
        self.skip_ws();
        self.close(b'>')?;
        self.skip_ws();

        let has_value = self
            .peek()
            .map_or(false, |c| !matches!(c, b']' | b')' | b'}' | b';' | b','));
        let any = if has_value {
            let vpos = self.pos;
            let mut raw = Vec::new();
            let ty = self.value(&mut raw)?;
            if target.is_empty() {
                Any::from_type_value_unchecked(&ty, &raw)
            } else {
                let conv = convert(&ty, &target, SerPolicy::ALL, &raw).map_err(|e| TextError {
                    message: e.to_string(),
                    offset: vpos,
                })?;
                Any::from_type_value_unchecked(&target, &conv)
            }
        } else if !target.is_empty() {
            return Err(self.fail("There is a type, but a void value follows."));
        } else {
            Any::default()
        };
        out.put_bytes(any.typestring().as_bytes());
        out.put_bytes(any.value());
        Ok("a".to_string())
    }

    /// `err(type)`, `err(type, message)` or `err(type, message, <value>)`.
    fn error_value(&mut self, out: &mut Vec<u8>) -> Parsed {
        self.skip_ws();
        if self.peek() != Some(b'(') {
            return Err(self.fail("Missing 1-3 elements of error value."));
        }
        self.pos += 1;
        self.skip_ws();
        let mut types = String::new();
        while self.peek().map_or(false, |c| c != b')') {
            types.push_str(&self.value(out)?);
            if self.separator(b')', "Error items")? {
                break;
            }
        }
        self.close(b')')?;
        match types.as_str() {
            "s" => {
                out.put_bytes(b"");
                out.put_bytes(b"");
                out.put_bytes(b"");
            }
            "ss" => {
                out.put_bytes(b"");
                out.put_bytes(b"");
            }
            "ssa" => {}
            _ => return Err(self.fail("Error must contain 's', 't2ss' or 't3ssa'.")),
        }
        Ok("e".to_string())
    }
}

/// Decodes `%xx` and backslash escapes of a string literal. Malformed escapes are
/// kept as they are.
fn unescape_string(s: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut i = 0;
    while i < s.len() {
        match s[i] {
            b'%' if i + 2 < s.len() => {
                match (hex_digit(s[i + 1]), hex_digit(s[i + 2])) {
                    (Some(h), Some(l)) => {
                        out.push(h * 16 + l);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'\\' if i + 1 < s.len() => {
                let esc = s[i + 1];
                i += 2;
                match esc {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'u' if i + 4 <= s.len() => {
                        let code = std::str::from_utf8(&s[i..i + 4])
                            .ok()
                            .and_then(|h| u32::from_str_radix(h, 16).ok())
                            .and_then(std::char::from_u32);
                        match code {
                            Some(ch) => {
                                let mut buf = [0; 4];
                                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                                i += 4;
                            }
                            None => out.extend_from_slice(b"\\u"),
                        }
                    }
                    b'u' => out.extend_from_slice(b"\\u"),
                    other => out.push(other),
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

/// Parses the text form of a value into an [`Any`].
///
/// # Arguments
///
/// * `text: &str` - The text, a single value with optional surrounding whitespace.
/// * `mode: ParseMode` - How to treat lists and maps of mixed item types.
///
/// # Errors
///
/// A [`TextError`] with the offset the parser stopped at.
///
/// # Example
///
/// ```
/// use ufser::text::{parse, ParseMode};
///
/// let a = parse("[1, 2, 3]", ParseMode::Normal).unwrap();
/// assert_eq!(a.typestring(), "li");
///
/// let a = parse("[1, \"a\"]", ParseMode::Liberal).unwrap();
/// assert_eq!(a.print().unwrap(), "<la>[<i>1,<s>\"a\"]");
///
/// let e = parse("[1, \"a\"]", ParseMode::Normal).unwrap_err();
/// assert_eq!(e.message, "Mismatching types in list: <i> and <s>.");
/// ```
pub fn parse(text: &str, mode: ParseMode) -> Result<Any, TextError> {
    let mut p = Parser {
        text: text.as_bytes(),
        pos: 0,
        mode,
        depth: 0,
    };
    let mut out = Vec::new();
    let ty = p.value(&mut out)?;
    p.skip_ws();
    if p.pos < p.text.len() {
        return Err(p.fail("Extra characters after value."));
    }
    Ok(Any::from_type_value_unchecked(&ty, &out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printed(text: &str) -> String { parse(text, ParseMode::Liberal).unwrap().print().unwrap() }

    fn error(text: &str) -> TextError { parse(text, ParseMode::Normal).unwrap_err() }

    #[test]
    fn numbers() {
        assert_eq!(printed("-1"), "<i>-1");
        assert_eq!(printed("-1."), "<d>-1.");
        assert_eq!(printed("-1e1"), "<d>-10.");
        assert_eq!(printed("1e+1"), "<d>10.");
        assert_eq!(printed("1e-1"), "<d>0.1");
        assert_eq!(printed("inf"), "<d>inf");
        assert_eq!(printed("0x10"), "<i>16");
        assert_eq!(printed("3000000000"), "<I>3000000000");
        assert_eq!(printed("-2147483648"), "<i>-2147483648");
        assert_eq!(printed("2147483648"), "<I>2147483648");
        assert_eq!(printed("-9223372036854775808"), "<I>-9223372036854775808");
        assert_eq!(
            error("1234567891234567891123455678554").message,
            "Integer out-of range for uint64."
        );
        assert_eq!(
            error("-1234567891234567891123455678554").message,
            "Integer out-of range for int64."
        );
        assert_eq!(parse("1e999", ParseMode::Normal).unwrap_err().message, "Number out-of range for double.");
    }

    #[test]
    fn not_recognized() {
        let e = error("-a");
        assert_eq!(e.message, "Did not recognize this: '-a'.");
        assert_eq!(e.offset, 0);
        assert_eq!(error(".a").message, "Did not recognize this: '.a'.");
        assert_eq!(
            error("ABC").message,
            "Did not recognize this: 'ABC'. (Maybe missing '\"' for strings?)"
        );
        assert_eq!(
            error("abcdefghij").message,
            "Did not recognize this: 'abcdefg...'. (Maybe missing '\"' for strings?)"
        );
    }

    #[test]
    fn separators() {
        let e = error("[1ea]");
        assert_eq!(e.message, "List items must be separated by ';' or ','.");
        assert_eq!(e.offset, 2);
        assert_eq!(error("1ea").message, "Extra characters after value.");
        assert_eq!(error("[1,2").message, "Missing closing ']'.");
        assert_eq!(error("(1)").message, "Tuples need at least 2 elements.");
        assert_eq!(printed("[1;2,]"), "<li>[1,2]");
    }

    #[test]
    fn literals() {
        assert_eq!(printed("'x'"), "<c>'x'");
        assert_eq!(printed("'%41'"), "<c>'A'");
        assert_eq!(printed("\"a%25b\\n\""), "<s>\"a%25b%0a\"");
        assert_eq!(printed("\"say \\\"hi\\\"\""), "<s>\"say %22hi%22\"");
        assert_eq!(printed("TRUE"), "<b>true");
        assert_eq!(printed("null"), "<>");
        assert_eq!(printed("  (1, \"a\", false)  "), "<t3isb>(1,\"a\",false)");
        assert_eq!(printed("(null, 2)"), "<i>2");
        assert_eq!(printed("[]"), "<la>[]");
        assert_eq!(printed("{}"), "<maa>{}");
    }

    #[test]
    fn typed() {
        assert_eq!(printed("<>3.0"), "<a><d>3.");
        assert_eq!(printed("<i>3.0"), "<a><i>3");
        assert_eq!(printed("<a><xi>3.0"), "<a><a><xi>3");
        assert_eq!(printed("<xs>['h','e','l','l','o']"), "<a><xs>\"hello\"");
        assert_eq!(printed("<>"), "<a><>");
        assert_eq!(printed("[<>, <i>1]"), "<la>[<>,<i>1]");
        assert_eq!(error("<i>").message, "There is a type, but a void value follows.");
        assert_eq!(error("<t2i").message, "Unexpected end of typestring.");
        assert_eq!(error("<i 1").message, "Missing closing '>'.");
        assert!(error("<c>\"long\"").message.starts_with("Type mismatch"));
    }

    #[test]
    fn mixed_items() {
        assert_eq!(
            error("{\"a\":1,\"b\":[1,1]}").message,
            "Mismatching mapped types: <i> and <li>."
        );
        assert_eq!(
            printed("{\"a\":1,\"b\":[1,1]}"),
            "<msa>{\"a\":<i>1,\"b\":<li>[1,1]}"
        );
        assert_eq!(error("{1:2,\"a\":3}").message, "Mismatching key types: <i> and <s>.");
        assert_eq!(printed("[null, null]"), "<la>[<>,<>]");
    }

    #[test]
    fn json_mode() {
        let json = r#"{"x":1,"y":true,"z":null}"#;
        let a = parse(json, ParseMode::Json).unwrap();
        assert_eq!(a.typestring(), "msa");
        assert_eq!(a.print_json().unwrap(), json);
        let a = parse("[1, 'c']", ParseMode::Json).unwrap();
        assert_eq!(a.print().unwrap(), "<la>[<d>1.,<s>\"c\"]");
    }

    #[test]
    fn nesting_is_capped() {
        let deep = format!("{}{}", "[".repeat(100), "]".repeat(100));
        let a = parse(&deep, ParseMode::Normal).unwrap();
        assert_eq!(a.typestring(), format!("{}a", "l".repeat(100)));

        let deeper = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        let e = error(&deeper);
        assert_eq!(e.message, "Nesting too deep.");
        assert_eq!(e.offset, MAX_DEPTH);
        let e = error(&"<a>".repeat(MAX_DEPTH + 1));
        assert_eq!(e.message, "Nesting too deep.");
    }

    #[test]
    fn errors() {
        assert_eq!(printed("err(\"bad\")"), "<e>err(\"bad\",\"\",<>)");
        assert_eq!(printed("error(\"bad\", \"why\", <i>5)"), "<e>err(\"bad\",\"why\",<i>5)");
        assert_eq!(
            error("err(1)").message,
            "Error must contain 's', 't2ss' or 't3ssa'."
        );
    }
}
