use crate::{
    any::AnyView,
    encoding::Reader,
    errors::ValueError,
    typestring::{caret_pos, parse_count, parse_type, Outcome, MAX_DEPTH},
    util::{escape, push_escaped},
};
use std::fmt::Write;

/// How values are printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintOptions {
    /// Print JSON instead of the typed text form.
    pub json_like: bool,
    /// Cut the output after this many characters, ending it with `...`.
    pub max_len: Option<usize>,
    /// Characters to escape in strings besides the non-printable ones.
    pub extra_escape: Vec<u8>,
    /// The escape character, `%` by default.
    pub escape_char: u8,
}

impl Default for PrintOptions {
    fn default() -> Self {
        PrintOptions {
            json_like: false,
            max_len: None,
            extra_escape: Vec::new(),
            escape_char: b'%',
        }
    }
}

impl PrintOptions {
    /// Options for JSON output.
    pub fn json() -> Self { PrintOptions::default().with_json_like(true) }

    /// Sets [`PrintOptions::json_like`].
    pub fn with_json_like(mut self, json_like: bool) -> Self {
        self.json_like = json_like;
        self
    }

    /// Sets [`PrintOptions::max_len`].
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Sets [`PrintOptions::extra_escape`].
    pub fn with_extra_escape(mut self, chars: &[u8]) -> Self {
        self.extra_escape = chars.to_vec();
        self
    }

    /// Sets [`PrintOptions::escape_char`].
    pub fn with_escape_char(mut self, c: u8) -> Self {
        self.escape_char = c;
        self
    }
}

/// Why printing stopped early.
enum Stop {
    TooLong,
    Failed(ValueError),
}

impl From<ValueError> for Stop {
    fn from(e: ValueError) -> Self { Stop::Failed(e) }
}

impl Stop {
    fn edit<F: FnOnce(&mut ValueError)>(self, f: F) -> Stop {
        match self {
            Stop::Failed(mut e) => {
                f(&mut e);
                Stop::Failed(e)
            }
            s => s,
        }
    }
}

fn mismatch(ty: &[u8]) -> Stop {
    Stop::Failed(ValueError::value_mismatch(
        Outcome::ValueMismatch.message(),
        ty,
        Some(0),
    ))
}

fn type_len(ty: &[u8]) -> Result<usize, Stop> {
    match parse_type(ty, false) {
        (len, Outcome::Ok) => Ok(len),
        (len, o) => Err(Stop::Failed(ValueError::typestring(o, ty, caret_pos(ty, len, o)))),
    }
}

struct Printer<'o> {
    out: String,
    opts: &'o PrintOptions,
    depth: usize,
}

impl<'o> Printer<'o> {
    fn check_len(&self) -> Result<(), Stop> {
        match self.opts.max_len {
            Some(max) if self.out.len() > max => Err(Stop::TooLong),
            _ => Ok(()),
        }
    }

    fn quoted(&mut self, bytes: &[u8], quote: u8) {
        let esc = self.opts.escape_char;
        self.out.push(char::from(quote));
        for &b in bytes {
            if self.opts.json_like {
                match b {
                    b'"' => self.out.push_str("\\\""),
                    b'\\' => self.out.push_str("\\\\"),
                    b'\n' => self.out.push_str("\\n"),
                    b'\r' => self.out.push_str("\\r"),
                    b'\t' => self.out.push_str("\\t"),
                    0x08 => self.out.push_str("\\b"),
                    0x0c => self.out.push_str("\\f"),
                    0..=0x1f => {
                        let _ = write!(self.out, "\\u{:04x}", b);
                    }
                    _ => push_escaped(&mut self.out, b, esc, &self.opts.extra_escape),
                }
            } else if b == quote || b == b'\\' {
                push_escaped(&mut self.out, b, esc, &[b]);
            } else {
                push_escaped(&mut self.out, b, esc, &self.opts.extra_escape);
            }
        }
        self.out.push(char::from(quote));
    }

    fn double(&mut self, d: f64) {
        if d.is_nan() {
            self.out.push_str("nan");
        } else if d.is_infinite() {
            self.out.push_str(if d > 0.0 { "inf" } else { "-inf" });
        } else {
            let s = format!("{:?}", d);
            match s.strip_suffix(".0") {
                Some(int) => {
                    self.out.push_str(int);
                    // integral doubles end in a dot, except in JSON
                    if !self.opts.json_like {
                        self.out.push('.');
                    }
                }
                None => self.out.push_str(&s),
            }
        }
    }

    fn null(&mut self) {
        if self.opts.json_like {
            self.out.push_str("null");
        }
    }

    /// Prints the `e` at the front of `r`. `None` if the payload is too short.
    fn error_value(&mut self, r: &mut Reader<'_>) -> Option<Result<(), Stop>> {
        let kind = r.read_bytes().ok()?;
        let message = r.read_bytes().ok()?;
        let ty = r.read_bytes().ok()?;
        let value = r.read_bytes().ok()?;
        let res = if self.opts.json_like {
            self.out.push_str("{\"type\":");
            self.quoted(kind, b'"');
            self.out.push_str(",\"message\":");
            self.quoted(message, b'"');
            self.out.push_str(",\"value\":");
            let res = self.any(ty, value);
            self.out.push('}');
            res
        } else {
            self.out.push_str("err(");
            self.quoted(kind, b'"');
            self.out.push(',');
            self.quoted(message, b'"');
            self.out.push(',');
            let res = self.any(ty, value);
            self.out.push(')');
            res
        };
        Some(res)
    }

    /// Prints the value of the type at the front of `ty`, following the cursor convention
    /// of scanning: on failure `ty` is left at the suffix the error's typestring ends with.
    fn value(&mut self, ty: &mut &[u8], r: &mut Reader<'_>) -> Result<(), Stop> {
        if self.depth >= MAX_DEPTH {
            return Err(ValueError::typestring(Outcome::TooDeep, ty, 0).into());
        }
        self.depth += 1;
        let res = self.value_at(ty, r);
        self.depth -= 1;
        res
    }

    fn value_at(&mut self, ty: &mut &[u8], r: &mut Reader<'_>) -> Result<(), Stop> {
        let t = *ty;
        let c = match t.first() {
            None => {
                self.null();
                return Ok(());
            }
            Some(c) => *c,
        };
        match c {
            b'b' => {
                let b = r.read_bool().map_err(|_| mismatch(t))?;
                self.out.push_str(if b { "true" } else { "false" });
                *ty = &t[1..];
            }
            b'c' => {
                let b = r.read_u8().map_err(|_| mismatch(t))?;
                self.quoted(&[b], if self.opts.json_like { b'"' } else { b'\'' });
                *ty = &t[1..];
            }
            b'i' => {
                let i = r.read_i32().map_err(|_| mismatch(t))?;
                let _ = write!(self.out, "{}", i);
                *ty = &t[1..];
            }
            b'I' => {
                let i = r.read_i64().map_err(|_| mismatch(t))?;
                let _ = write!(self.out, "{}", i);
                *ty = &t[1..];
            }
            b'd' => {
                let d = r.read_f64().map_err(|_| mismatch(t))?;
                self.double(d);
                *ty = &t[1..];
            }
            b's' => {
                let s = r.read_bytes().map_err(|_| mismatch(t))?;
                self.quoted(s, b'"');
                *ty = &t[1..];
            }
            b'a' => {
                let inner_ty = r.read_bytes().map_err(|_| mismatch(t))?;
                let inner_val = r.read_bytes().map_err(|_| mismatch(t))?;
                *ty = &t[1..];
                self.any(inner_ty, inner_val)
                    .map_err(|s| s.edit(|e| e.encaps("", &escape(&t[1..]))))?;
            }
            b'e' => {
                self.error_value(r).ok_or_else(|| mismatch(t))??;
                *ty = &t[1..];
            }
            b'X' => {
                let flag = r.read_u8().map_err(|_| mismatch(t))?;
                if flag != 0 {
                    self.null();
                } else {
                    self.error_value(r).ok_or_else(|| mismatch(t))??;
                }
                *ty = &t[1..];
            }
            b'o' | b'x' => {
                let flag = r.read_u8().map_err(|_| mismatch(t))?;
                let inner = &t[1..];
                let len = type_len(inner).map_err(|e| {
                    *ty = inner;
                    e
                })?;
                if flag != 0 {
                    *ty = inner;
                    self.value(ty, r)?;
                } else if c == b'o' {
                    self.null();
                    *ty = &inner[len..];
                } else {
                    self.error_value(r).ok_or_else(|| mismatch(t))??;
                    *ty = &inner[len..];
                }
            }
            b'l' => {
                let n = r.read_len().map_err(|_| mismatch(t))?;
                let inner = &t[1..];
                let len = type_len(inner).map_err(|e| {
                    *ty = inner;
                    e
                })?;
                self.out.push('[');
                for i in 0..n {
                    if i > 0 {
                        self.out.push(',');
                    }
                    let mut et = inner;
                    if let Err(e) = self.value(&mut et, r) {
                        *ty = et;
                        return Err(e);
                    }
                    self.check_len()?;
                }
                self.out.push(']');
                *ty = &inner[len..];
            }
            b'm' => {
                let n = r.read_len().map_err(|_| mismatch(t))?;
                let kt = &t[1..];
                let klen = type_len(kt).map_err(|e| {
                    *ty = kt;
                    e
                })?;
                let vt = &kt[klen..];
                let vlen = type_len(vt).map_err(|e| {
                    *ty = vt;
                    e
                })?;
                self.out.push('{');
                for i in 0..n {
                    if i > 0 {
                        self.out.push(',');
                    }
                    let mut cur = kt;
                    if let Err(e) = self.value(&mut cur, r) {
                        *ty = cur;
                        return Err(e);
                    }
                    self.out.push(':');
                    let mut cur = vt;
                    if let Err(e) = self.value(&mut cur, r) {
                        *ty = cur;
                        return Err(e);
                    }
                    self.check_len()?;
                }
                self.out.push('}');
                *ty = &vt[vlen..];
            }
            b't' => {
                let (n, digits) = parse_count(&t[1..]);
                if n < 2 {
                    return Err(ValueError::typestring(Outcome::NumberTooSmall, t, 1 + digits).into());
                }
                let (open, close) = if self.opts.json_like { ('[', ']') } else { ('(', ')') };
                let mut cur = &t[1 + digits..];
                self.out.push(open);
                for i in 0..n {
                    if i > 0 {
                        self.out.push(',');
                    }
                    if cur.is_empty() {
                        *ty = cur;
                        return Err(ValueError::typestring(Outcome::UnexpectedEnd, cur, 0).into());
                    }
                    if let Err(e) = self.value(&mut cur, r) {
                        *ty = cur;
                        return Err(e);
                    }
                }
                self.out.push(close);
                *ty = cur;
            }
            _ => return Err(ValueError::typestring(Outcome::InvalidChar, t, 0).into()),
        }
        self.check_len()
    }

    /// Prints a whole value of type `ty`, rejecting leftovers.
    fn top(&mut self, ty: &[u8], value: &[u8]) -> Result<(), Stop> {
        let mut t = ty;
        let mut r = Reader::new(value);
        self.value(&mut t, &mut r)
            .map_err(|s| s.edit(|e| e.prepend_type0(&escape(&ty[..ty.len() - t.len()]))))?;
        if !t.is_empty() {
            return Err(ValueError::typestring(Outcome::ExtraTypeChars, ty, ty.len() - t.len()).into());
        }
        if !r.is_empty() {
            return Err(
                ValueError::value_mismatch(Outcome::ExtraValueChars.message(), ty, None).into(),
            );
        }
        Ok(())
    }

    /// Prints an `any`: `<type>value`, or just the value in JSON.
    fn any(&mut self, ty: &[u8], value: &[u8]) -> Result<(), Stop> {
        if ty.is_empty() {
            self.out.push_str(if self.opts.json_like { "null" } else { "<>" });
            return self.check_len();
        }
        if !self.opts.json_like {
            self.out.push('<');
            self.out.push_str(&escape(ty));
            self.out.push('>');
            self.check_len()?;
        }
        self.top(ty, value)
    }

    fn finish(mut self, res: Result<(), Stop>) -> Result<String, ValueError> {
        match res {
            Ok(()) => Ok(self.out),
            Err(Stop::TooLong) => {
                // output is ASCII, any cut is a char boundary
                self.out.truncate(self.opts.max_len.unwrap_or(0));
                self.out.push_str("...");
                Ok(self.out)
            }
            Err(Stop::Failed(e)) => Err(e),
        }
    }
}

/// Prints `view` as `<type>value`, or as JSON.
///
/// # Errors
///
/// A value mismatch or typestring error if the payload does not match its type.
///
/// # Example
///
/// ```
/// use ufser::prelude::*;
///
/// let a = Any::new(&(1i32, vec![2.5f64, 3.0]));
/// assert_eq!(print_any(a.view(), &PrintOptions::default()).unwrap(), "<t2ild>(1,[2.5,3.])");
/// assert_eq!(print_any(a.view(), &PrintOptions::json()).unwrap(), "[1,[2.5,3]]");
/// ```
pub fn print_any(view: AnyView<'_>, opts: &PrintOptions) -> Result<String, ValueError> {
    let mut p = Printer {
        out: String::new(),
        opts,
        depth: 0,
    };
    let res = p.any(view.typestring().as_bytes(), view.value());
    p.finish(res)
}

/// Prints `value` of type `ty` without the type.
///
/// ```
/// use ufser::{encoding::encode_full, text::{print_value, PrintOptions}};
///
/// let v = encode_full(&(None::<f64>, None::<i32>, "aaa"));
/// assert_eq!(print_value("t3odoios", &v, &PrintOptions::default()).unwrap(), "(,,\"aaa\")");
/// ```
pub fn print_value(ty: &str, value: &[u8], opts: &PrintOptions) -> Result<String, ValueError> {
    let mut p = Printer {
        out: String::new(),
        opts,
        depth: 0,
    };
    let res = p.top(ty.as_bytes(), value);
    p.finish(res)
}
