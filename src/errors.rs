//! Error types raised while validating, converting or decoding serialized values.
//!
//! Every error carries a [`Diagnostic`]: a message template and up to two typestrings,
//! each with a list of caret positions. The template may refer to the typestrings with
//! `%1` and `%2`; when rendered they appear with a `*` inserted at each position, so
//! `Type mismatch when converting <%1> to <%2>` renders as
//! `Type mismatch when converting <t2*ai> to <d>`. A caret at the very start is left
//! out.

use crate::{error_value::ErrorValue, typestring::Outcome, util::escape_type};
use failure::Fail;
use smallvec::SmallVec;
use std::fmt;

/// Caret positions into a typestring.
pub type Positions = SmallVec<[usize; 2]>;

/// A typestring together with the positions a diagnostic points at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypePos {
    /// The (escaped) typestring.
    pub ty: String,
    /// Caret positions, in bytes of `ty`.
    pub pos: Positions,
}

impl TypePos {
    /// Creates a new `TypePos` from raw typestring bytes.
    ///
    /// Bytes that cannot appear in a typestring are escaped as `%xx`, and the positions
    /// are moved along with them.
    ///
    /// # Arguments
    ///
    /// * `ty: &[u8]` - The typestring.
    /// * `pos: &[usize]` - Positions into `ty`.
    pub fn new(ty: &[u8], pos: &[usize]) -> Self {
        let mut pos: Positions = pos.iter().copied().collect();
        let ty = escape_type(ty, &mut pos);
        TypePos { ty, pos }
    }

    /// A typestring without positions.
    pub fn plain(ty: &[u8]) -> Self { Self::new(ty, &[]) }

    /// Renders the typestring with a `*` at each position.
    ///
    /// A position at the very start is not marked: the whole type is the culprit.
    pub fn marked(&self) -> String {
        let mut pos: Positions = self.pos.iter().copied().filter(|p| *p > 0).collect();
        pos.sort_unstable();
        pos.dedup();
        let mut out = String::with_capacity(self.ty.len() + pos.len());
        let mut last = 0;
        for p in pos {
            let p = p.min(self.ty.len());
            out.push_str(&self.ty[last..p]);
            out.push('*');
            last = p;
        }
        out.push_str(&self.ty[last..]);
        out
    }

    fn prepend(&mut self, prefix: &str) {
        self.ty.insert_str(0, prefix);
        for p in self.pos.iter_mut() {
            *p += prefix.len();
        }
    }
}

/// Message template plus the typestrings it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diagnostic {
    template: String,
    types: [Option<TypePos>; 2],
    what: String,
}

impl Diagnostic {
    /// Creates a new `Diagnostic` with no typestrings attached.
    pub fn new<S: Into<String>>(template: S) -> Self {
        let mut d = Diagnostic {
            template: template.into(),
            ..Default::default()
        };
        d.render(&[]);
        d
    }

    /// Attaches `tp` as the first typestring (`%1`).
    pub fn with_type0(mut self, tp: TypePos) -> Self {
        self.types[0] = Some(tp);
        self.render(&[]);
        self
    }

    /// Attaches `tp` as the second typestring (`%2`).
    pub fn with_type1(mut self, tp: TypePos) -> Self {
        self.types[1] = Some(tp);
        self.render(&[]);
        self
    }

    /// The rendered message.
    pub fn message(&self) -> &str { &self.what }

    /// The unrendered message template.
    pub fn template(&self) -> &str { &self.template }

    /// The first typestring, if any.
    pub fn type0(&self) -> Option<&TypePos> { self.types[0].as_ref() }

    /// The second typestring, if any.
    pub fn type1(&self) -> Option<&TypePos> { self.types[1].as_ref() }

    fn render(&mut self, errors: &[ErrorValue]) {
        let mut template = self.template.clone();
        if self.types[0].is_some() && !template.contains("%1") {
            template.push_str(" <%1>");
        }
        if self.types[1].is_some() && !template.contains("%2") {
            template.push_str(" <%2>");
        }
        let mut out = String::with_capacity(template.len() + 16);
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.peek() {
                Some('1') | Some('2') => {
                    let idx = if chars.next() == Some('1') { 0 } else { 1 };
                    if let Some(tp) = &self.types[idx] {
                        out.push_str(&tp.marked());
                    }
                }
                Some('e') => {
                    chars.next();
                    let texts: Vec<String> = errors.iter().map(ToString::to_string).collect();
                    out.push_str(&texts.join(";"));
                }
                _ => out.push('%'),
            }
        }
        self.what = out;
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str(&self.what) }
}

/// The kind of a [`ValueError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed typestring.
    Typestring,
    /// The payload does not match its typestring.
    ValueMismatch,
    /// Two typestrings are not convertible under the requested policy.
    TypeMismatch,
    /// An `expected` held an error that could not be placed in the target.
    ExpectedWithError,
    /// The value cannot be represented at all.
    NotSerializable,
}

/// Errors of the serialization engine.
#[derive(Debug, Clone, Fail)]
pub enum ValueError {
    /// Malformed typestring.
    #[fail(display = "{}", _0)]
    Typestring(Diagnostic),
    /// The payload does not match its typestring.
    #[fail(display = "{}", _0)]
    ValueMismatch(Diagnostic),
    /// Two typestrings are not convertible under the requested policy.
    #[fail(display = "{}", _0)]
    TypeMismatch(Diagnostic),
    /// Conversion succeeded structurally but source `expected` values held errors.
    #[fail(display = "{}", _0)]
    ExpectedWithError(Diagnostic, Vec<ErrorValue>),
    /// The value cannot be represented at all.
    #[fail(display = "{}", _0)]
    NotSerializable(Diagnostic),
}

impl ValueError {
    /// A typestring error pointing at `pos` in `ty`.
    ///
    /// # Arguments
    ///
    /// * `problem: Outcome` - What went wrong, this decides the message.
    /// * `ty: &[u8]` - The typestring.
    /// * `pos: usize` - Where it went wrong.
    pub fn typestring(problem: Outcome, ty: &[u8], pos: usize) -> Self {
        ValueError::Typestring(
            Diagnostic::new(problem.message()).with_type0(TypePos::new(ty, &[pos])),
        )
    }

    /// A value mismatch error, with an optional position into `ty`.
    pub fn value_mismatch<S: Into<String>>(template: S, ty: &[u8], pos: Option<usize>) -> Self {
        let tp = match pos {
            Some(p) => TypePos::new(ty, &[p]),
            None => TypePos::plain(ty),
        };
        ValueError::ValueMismatch(Diagnostic::new(template).with_type0(tp))
    }

    /// A type mismatch error between two typestrings.
    pub fn type_mismatch<S: Into<String>>(template: S, from: TypePos, to: TypePos) -> Self {
        ValueError::TypeMismatch(Diagnostic::new(template).with_type0(from).with_type1(to))
    }

    /// An error listing the `errors` that `expected` values held during a conversion.
    ///
    /// `%e` in the template is replaced by the error texts.
    pub fn expected_with_error<S: Into<String>>(
        template: S,
        from: TypePos,
        to: TypePos,
        errors: Vec<ErrorValue>,
    ) -> Self {
        let mut d = Diagnostic::new(template).with_type0(from).with_type1(to);
        d.render(&errors);
        ValueError::ExpectedWithError(d, errors)
    }

    /// A value that cannot be serialized.
    pub fn not_serializable<S: Into<String>>(msg: S) -> Self {
        ValueError::NotSerializable(Diagnostic::new(msg))
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValueError::Typestring(_) => ErrorKind::Typestring,
            ValueError::ValueMismatch(_) => ErrorKind::ValueMismatch,
            ValueError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            ValueError::ExpectedWithError(..) => ErrorKind::ExpectedWithError,
            ValueError::NotSerializable(_) => ErrorKind::NotSerializable,
        }
    }

    /// The diagnostic of this error.
    pub fn diagnostic(&self) -> &Diagnostic {
        match self {
            ValueError::Typestring(d)
            | ValueError::ValueMismatch(d)
            | ValueError::TypeMismatch(d)
            | ValueError::ExpectedWithError(d, _)
            | ValueError::NotSerializable(d) => d,
        }
    }

    /// The rendered message.
    pub fn message(&self) -> &str { self.diagnostic().message() }

    /// The errors collected from `expected` values, empty for other kinds.
    pub fn errors(&self) -> &[ErrorValue] {
        match self {
            ValueError::ExpectedWithError(_, errs) => errs,
            _ => &[],
        }
    }

    fn edit<F: FnOnce(&mut Diagnostic)>(&mut self, f: F) {
        match self {
            ValueError::ExpectedWithError(d, errs) => {
                f(d);
                d.render(errs);
            }
            ValueError::Typestring(d)
            | ValueError::ValueMismatch(d)
            | ValueError::TypeMismatch(d)
            | ValueError::NotSerializable(d) => {
                f(d);
                d.render(&[]);
            }
        }
    }

    /// Prepends `prefix` to the first typestring, shifting its positions.
    pub fn prepend_type0(&mut self, prefix: &str) {
        self.edit(|d| {
            if let Some(tp) = &mut d.types[0] {
                tp.prepend(prefix);
            }
        })
    }

    /// Appends `suffix` to the first typestring.
    pub fn append_type0(&mut self, suffix: &str) {
        self.edit(|d| {
            if let Some(tp) = &mut d.types[0] {
                tp.ty.push_str(suffix);
            }
        })
    }

    /// Encapsulates the first typestring as `prefix(type)suffix`.
    ///
    /// Used when the error was found inside an `any`: `prefix` is the enclosing
    /// typestring up to and including the `a`, `suffix` is what follows it.
    pub fn encaps(&mut self, prefix: &str, suffix: &str) {
        self.edit(|d| {
            if let Some(tp) = &mut d.types[0] {
                tp.prepend("(");
                tp.prepend(prefix);
                tp.ty.push(')');
                tp.ty.push_str(suffix);
            }
        })
    }

    /// Appends `text` to the message template.
    pub fn append_msg(&mut self, text: &str) { self.edit(|d| d.template.push_str(text)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carets() {
        let tp = TypePos::new(b"t2ai", &[3, 1]);
        assert_eq!(tp.marked(), "t*2a*i");
        let tp = TypePos::new(b"i", &[7]);
        assert_eq!(tp.marked(), "i*");
        let tp = TypePos::new(b"li", &[0]);
        assert_eq!(tp.marked(), "li");
    }

    #[test]
    fn escaped_type_keeps_positions() {
        let tp = TypePos::new(b"t2i\x01", &[3]);
        assert_eq!(tp.marked(), "t2i*%01");
    }

    #[test]
    fn placeholders_appended() {
        let e = ValueError::typestring(Outcome::InvalidChar, b"@", 0);
        assert_eq!(e.message(), "Invalid character <@>");
        assert_eq!(e.kind(), ErrorKind::Typestring);
    }

    #[test]
    fn type_mismatch_text() {
        let e = ValueError::type_mismatch(
            "Type mismatch when converting <%1> to <%2>",
            TypePos::new(b"a", &[0]),
            TypePos::new(b"i", &[0]),
        );
        assert_eq!(e.message(), "Type mismatch when converting <a> to <i>");
    }

    #[test]
    fn encapsulation() {
        let mut e = ValueError::typestring(Outcome::InvalidChar, b"@", 0);
        e.encaps("t2a", "s");
        assert_eq!(e.message(), "Invalid character <t2a(*@)s>");
        e.prepend_type0("l");
        assert_eq!(e.message(), "Invalid character <lt2a(*@)s>");
    }

    #[test]
    fn error_texts_joined() {
        let e = ValueError::expected_with_error(
            "Errors: %e",
            TypePos::plain(b"lxi"),
            TypePos::plain(b"li"),
            vec![ErrorValue::new("a", "one"), ErrorValue::new("b", "")],
        );
        assert_eq!(e.message(), "Errors: a: one;b <lxi> <li>");
        assert_eq!(e.errors().len(), 2);
    }

    #[test]
    fn escaped_percent_is_not_a_placeholder() {
        let e = ValueError::type_mismatch("%1 vs %2", TypePos::plain(b"%2"), TypePos::plain(b"i"));
        assert_eq!(e.message(), "%252 vs i");
    }
}
