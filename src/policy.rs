//! Conversion policy.

use std::fmt;

bitflags::bitflags! {
    /// Which lossy or structural conversions the conversion engine may perform.
    ///
    /// Identical types and the inherent conversions (tuple/list/map of convertible
    /// members, wrapping into an optional) never need a flag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[repr(transparent)]
    pub struct SerPolicy: u8 {
        /// Widening between `c`, `i` and `I`.
        const INTS = 1 << 0;
        /// Narrowing between `c`, `i` and `I`, truncating silently. Implies [`Self::INTS`].
        const INTS_NARROWING = 1 << 1 | 1 << 0;
        /// `b` to and from the integer types.
        const BOOL = 1 << 2;
        /// `d` to and from the integer types.
        const DOUBLE = 1 << 3;
        /// Adding or removing an `expected` wrapper.
        const EXPECTED = 1 << 4;
        /// Wrapping into and unwrapping out of `a`.
        const ANY = 1 << 5;
        /// `s` and `lc` interchange; void to empty optional.
        const AUX = 1 << 6;
        /// Lists to and from tuples.
        const TUPLE_LIST = 1 << 7;
    }
}

impl SerPolicy {
    /// No conversions beyond the inherent ones.
    pub const NONE: SerPolicy = SerPolicy::empty();
    /// Every conversion.
    pub const ALL: SerPolicy = SerPolicy::all();

    /// Whether every bit of `flag` is allowed.
    #[inline]
    pub fn allows(self, flag: SerPolicy) -> bool { self.contains(flag) }

    /// The user-facing name of a single flag, as used in error messages.
    pub fn flag_name(flag: SerPolicy) -> &'static str {
        if flag == SerPolicy::INTS {
            "convert:ints"
        } else if flag == SerPolicy::INTS_NARROWING {
            "convert:ints_narrowing"
        } else if flag == SerPolicy::BOOL {
            "convert:bool"
        } else if flag == SerPolicy::DOUBLE {
            "convert:double"
        } else if flag == SerPolicy::EXPECTED {
            "convert:expected"
        } else if flag == SerPolicy::ANY {
            "convert:any"
        } else if flag == SerPolicy::AUX {
            "convert:aux"
        } else if flag == SerPolicy::TUPLE_LIST {
            "convert:tuple_list"
        } else {
            "convert:?"
        }
    }
}

impl Default for SerPolicy {
    fn default() -> Self { SerPolicy::NONE }
}

impl fmt::Display for SerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("convert:none");
        }
        if *self == SerPolicy::ALL {
            return f.write_str("convert:all");
        }
        let mut rest = *self;
        let mut first = true;
        for flag in &[
            SerPolicy::INTS_NARROWING,
            SerPolicy::INTS,
            SerPolicy::BOOL,
            SerPolicy::DOUBLE,
            SerPolicy::EXPECTED,
            SerPolicy::ANY,
            SerPolicy::AUX,
            SerPolicy::TUPLE_LIST,
        ] {
            if rest.contains(*flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(SerPolicy::flag_name(*flag))?;
                rest.remove(*flag);
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_includes_widening() {
        assert!(SerPolicy::INTS_NARROWING.allows(SerPolicy::INTS));
        assert!(!SerPolicy::INTS.allows(SerPolicy::INTS_NARROWING));
    }

    #[test]
    fn names() {
        assert_eq!(SerPolicy::flag_name(SerPolicy::ANY), "convert:any");
        assert_eq!(SerPolicy::ALL.to_string(), "convert:all");
        assert_eq!(
            (SerPolicy::INTS_NARROWING | SerPolicy::ANY).to_string(),
            "convert:ints_narrowing|convert:any"
        );
        assert_eq!(SerPolicy::default(), SerPolicy::NONE);
    }
}
