/// Width of a `b`.
pub(crate) const BOOL_LEN: usize = 1;
/// Width of a `c`.
pub(crate) const CHAR_LEN: usize = 1;
/// Width of an `i`.
pub(crate) const I32_LEN: usize = 4;
/// Width of an `I`.
pub(crate) const I64_LEN: usize = 8;
/// Width of a `d`.
pub(crate) const F64_LEN: usize = 8;
/// Width of a length or count prefix.
pub(crate) const LEN_LEN: usize = 4;

/// Flag byte of an empty optional, or of an expected holding an error.
pub(crate) const NO_VALUE: u8 = 0;
/// Flag byte of a present optional, or of an expected holding a value.
pub(crate) const HAS_VALUE: u8 = 1;

/// Payload of an `a` holding void: empty typestring, empty value.
pub(crate) const VOID_ANY: [u8; 2 * LEN_LEN] = [0; 2 * LEN_LEN];
