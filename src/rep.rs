//! Mapping between native Rust types and typestrings.
//!
//! [`Ser`] and [`De`] describe how a type is laid out on the wire and what its
//! typestring is. The mapping is:
//!
//! | Rust | Typestring |
//! | --- | --- |
//! | `bool` | `b` |
//! | `u8`, `i8` | `c` |
//! | `i16`, `u16`, `i32`, `u32` | `i` |
//! | `i64`, `u64`, `isize`, `usize` | `I` |
//! | `f32`, `f64` | `d` |
//! | `String`, `&str` | `s` |
//! | `Vec<T>`, `[T]` | `lT` |
//! | `[T; N]` | tuple of `N` |
//! | `Option<T>` | `oT` |
//! | `Result<T, ErrorValue>` | `xT`, or `X` if `T` is void-like |
//! | `BTreeMap<K, V>`, `HashMap<K, V>` | `mKV`, or `lK` if `V` is void-like |
//! | tuples | `tN..`, void-like members dropped |
//! | `()` | void-like |
//! | `Any`, `AnyView` | `a` |
//! | `ErrorValue` | `e` |
//!
//! A tuple whose members are all void-like is void-like itself; one with a single
//! non-void member has that member's typestring. A list of void-like elements is
//! void-like and serializes to nothing.
//!
//! Optionals of void-like types and maps with void-like keys have no typestring. Theirs
//! holds a `?` and is rejected by [`ser_type_of`] and [`de_type_of`].

use crate::{
    encoding::{LenCounter, Reader, Serializer, SerializerExt},
    errors::ValueError,
    int_rep,
    typestring::{check_type, Outcome},
};
use once_cell::sync::Lazy;
use std::{
    any::TypeId,
    collections::{BTreeMap, HashMap},
    convert::TryFrom,
    hash::{BuildHasher, Hash},
    sync::RwLock,
};

/// A type that can be serialized.
pub trait Ser {
    /// The typestring of the serialized form.
    fn ser_type() -> String;

    /// Serializes `self` into `out`.
    ///
    /// # Arguments
    ///
    /// * `out: &mut S` - The output.
    fn ser_to<S: Serializer>(&self, out: &mut S);

    /// Length of the serialized form.
    fn ser_len(&self) -> usize {
        let mut c = LenCounter::default();
        self.ser_to(&mut c);
        c.0
    }
}

/// A type that can be deserialized, possibly borrowing from the payload.
pub trait De<'de>: Sized {
    /// The typestring this type deserializes from.
    fn de_type() -> String;

    /// Reads a value from the front of `r`.
    ///
    /// # Errors
    ///
    /// This will return a value mismatch if the payload is too short or does not hold
    /// a valid value.
    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError>;
}

/// A type that deserializes without borrowing from the payload.
pub trait DeOwned: for<'de> De<'de> {}

impl<T> DeOwned for T where T: for<'de> De<'de> {}

static TYPES: Lazy<RwLock<HashMap<TypeId, &'static str>>> = Lazy::new(Default::default);

/// The typestring of `T`, computed once per process.
///
/// ```
/// use ufser::rep::cached_type;
///
/// assert_eq!(cached_type::<Vec<(i32, Option<String>)>>(), "lt2ios");
/// ```
pub fn cached_type<T: Ser + ?Sized + 'static>() -> &'static str {
    let id = TypeId::of::<T>();
    if let Some(ty) = TYPES.read().ok().and_then(|m| m.get(&id).copied()) {
        return ty;
    }
    let ty: &'static str = Box::leak(T::ser_type().into_boxed_str());
    match TYPES.write() {
        Ok(mut m) => *m.entry(id).or_insert(ty),
        Err(_) => ty,
    }
}

/// Stands in for a void-like type where the wire format needs a real one.
const NO_TYPE: &str = "?";

fn checked(ty: String) -> Result<String, ValueError> {
    match check_type(ty.as_bytes()) {
        Ok(()) => Ok(ty),
        Err(e) => Err(ValueError::not_serializable(format!(
            "Type has no typestring: {}",
            e.message()
        ))),
    }
}

/// The typestring of `T`, checked to be well formed.
///
/// # Errors
///
/// [`ValueError::NotSerializable`] for types like `Option<()>`.
///
/// ```
/// use ufser::rep::ser_type_of;
///
/// assert_eq!(ser_type_of::<Option<i32>>().unwrap(), "oi");
/// assert!(ser_type_of::<Option<()>>().is_err());
/// ```
pub fn ser_type_of<T: Ser + ?Sized>() -> Result<String, ValueError> { checked(T::ser_type()) }

/// Like [`ser_type_of`], for the type `T` deserializes from.
pub fn de_type_of<'de, T: De<'de>>() -> Result<String, ValueError> { checked(T::de_type()) }

/// The value mismatch raised when a payload ends early.
#[doc(hidden)]
pub fn overrun(ty: &str) -> ValueError {
    ValueError::value_mismatch(Outcome::ValueMismatch.message(), ty.as_bytes(), None)
}

/// The typestring of a tuple with the given member typestrings.
///
/// ```
/// use ufser::rep::tuple_type;
///
/// assert_eq!(tuple_type(&["i", "", "s"]), "t2is");
/// assert_eq!(tuple_type(&["", "d"]), "d");
/// assert_eq!(tuple_type(&["", ""]), "");
/// ```
pub fn tuple_type<S: AsRef<str>>(members: &[S]) -> String {
    let non_void: Vec<&str> = members
        .iter()
        .map(AsRef::as_ref)
        .filter(|m| !m.is_empty())
        .collect();
    match non_void.len() {
        0 => String::new(),
        1 => non_void[0].to_string(),
        n => format!("t{}{}", n, non_void.concat()),
    }
}

impl Ser for bool {
    fn ser_type() -> String { "b".to_string() }
    #[inline]
    fn ser_to<S: Serializer>(&self, out: &mut S) { out.put_bool(*self) }
}

impl<'de> De<'de> for bool {
    fn de_type() -> String { "b".to_string() }
    #[inline]
    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        r.read_bool().map_err(|_| overrun("b"))
    }
}

int_rep!(u8, u8, "c", put_char, read_u8);
int_rep!(i8, u8, "c", put_char, read_u8);
int_rep!(i16, i32, "i", put_i32, read_i32);
int_rep!(u16, i32, "i", put_i32, read_i32);
int_rep!(i32, i32, "i", put_i32, read_i32);
int_rep!(u32, i32, "i", put_i32, read_i32);
int_rep!(i64, i64, "I", put_i64, read_i64);
int_rep!(u64, i64, "I", put_i64, read_i64);
int_rep!(isize, i64, "I", put_i64, read_i64);
int_rep!(usize, i64, "I", put_i64, read_i64);

impl Ser for f64 {
    fn ser_type() -> String { "d".to_string() }
    #[inline]
    fn ser_to<S: Serializer>(&self, out: &mut S) { out.put_f64(*self) }
}

impl<'de> De<'de> for f64 {
    fn de_type() -> String { "d".to_string() }
    #[inline]
    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        r.read_f64().map_err(|_| overrun("d"))
    }
}

impl Ser for f32 {
    fn ser_type() -> String { "d".to_string() }
    #[inline]
    fn ser_to<S: Serializer>(&self, out: &mut S) { out.put_f64(f64::from(*self)) }
}

impl<'de> De<'de> for f32 {
    fn de_type() -> String { "d".to_string() }
    #[inline]
    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        Ok(r.read_f64().map_err(|_| overrun("d"))? as f32)
    }
}

impl Ser for str {
    fn ser_type() -> String { "s".to_string() }
    fn ser_to<S: Serializer>(&self, out: &mut S) { out.put_bytes(self.as_bytes()) }
}

impl Ser for String {
    fn ser_type() -> String { "s".to_string() }
    fn ser_to<S: Serializer>(&self, out: &mut S) { out.put_bytes(self.as_bytes()) }
}

fn utf8_error() -> ValueError {
    ValueError::value_mismatch(
        "Value does not match type (string is not valid UTF-8)",
        b"s",
        None,
    )
}

impl<'de> De<'de> for &'de str {
    fn de_type() -> String { "s".to_string() }
    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        let bs = r.read_bytes().map_err(|_| overrun("s"))?;
        std::str::from_utf8(bs).map_err(|_| utf8_error())
    }
}

impl<'de> De<'de> for String {
    fn de_type() -> String { "s".to_string() }
    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        <&str>::de(r).map(ToString::to_string)
    }
}

impl<'a, T: Ser + ?Sized> Ser for &'a T {
    fn ser_type() -> String { T::ser_type() }
    #[inline]
    fn ser_to<S: Serializer>(&self, out: &mut S) { (**self).ser_to(out) }
}

impl<T: Ser + ?Sized> Ser for Box<T> {
    fn ser_type() -> String { T::ser_type() }
    #[inline]
    fn ser_to<S: Serializer>(&self, out: &mut S) { (**self).ser_to(out) }
}

impl<'de, T: De<'de>> De<'de> for Box<T> {
    fn de_type() -> String { T::de_type() }
    #[inline]
    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> { T::de(r).map(Box::new) }
}

impl Ser for () {
    fn ser_type() -> String { String::new() }
    #[inline]
    fn ser_to<S: Serializer>(&self, _: &mut S) {}
}

impl<'de> De<'de> for () {
    fn de_type() -> String { String::new() }
    #[inline]
    fn de(_: &mut Reader<'de>) -> Result<Self, ValueError> { Ok(()) }
}

fn list_type(elem: String) -> String {
    if elem.is_empty() {
        elem
    } else {
        format!("l{}", elem)
    }
}

impl<T: Ser> Ser for [T] {
    fn ser_type() -> String { list_type(T::ser_type()) }

    fn ser_to<S: Serializer>(&self, out: &mut S) {
        if T::ser_type().is_empty() {
            return;
        }
        out.put_len(self.len());
        for t in self {
            t.ser_to(out);
        }
    }
}

impl<T: Ser> Ser for Vec<T> {
    fn ser_type() -> String { <[T]>::ser_type() }
    #[inline]
    fn ser_to<S: Serializer>(&self, out: &mut S) { self.as_slice().ser_to(out) }
}

impl<'de, T: De<'de>> De<'de> for Vec<T> {
    fn de_type() -> String { list_type(T::de_type()) }

    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        if T::de_type().is_empty() {
            return Ok(Vec::new());
        }
        let len = r.read_len().map_err(|_| overrun(&Self::de_type()))?;
        // every element takes at least a byte, unless it is void-like
        let mut out = Vec::with_capacity(len.min(r.remaining()));
        for _ in 0..len {
            out.push(T::de(r)?);
        }
        Ok(out)
    }
}

impl<T: Ser, const N: usize> Ser for [T; N] {
    fn ser_type() -> String { tuple_type(&vec![T::ser_type(); N]) }

    fn ser_to<S: Serializer>(&self, out: &mut S) {
        for t in self {
            t.ser_to(out);
        }
    }
}

impl<'de, T: De<'de>, const N: usize> De<'de> for [T; N] {
    fn de_type() -> String { tuple_type(&vec![T::de_type(); N]) }

    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        let mut v = Vec::with_capacity(N);
        for _ in 0..N {
            v.push(T::de(r)?);
        }
        <[T; N]>::try_from(v).map_err(|_| overrun(&Self::de_type()))
    }
}

fn option_type(inner: String) -> String {
    if inner.is_empty() {
        format!("o{}", NO_TYPE)
    } else {
        format!("o{}", inner)
    }
}

impl<T: Ser> Ser for Option<T> {
    fn ser_type() -> String { option_type(T::ser_type()) }

    fn ser_to<S: Serializer>(&self, out: &mut S) {
        out.put_bool(self.is_some());
        if let Some(t) = self {
            t.ser_to(out);
        }
    }
}

impl<'de, T: De<'de>> De<'de> for Option<T> {
    fn de_type() -> String { option_type(T::de_type()) }

    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        if r.read_bool().map_err(|_| overrun(&Self::de_type()))? {
            T::de(r).map(Some)
        } else {
            Ok(None)
        }
    }
}

fn map_type(key: String, value: String) -> String {
    let key = if key.is_empty() { NO_TYPE.to_string() } else { key };
    if value.is_empty() {
        format!("l{}", key)
    } else {
        format!("m{}{}", key, value)
    }
}

impl<K: Ser, V: Ser, S> Ser for HashMap<K, V, S> {
    fn ser_type() -> String { map_type(K::ser_type(), V::ser_type()) }

    fn ser_to<Out: Serializer>(&self, out: &mut Out) {
        out.put_len(self.len());
        for (k, v) in self {
            k.ser_to(out);
            v.ser_to(out);
        }
    }
}

impl<K: Ser, V: Ser> Ser for BTreeMap<K, V> {
    fn ser_type() -> String { map_type(K::ser_type(), V::ser_type()) }

    fn ser_to<S: Serializer>(&self, out: &mut S) {
        out.put_len(self.len());
        for (k, v) in self {
            k.ser_to(out);
            v.ser_to(out);
        }
    }
}

impl<'de, K: De<'de> + Ord, V: De<'de>> De<'de> for BTreeMap<K, V> {
    fn de_type() -> String { map_type(K::de_type(), V::de_type()) }

    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        let len = r.read_len().map_err(|_| overrun(&Self::de_type()))?;
        let mut out = BTreeMap::new();
        for _ in 0..len {
            let k = K::de(r)?;
            let v = V::de(r)?;
            out.insert(k, v);
        }
        Ok(out)
    }
}

impl<'de, K, V, S> De<'de> for HashMap<K, V, S>
where
    K: De<'de> + Eq + Hash,
    V: De<'de>,
    S: BuildHasher + Default,
{
    fn de_type() -> String { map_type(K::de_type(), V::de_type()) }

    fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
        let len = r.read_len().map_err(|_| overrun(&Self::de_type()))?;
        let mut out = HashMap::with_capacity_and_hasher(len.min(r.remaining()), S::default());
        for _ in 0..len {
            let k = K::de(r)?;
            let v = V::de(r)?;
            out.insert(k, v);
        }
        Ok(out)
    }
}

macro_rules! tuple_rep {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Ser),+> Ser for ($($name,)+) {
            fn ser_type() -> String { tuple_type(&[$($name::ser_type()),+]) }

            #[inline]
            fn ser_to<Out: Serializer>(&self, out: &mut Out) {
                $(self.$idx.ser_to(out);)+
            }
        }

        impl<'de, $($name: De<'de>),+> De<'de> for ($($name,)+) {
            fn de_type() -> String { tuple_type(&[$($name::de_type()),+]) }

            #[inline]
            fn de(r: &mut Reader<'de>) -> Result<Self, ValueError> {
                Ok(($($name::de(r)?,)+))
            }
        }
    };
}

tuple_rep!(A 0);
tuple_rep!(A 0, B 1);
tuple_rep!(A 0, B 1, C 2);
tuple_rep!(A 0, B 1, C 2, D 3);
tuple_rep!(A 0, B 1, C 2, D 3, E 4);
tuple_rep!(A 0, B 1, C 2, D 3, E 4, F 5);
