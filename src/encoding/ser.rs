use bytes::BytesMut;

/// A sink for serialized bytes.
pub trait Serializer {
    /// Add a byte to the output value.
    fn put_u8(&mut self, u: u8);
    /// Add a slice to the output value.
    fn put_slice(&mut self, slice: &[u8]);
}

/// Convenience methods for [`Serializer`]. Everything is big-endian.
pub trait SerializerExt: Serializer {
    /// Add a [`bool`] to the output value as a single `0` or `1` byte.
    ///
    /// # Arguments
    ///
    /// * `b: bool` - The value to be added.
    fn put_bool(&mut self, b: bool);
    /// Add a character (`c`) to the output value.
    ///
    /// # Arguments
    ///
    /// * `c: u8` - The value to be added.
    fn put_char(&mut self, c: u8);
    /// Add an [`i32`] to the output value.
    ///
    /// # Arguments
    ///
    /// * `i: i32` - The value to be added.
    fn put_i32(&mut self, i: i32);
    /// Add an [`i64`] to the output value.
    ///
    /// # Arguments
    ///
    /// * `i: i64` - The value to be added.
    fn put_i64(&mut self, i: i64);
    /// Add an [`f64`] to the output value.
    ///
    /// # Arguments
    ///
    /// * `f: f64` - The value to be added.
    fn put_f64(&mut self, f: f64);
    /// Add a length or count prefix.
    ///
    /// # Arguments
    ///
    /// * `len: usize` - The length, truncated to 32 bits.
    fn put_len(&mut self, len: usize);
    /// Add a length-prefixed byte string (`s`).
    ///
    /// # Arguments
    ///
    /// * `b: &[u8]` - The bytes to be added.
    fn put_bytes(&mut self, b: &[u8]);
}

impl Serializer for Vec<u8> {
    #[inline]
    fn put_u8(&mut self, u: u8) { self.push(u) }
    #[inline]
    fn put_slice(&mut self, slice: &[u8]) { self.extend_from_slice(slice) }
}

impl Serializer for BytesMut {
    #[inline]
    fn put_u8(&mut self, u: u8) { bytes::BufMut::put_u8(self, u) }
    #[inline]
    fn put_slice(&mut self, slice: &[u8]) { self.extend_from_slice(slice) }
}

/// A [`Serializer`] that only counts bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LenCounter(pub usize);

impl Serializer for LenCounter {
    #[inline]
    fn put_u8(&mut self, _: u8) { self.0 += 1 }
    #[inline]
    fn put_slice(&mut self, slice: &[u8]) { self.0 += slice.len() }
}

impl<S: Serializer> SerializerExt for S {
    #[inline]
    fn put_bool(&mut self, b: bool) { self.put_u8(b as u8) }

    #[inline]
    fn put_char(&mut self, c: u8) { self.put_u8(c) }

    #[inline]
    fn put_i32(&mut self, i: i32) { self.put_slice(&i.to_be_bytes()) }

    #[inline]
    fn put_i64(&mut self, i: i64) { self.put_slice(&i.to_be_bytes()) }

    #[inline]
    fn put_f64(&mut self, f: f64) { self.put_slice(&f.to_bits().to_be_bytes()) }

    #[inline]
    fn put_len(&mut self, len: usize) { self.put_slice(&(len as u32).to_be_bytes()) }

    fn put_bytes(&mut self, b: &[u8]) {
        self.put_len(b.len());
        self.put_slice(b);
    }
}
