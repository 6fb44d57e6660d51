use super::constants::*;
use byteorder::{BigEndian, ByteOrder};
use failure::Fail;

/// A read past the end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Fail)]
#[fail(display = "tried to read {} bytes from buffer of size {}", wanted, available)]
pub struct Overrun {
    /// How many bytes were needed.
    pub wanted: usize,
    /// How many bytes were left.
    pub available: usize,
}

/// A cursor over a serialized payload.
///
/// Every read either consumes exactly the bytes of the value read, or fails with an
/// [`Overrun`] and consumes nothing.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'de> {
    buf: &'de [u8],
    pos: usize,
}

impl<'de> Reader<'de> {
    /// Creates a new `Reader` at the start of `buf`.
    pub fn new(buf: &'de [u8]) -> Self { Reader { buf, pos: 0 } }

    /// Bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize { self.pos }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize { self.buf.len() - self.pos }

    /// Whether everything was consumed.
    #[inline]
    pub fn is_empty(&self) -> bool { self.remaining() == 0 }

    /// The unconsumed part of the buffer.
    #[inline]
    pub fn rest(&self) -> &'de [u8] { &self.buf[self.pos..] }

    /// Tries to consume `len` bytes.
    #[inline]
    pub fn read_many(&mut self, len: usize) -> Result<&'de [u8], Overrun> {
        if self.remaining() >= len {
            let bs = &self.buf[self.pos..self.pos + len];
            self.pos += len;
            Ok(bs)
        } else {
            Err(Overrun {
                wanted: len,
                available: self.remaining(),
            })
        }
    }

    /// Tries to skip `len` bytes.
    #[inline]
    pub fn advance(&mut self, len: usize) -> Result<(), Overrun> { self.read_many(len).map(|_| ()) }

    /// Returns the next byte without consuming it.
    #[inline]
    pub fn peek_byte(&self) -> Result<u8, Overrun> {
        self.buf.get(self.pos).copied().ok_or(Overrun {
            wanted: 1,
            available: 0,
        })
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, Overrun> { Ok(self.read_many(CHAR_LEN)?[0]) }

    /// Any non-zero byte reads as `true`.
    #[inline]
    pub fn read_bool(&mut self) -> Result<bool, Overrun> { Ok(self.read_many(BOOL_LEN)?[0] != 0) }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32, Overrun> {
        Ok(BigEndian::read_i32(self.read_many(I32_LEN)?))
    }

    #[inline]
    pub fn read_i64(&mut self) -> Result<i64, Overrun> {
        Ok(BigEndian::read_i64(self.read_many(I64_LEN)?))
    }

    #[inline]
    pub fn read_f64(&mut self) -> Result<f64, Overrun> {
        Ok(BigEndian::read_f64(self.read_many(F64_LEN)?))
    }

    /// Reads a length or count prefix.
    #[inline]
    pub fn read_len(&mut self) -> Result<usize, Overrun> {
        Ok(BigEndian::read_u32(self.read_many(LEN_LEN)?) as usize)
    }

    /// Reads a length-prefixed byte string.
    pub fn read_bytes(&mut self) -> Result<&'de [u8], Overrun> {
        let save = self.pos;
        let len = self.read_len()?;
        self.read_many(len).map_err(|e| {
            self.pos = save;
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads() {
        let data = [0, 0, 0, 2, b'h', b'i', 1, 0xff, 0xff, 0xff, 0xfe];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_bytes().unwrap(), b"hi");
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_i32().unwrap(), -2);
        assert!(r.is_empty());
    }

    #[test]
    fn overrun_consumes_nothing() {
        let data = [0, 0, 0, 9, b'h'];
        let mut r = Reader::new(&data);
        let e = r.read_bytes().unwrap_err();
        assert_eq!(e, Overrun { wanted: 9, available: 1 });
        assert_eq!(r.position(), 0);
        assert_eq!(
            r.read_i64().unwrap_err().to_string(),
            "tried to read 8 bytes from buffer of size 5"
        );
    }
}
