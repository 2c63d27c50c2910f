//! Binary encoding and decoding of wire types.
//!
//! A small, ordered, typed serialization layer designed to:
//! - Serialize structured data into a stable binary format
//! - Deserialize untrusted binary input into structured data
//!
//! Integers are encoded big-endian. Variable-length byte strings are prefixed with a
//! 4-byte big-endian length and capped at decode time to bound allocations driven by
//! untrusted input. Optional values carry a 1-byte presence tag.
//!
//! Decoding malformed input is never a panic: every failure is surfaced as an
//! [Error] for the caller to handle.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Error type for codec operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("extra data found: {0} bytes")]
    ExtraData(usize),
    #[error("length exceeded: {0} > {1}")]
    LengthExceeded(usize, usize),
    #[error("invalid option tag: {0}")]
    InvalidOption(u8),
    #[error("invalid data in {0}: {1}")]
    InvalidData(&'static str, String),
}

/// Trait for types that can be written (encoded) to a buffer.
pub trait Write {
    /// Encodes this value by writing to a buffer.
    fn write(&self, buf: &mut impl BufMut);
}

/// Trait for types that can be read (decoded) from a buffer.
///
/// The `Cfg` type parameter allows for configuration during the read process. For
/// example, it is used to limit the maximum size of allocated buffers when decoding
/// untrusted data. Use `()` for types that do not require configuration.
pub trait Read<Cfg = ()>: Sized {
    /// Reads a value from the buffer using the provided configuration `cfg`,
    /// consuming the necessary bytes.
    fn read_cfg(buf: &mut impl Buf, cfg: Cfg) -> Result<Self, Error>;
}

/// Extension trait providing an ergonomic read method for types requiring no
/// configuration.
pub trait ReadExt: Read<()> {
    /// Reads a value using the default `()` config.
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Self::read_cfg(buf, ())
    }
}

impl<T: Read<()>> ReadExt for T {}

/// Trait for types that can be encoded to a buffer.
pub trait Encode: Write {
    /// Returns the encoded length of this value.
    ///
    /// This method MUST return the exact number of bytes that will be written by
    /// `write()`.
    fn len_encoded(&self) -> usize;

    /// Encodes a value to a freshly allocated buffer.
    ///
    /// Panics if the `write` implementation does not write the expected number of
    /// bytes.
    fn encode(&self) -> Bytes {
        let len = self.len_encoded();
        let mut buf = BytesMut::with_capacity(len);
        self.write(&mut buf);
        assert_eq!(buf.len(), len, "write() did not write expected bytes");
        buf.freeze()
    }
}

/// Trait for types that can be decoded from a buffer, ensuring the entire buffer is
/// consumed.
pub trait Decode<Cfg = ()>: Read<Cfg> {
    /// Decodes a value from a buffer, ensuring the buffer is fully consumed.
    fn decode_cfg(mut buf: impl Buf, cfg: Cfg) -> Result<Self, Error> {
        let result = Self::read_cfg(&mut buf, cfg)?;
        let remaining = buf.remaining();
        if remaining > 0 {
            return Err(Error::ExtraData(remaining));
        }
        Ok(result)
    }
}

impl<Cfg, T: Read<Cfg>> Decode<Cfg> for T {}

/// Extension trait providing an ergonomic decode method for types requiring no
/// configuration.
pub trait DecodeExt: Decode<()> {
    /// Decodes a value using the default `()` config.
    fn decode(buf: impl Buf) -> Result<Self, Error> {
        Self::decode_cfg(buf, ())
    }
}

impl<T: Decode<()>> DecodeExt for T {}

impl Write for u8 {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(*self);
    }
}

impl Read for u8 {
    fn read_cfg(buf: &mut impl Buf, _: ()) -> Result<Self, Error> {
        if buf.remaining() < 1 {
            return Err(Error::EndOfBuffer);
        }
        Ok(buf.get_u8())
    }
}

impl Encode for u8 {
    fn len_encoded(&self) -> usize {
        1
    }
}

impl Write for u32 {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u32(*self);
    }
}

impl Read for u32 {
    fn read_cfg(buf: &mut impl Buf, _: ()) -> Result<Self, Error> {
        if buf.remaining() < 4 {
            return Err(Error::EndOfBuffer);
        }
        Ok(buf.get_u32())
    }
}

impl Encode for u32 {
    fn len_encoded(&self) -> usize {
        4
    }
}

impl Write for u64 {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u64(*self);
    }
}

impl Read for u64 {
    fn read_cfg(buf: &mut impl Buf, _: ()) -> Result<Self, Error> {
        if buf.remaining() < 8 {
            return Err(Error::EndOfBuffer);
        }
        Ok(buf.get_u64())
    }
}

impl Encode for u64 {
    fn len_encoded(&self) -> usize {
        8
    }
}

impl<const N: usize> Write for [u8; N] {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(self);
    }
}

impl<const N: usize> Read for [u8; N] {
    fn read_cfg(buf: &mut impl Buf, _: ()) -> Result<Self, Error> {
        if buf.remaining() < N {
            return Err(Error::EndOfBuffer);
        }
        let mut array = [0u8; N];
        buf.copy_to_slice(&mut array);
        Ok(array)
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn len_encoded(&self) -> usize {
        N
    }
}

impl Write for Bytes {
    fn write(&self, buf: &mut impl BufMut) {
        assert!(
            self.len() <= u32::MAX as usize,
            "byte string too long to encode"
        );
        (self.len() as u32).write(buf);
        buf.put_slice(self);
    }
}

// The config is the maximum accepted payload length.
impl Read<usize> for Bytes {
    fn read_cfg(buf: &mut impl Buf, max: usize) -> Result<Self, Error> {
        let len = u32::read(buf)? as usize;
        if len > max {
            return Err(Error::LengthExceeded(len, max));
        }
        if buf.remaining() < len {
            return Err(Error::EndOfBuffer);
        }
        Ok(buf.copy_to_bytes(len))
    }
}

impl Encode for Bytes {
    fn len_encoded(&self) -> usize {
        4 + self.len()
    }
}

impl<T: Write> Write for Option<T> {
    fn write(&self, buf: &mut impl BufMut) {
        match self {
            Some(inner) => {
                buf.put_u8(1);
                inner.write(buf);
            }
            None => buf.put_u8(0),
        }
    }
}

impl<Cfg, T: Read<Cfg>> Read<Cfg> for Option<T> {
    fn read_cfg(buf: &mut impl Buf, cfg: Cfg) -> Result<Self, Error> {
        match u8::read(buf)? {
            0 => Ok(None),
            1 => Ok(Some(T::read_cfg(buf, cfg)?)),
            tag => Err(Error::InvalidOption(tag)),
        }
    }
}

impl<T: Encode> Encode for Option<T> {
    fn len_encoded(&self) -> usize {
        match self {
            Some(inner) => 1 + inner.len_encoded(),
            None => 1,
        }
    }
}
