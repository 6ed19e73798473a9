//! The codec framework every wire value of rak-transport is built on.
//!
//! A value is decoded by implementing [`Reader`] and encoded by implementing
//! [`Writer`]. Codecs compose by wrapping one another, for example
//! [`Prefixed<L>`] is a length codec `L` followed by raw bytes, and records
//! declared with [`record!`](crate::record) apply the codec of each field in
//! order.
//!
//! A [`ByteReader`] holds the cursor of a single decode call and a
//! [`ByteWriter`] is the buffer of a single encode call; neither outlives it.
//!
//! Fixed width integers are big-endian unless wrapped in [`Le`]. Sequence
//! numbers use the 24 bit little-endian [`U24`].
pub mod record;
pub mod types;
pub mod varint;

pub use self::types::*;
pub use self::varint::*;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::codec::{DecodeError, DecodeErrorKind, EncodeError};

/// A value that can be decoded from a [`ByteReader`].
pub trait Reader: Sized {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError>;

    /// Decodes a value from the start of `bytes`.
    fn read_from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::read(&mut ByteReader::new(bytes))
    }
}

/// A value that can be encoded into a [`ByteWriter`].
pub trait Writer {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError>;

    /// Encodes this value into a fresh buffer.
    fn write_to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = ByteWriter::new();
        self.write(&mut buf)?;
        Ok(buf.into_inner())
    }
}

/// The cursor over a buffer being decoded.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// The number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The total length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The bytes that have not been consumed yet.
    pub fn as_slice(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Builds an error located at the current position.
    pub fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(self.pos, kind)
    }

    /// Consumes exactly `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(self.error(DecodeErrorKind::UnexpectedEof {
                needed: len,
                remaining: self.remaining(),
            }));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Consumes everything left in the buffer.
    pub fn take_rest(&mut self) -> &'a [u8] {
        let slice = self.as_slice();
        self.pos = self.buf.len();
        slice
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_type<T: Reader>(&mut self) -> Result<T, DecodeError> {
        T::read(self)
    }

    /// Reads a value, attributing any failure to `field`.
    pub fn read_field<T: Reader>(&mut self, field: &'static str) -> Result<T, DecodeError> {
        T::read(self).map_err(|e| e.in_field(field))
    }
}

/// The buffer a single encode call writes into.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Appends `count` zero bytes.
    pub fn pad(&mut self, count: usize) {
        self.buf.resize(self.buf.len() + count, 0);
    }

    pub fn write_type<T: Writer + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        value.write(self)
    }
}

impl Reader for u8 {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        buf.read_u8()
    }
}

impl Writer for u8 {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        buf.write_u8(*self);
        Ok(())
    }
}

impl Reader for i8 {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(buf.read_u8()? as i8)
    }
}

impl Writer for i8 {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        buf.write_u8(*self as u8);
        Ok(())
    }
}

impl Reader for bool {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(buf.read_u8()? != 0)
    }
}

impl Writer for bool {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        buf.write_u8(*self as u8);
        Ok(())
    }
}

/// Selects the little-endian codec of a fixed width value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Le<T>(pub T);

macro_rules! fixed_width {
    ($($ty: ty, $size: literal, $read: ident, $write: ident);* $(;)?) => {
        $(
            impl Reader for $ty {
                fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
                    Ok(BigEndian::$read(buf.take($size)?))
                }
            }

            impl Writer for $ty {
                fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
                    let mut bytes = [0u8; $size];
                    BigEndian::$write(&mut bytes, *self);
                    buf.write_bytes(&bytes);
                    Ok(())
                }
            }

            impl Reader for Le<$ty> {
                fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
                    Ok(Le(LittleEndian::$read(buf.take($size)?)))
                }
            }

            impl Writer for Le<$ty> {
                fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
                    let mut bytes = [0u8; $size];
                    LittleEndian::$write(&mut bytes, self.0);
                    buf.write_bytes(&bytes);
                    Ok(())
                }
            }
        )*
    };
}

fixed_width! {
    u16, 2, read_u16, write_u16;
    i16, 2, read_i16, write_i16;
    u32, 4, read_u32, write_u32;
    i32, 4, read_i32, write_i32;
    u64, 8, read_u64, write_u64;
    i64, 8, read_i64, write_i64;
    f32, 4, read_f32, write_f32;
    f64, 8, read_f64, write_f64;
}
