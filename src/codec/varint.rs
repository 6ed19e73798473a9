//! Variable length integers: 7 payload bits per byte, least significant group
//! first, with the high bit set on every byte but the last.
//!
//! The signed variants zig-zag the value first so small negative numbers stay
//! short.
use super::{ByteReader, ByteWriter, Reader, Writer};
use crate::error::codec::{DecodeError, DecodeErrorKind, EncodeError};

/// The number of bytes `v` occupies as a variable length integer.
pub const fn size_of(mut v: u64) -> usize {
    if v == 0 {
        return 1;
    }
    let mut size = 0;
    while v > 0 {
        size += 1;
        v >>= 7;
    }
    size
}

fn read_varint(buf: &mut ByteReader<'_>, max_bytes: usize) -> Result<u64, DecodeError> {
    let start = buf.position();
    let mut value: u64 = 0;
    for i in 0..max_bytes {
        let byte = buf.read_u8()?;
        // the tenth byte of a 64 bit value may only carry the top bit
        if i == 9 && byte & 0x7e != 0 {
            return Err(DecodeError::new(start, DecodeErrorKind::VarIntTooLong));
        }
        value |= ((byte & 0x7f) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(DecodeError::new(start, DecodeErrorKind::VarIntTooLong))
}

fn write_varint(buf: &mut ByteWriter, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.write_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// An unsigned 32 bit variable length integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarU32(pub u32);

/// A zig-zag encoded signed 32 bit variable length integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarI32(pub i32);

/// An unsigned 64 bit variable length integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarU64(pub u64);

/// A zig-zag encoded signed 64 bit variable length integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarI64(pub i64);

impl Reader for VarU32 {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let start = buf.position();
        let value = read_varint(buf, 5)?;
        u32::try_from(value)
            .map(VarU32)
            .map_err(|_| DecodeError::new(start, DecodeErrorKind::VarIntTooLong))
    }
}

impl Writer for VarU32 {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        write_varint(buf, self.0 as u64);
        Ok(())
    }
}

impl Reader for VarI32 {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let raw = VarU32::read(buf)?.0;
        Ok(VarI32((raw >> 1) as i32 ^ -((raw & 1) as i32)))
    }
}

impl Writer for VarI32 {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        let zigzag = ((self.0 << 1) ^ (self.0 >> 31)) as u32;
        VarU32(zigzag).write(buf)
    }
}

impl Reader for VarU64 {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(VarU64(read_varint(buf, 10)?))
    }
}

impl Writer for VarU64 {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        write_varint(buf, self.0);
        Ok(())
    }
}

impl Reader for VarI64 {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let raw = VarU64::read(buf)?.0;
        Ok(VarI64((raw >> 1) as i64 ^ -((raw & 1) as i64)))
    }
}

impl Writer for VarI64 {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        let zigzag = ((self.0 << 1) ^ (self.0 >> 63)) as u64;
        VarU64(zigzag).write(buf)
    }
}
