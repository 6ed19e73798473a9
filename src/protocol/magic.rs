use crate::codec::{ByteReader, ByteWriter, Reader, Writer};
use crate::error::codec::{DecodeError, DecodeErrorKind, EncodeError};

/// A unique identifier recognizing the client as offline.
pub(crate) const MAGIC: [u8; 16] = [
    0x00, 0xff, 0xff, 0x0, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];

/// The magic is sent within every offline packet to identify the sender as a
/// RakNet peer. Decoding anything else fails with
/// [`DecodeErrorKind::InvalidMagic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Magic;

impl Magic {
    pub fn new() -> Self {
        Self
    }
}

impl Reader for Magic {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let offset = buf.position();
        if buf.read_array::<16>()? != MAGIC {
            return Err(DecodeError::new(offset, DecodeErrorKind::InvalidMagic));
        }
        Ok(Magic)
    }
}

impl Writer for Magic {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        buf.write_bytes(&MAGIC);
        Ok(())
    }
}
