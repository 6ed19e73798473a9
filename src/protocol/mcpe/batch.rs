use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::codec::{ByteReader, ByteWriter, VarBytes, Writer};
use crate::error::codec::{DecodeError, DecodeErrorKind, EncodeError};

/// The tag of the game packet envelope.
pub const BATCH_ID: u8 = 0xfe;

/// The largest a batch may inflate to.
pub const MAX_BATCH_SIZE: usize = 2 * 1024 * 1024;

/// A batch of already encoded application payloads.
///
/// On the wire this is [`BATCH_ID`] followed by a raw deflate stream of every
/// payload prefixed with its [`VarU32`](crate::codec::VarU32) length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    pub payloads: Vec<Vec<u8>>,
}

impl Batch {
    pub fn new(payloads: Vec<Vec<u8>>) -> Self {
        Self { payloads }
    }

    pub fn push(&mut self, payload: Vec<u8>) {
        self.payloads.push(payload);
    }

    /// Encodes the batch. Payloads totalling less than `threshold` bytes are
    /// stored uncompressed inside the deflate stream.
    pub fn encode(&self, threshold: usize) -> Result<Vec<u8>, EncodeError> {
        let mut inner = ByteWriter::new();
        for payload in &self.payloads {
            VarBytes::new(payload.clone()).write(&mut inner)?;
        }
        let level = if inner.len() >= threshold {
            Compression::default()
        } else {
            Compression::none()
        };

        let mut encoder = DeflateEncoder::new(vec![BATCH_ID], level);
        encoder.write_all(inner.as_slice())?;
        Ok(encoder.finish()?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = ByteReader::new(bytes);
        let tag = buf.read_u8()?;
        if tag != BATCH_ID {
            return Err(DecodeError::new(0, DecodeErrorKind::UnknownTag(tag as u64)));
        }

        let mut inflated = Vec::new();
        DeflateDecoder::new(buf.as_slice())
            .take(MAX_BATCH_SIZE as u64 + 1)
            .read_to_end(&mut inflated)
            .map_err(|_| DecodeError::new(1, DecodeErrorKind::Invalid("corrupt deflate stream")))?;
        if inflated.len() > MAX_BATCH_SIZE {
            return Err(DecodeError::new(1, DecodeErrorKind::Invalid("batch is too large")));
        }

        // offsets from here on are relative to the inflated stream
        let mut inner = ByteReader::new(&inflated);
        let mut payloads = Vec::new();
        while !inner.is_empty() {
            payloads.push(inner.read_field::<VarBytes>("payloads")?.into_inner());
        }
        Ok(Self { payloads })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_batches_are_stored() {
        let batch = Batch::new(vec![b"hello".to_vec(), b"world".to_vec()]);
        let bytes = batch.encode(256).unwrap();
        assert_eq!(bytes[0], BATCH_ID);
        // a stored block keeps the framed payloads verbatim
        let framed = [5, b'h', b'e', b'l', b'l', b'o', 5, b'w', b'o', b'r', b'l', b'd'];
        assert!(bytes.windows(framed.len()).any(|w| w == framed));
        assert_eq!(Batch::decode(&bytes).unwrap(), batch);
    }

    #[test]
    fn large_batches_compress() {
        let batch = Batch::new(vec![vec![7u8; 4096]; 3]);
        let bytes = batch.encode(256).unwrap();
        assert!(bytes.len() < 1024);
        assert_eq!(Batch::decode(&bytes).unwrap(), batch);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Batch::decode(&[0x01, 0x02]).is_err());
        assert!(Batch::decode(&[]).is_err());
        let err = Batch::decode(&[BATCH_ID, 0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::Invalid(_)));
    }

    #[test]
    fn oversized_batches_are_rejected() {
        let batch = Batch::new(vec![vec![0u8; MAX_BATCH_SIZE]]);
        let bytes = batch.encode(0).unwrap();
        let err = Batch::decode(&bytes).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::Invalid("batch is too large"));
    }
}
