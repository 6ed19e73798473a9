use super::reliability::Reliability;
use crate::codec::{ByteReader, ByteWriter, Reader, Writer, U24};
use crate::error::codec::{DecodeError, DecodeErrorKind, EncodeError};

/// The tag every outgoing frame set is written with.
pub const FRAME_SET_TAG: u8 = 0x84;

/// Split bit of the frame flags.
const SPLIT_FLAG: u8 = 0x10;

/// The largest body a frame can carry, its length is written in bits.
pub const MAX_FRAME_BODY: usize = (u16::MAX / 8) as usize;

/// The information for the given fragment.
/// This is used to determine how to reassemble the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentMeta {
    /// The total number of fragments in this frame.
    pub size: u32,
    /// The identifier shared by every fragment of the payload.
    pub id: u16,
    /// The index of the fragment.
    pub index: u32,
}

/// Frame sets are the datagrams of an established session. They carry a
/// sequence number, acknowledged by the peer, and as many frames as fit in
/// the MTU.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSet {
    /// The sequence of this frame set, sized to 24 bits.
    pub sequence: u32,
    pub frames: Vec<Frame>,
}

impl FrameSet {
    pub fn new(sequence: u32, frames: Vec<Frame>) -> Self {
        Self { sequence, frames }
    }

    /// Whether `tag` marks a frame set.
    pub fn is_frame_set(tag: u8) -> bool {
        (0x80..=0x8f).contains(&tag)
    }
}

impl Reader for FrameSet {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let offset = buf.position();
        let tag = buf.read_u8()?;
        if !Self::is_frame_set(tag) {
            return Err(DecodeError::new(
                offset,
                DecodeErrorKind::UnknownTag(tag as u64),
            ));
        }
        let sequence = buf.read_field::<U24>("sequence")?.0;
        let mut frames = Vec::new();
        while !buf.is_empty() {
            frames.push(buf.read_field::<Frame>("frames")?);
        }
        Ok(Self { sequence, frames })
    }
}

impl Writer for FrameSet {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        buf.write_u8(FRAME_SET_TAG);
        U24(self.sequence).write(buf)?;
        for frame in &self.frames {
            frame.write(buf)?;
        }
        Ok(())
    }
}

/// An individual data frame, these are constructed from a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// The reliability of this frame, written in the top three bits of the
    /// flags. The fourth bit marks a fragment.
    pub reliability: Reliability,
    /// The reliable index of the frame (if reliable)
    pub reliable_index: Option<u32>,
    /// The sequence index of the frame (if sequenced)
    pub sequence_index: Option<u32>,
    /// The order index of the frame (if sequenced or ordered)
    pub order_index: Option<u32>,
    /// The order channel of the frame (if sequenced or ordered)
    pub order_channel: Option<u8>,
    /// The information for fragmentation (if the frame is split into parts)
    pub fragment_meta: Option<FragmentMeta>,
    pub body: Vec<u8>,
}

impl Frame {
    /// A frame without any index assigned yet.
    pub fn new(reliability: Reliability, body: Vec<u8>) -> Self {
        Self {
            reliability,
            reliable_index: None,
            sequence_index: None,
            order_index: None,
            order_channel: None,
            fragment_meta: None,
            body,
        }
    }

    /// Whether or not the frame is fragmented.
    pub fn is_fragmented(&self) -> bool {
        self.fragment_meta.is_some()
    }

    pub fn is_sequenced(&self) -> bool {
        self.reliability.is_sequenced()
    }

    /// The number of bytes this frame takes up inside a frame set.
    pub fn encoded_len(&self) -> usize {
        let mut len = 3;
        if self.reliability.is_reliable() {
            len += 3;
        }
        if self.reliability.is_sequenced() {
            len += 3;
        }
        if self.reliability.is_sequenced_or_ordered() {
            len += 4;
        }
        if self.is_fragmented() {
            len += 10;
        }
        len + self.body.len()
    }

    /// Partitions `body` into frames of at most `frag_size` bytes, sharing
    /// split `id`. Indices are left for the caller to assign.
    pub fn partition(
        body: &[u8],
        reliability: Reliability,
        id: u16,
        frag_size: usize,
    ) -> Vec<Frame> {
        let chunks = body.chunks(frag_size.max(1));
        let size = chunks.len() as u32;
        chunks
            .enumerate()
            .map(|(index, chunk)| {
                let mut frame = Frame::new(reliability, chunk.to_vec());
                frame.fragment_meta = Some(FragmentMeta {
                    size,
                    id,
                    index: index as u32,
                });
                frame
            })
            .collect()
    }
}

impl Reader for Frame {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let flags = buf.read_field::<u8>("flags")?;
        let reliability = Reliability::from_flags(flags);
        // the length is written in bits
        let bits = buf.read_field::<u16>("length")?;
        let len = (bits as usize + 7) / 8;

        let mut frame = Frame::new(reliability, Vec::new());
        if reliability.is_reliable() {
            frame.reliable_index = Some(buf.read_field::<U24>("reliable_index")?.0);
        }
        if reliability.is_sequenced() {
            frame.sequence_index = Some(buf.read_field::<U24>("sequence_index")?.0);
        }
        if reliability.is_sequenced_or_ordered() {
            frame.order_index = Some(buf.read_field::<U24>("order_index")?.0);
            frame.order_channel = Some(buf.read_field::<u8>("order_channel")?);
        }
        if flags & SPLIT_FLAG != 0 {
            frame.fragment_meta = Some(FragmentMeta {
                size: buf.read_field::<u32>("split_count")?,
                id: buf.read_field::<u16>("split_id")?,
                index: buf.read_field::<u32>("split_index")?,
            });
        }
        frame.body = buf
            .take(len)
            .map_err(|e| e.in_field("body"))?
            .to_vec();
        Ok(frame)
    }
}

impl Writer for Frame {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        if self.body.len() > MAX_FRAME_BODY {
            return Err(EncodeError::TooLong {
                len: self.body.len(),
                max: MAX_FRAME_BODY,
            });
        }
        let mut flags = self.reliability.to_flags();
        if self.is_fragmented() {
            flags |= SPLIT_FLAG;
        }
        buf.write_u8(flags);
        ((self.body.len() * 8) as u16).write(buf)?;

        if self.reliability.is_reliable() {
            let index = self
                .reliable_index
                .ok_or(EncodeError::MissingField("reliable_index"))?;
            U24(index).write(buf)?;
        }
        if self.reliability.is_sequenced() {
            let index = self
                .sequence_index
                .ok_or(EncodeError::MissingField("sequence_index"))?;
            U24(index).write(buf)?;
        }
        if self.reliability.is_sequenced_or_ordered() {
            let index = self
                .order_index
                .ok_or(EncodeError::MissingField("order_index"))?;
            U24(index).write(buf)?;
            buf.write_u8(self.order_channel.unwrap_or(0));
        }
        if let Some(meta) = &self.fragment_meta {
            meta.size.write(buf)?;
            meta.id.write(buf)?;
            meta.index.write(buf)?;
        }
        buf.write_bytes(&self.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MAX_FRAME_HEADER_SIZE;

    fn ordered(body: &[u8]) -> Frame {
        let mut frame = Frame::new(Reliability::ReliableOrd, body.to_vec());
        frame.reliable_index = Some(1);
        frame.order_index = Some(2);
        frame.order_channel = Some(3);
        frame
    }

    #[test]
    fn ordered_frame_layout() {
        let bytes = ordered(&[0xaa, 0xbb]).write_to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![0x60, 0x00, 0x10, 1, 0, 0, 2, 0, 0, 3, 0xaa, 0xbb]
        );
        assert_eq!(Frame::read_from_slice(&bytes).unwrap(), ordered(&[0xaa, 0xbb]));
    }

    #[test]
    fn encoded_len_matches_output() {
        let mut frame = Frame::new(Reliability::ReliableSeq, vec![1; 10]);
        frame.reliable_index = Some(0);
        frame.sequence_index = Some(0);
        frame.order_index = Some(0);
        frame.order_channel = Some(0);
        frame.fragment_meta = Some(FragmentMeta {
            size: 2,
            id: 0,
            index: 1,
        });
        let bytes = frame.write_to_bytes().unwrap();
        assert_eq!(bytes.len(), frame.encoded_len());
        assert_eq!(bytes.len(), MAX_FRAME_HEADER_SIZE as usize + 10);
        assert_eq!(Frame::read_from_slice(&bytes).unwrap(), frame);

        let unreliable = Frame::new(Reliability::Unreliable, vec![1, 2]);
        assert_eq!(unreliable.write_to_bytes().unwrap().len(), unreliable.encoded_len());
    }

    #[test]
    fn missing_index_fails_to_encode() {
        let frame = Frame::new(Reliability::Reliable, vec![1]);
        assert!(matches!(
            frame.write_to_bytes(),
            Err(EncodeError::MissingField("reliable_index"))
        ));
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut bytes = ordered(&[1, 2, 3]).write_to_bytes().unwrap();
        bytes.pop();
        let err = Frame::read_from_slice(&bytes).unwrap_err();
        assert_eq!(err.field, "body");
    }

    #[test]
    fn frame_sets_read_until_empty() {
        let set = FrameSet::new(
            0x010203,
            vec![ordered(&[1]), Frame::new(Reliability::Unreliable, vec![2, 3])],
        );
        let bytes = set.write_to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[FRAME_SET_TAG, 0x03, 0x02, 0x01]);
        assert_eq!(FrameSet::read_from_slice(&bytes).unwrap(), set);
    }

    #[test]
    fn partition_shares_the_split_id() {
        let frames = Frame::partition(&[0; 25], Reliability::ReliableOrd, 7, 10);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].body.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            let meta = frame.fragment_meta.unwrap();
            assert_eq!((meta.size, meta.id, meta.index), (3, 7, i as u32));
        }
    }
}
