pub const ACK: u8 = 0xc0;
pub const NACK: u8 = 0xa0;

use super::MAX_ACK_SEQUENCES;
use crate::codec::{ByteReader, ByteWriter, Reader, Writer, U24};
use crate::error::codec::{DecodeError, DecodeErrorKind, EncodeError};
use crate::util::U24_MAX;

crate::tagged! {
    /// The flag in front of every ack record.
    pub enum RecordKind: u8 {
        Range = 0,
        Single = 1,
    }
}

/// An ack record.
/// A record holds a single or range of acked packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Single(SingleRecord),
    Range(RangeRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleRecord {
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRecord {
    pub start: u32,
    pub end: u32,
}

impl RangeRecord {
    /// Fixes the end of the range if it is lower than the start.
    pub fn fix(&mut self) {
        if self.end < self.start {
            std::mem::swap(&mut self.start, &mut self.end);
        }
    }
}

impl Record {
    fn new(start: u32, end: u32) -> Self {
        if start == end {
            Record::Single(SingleRecord { sequence: start })
        } else {
            Record::Range(RangeRecord { start, end })
        }
    }
}

impl Reader for Record {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        match buf.read_field::<RecordKind>("kind")? {
            RecordKind::Single => Ok(Record::Single(SingleRecord {
                sequence: buf.read_field::<U24>("sequence")?.0,
            })),
            RecordKind::Range => {
                let mut record = RangeRecord {
                    start: buf.read_field::<U24>("start")?.0,
                    end: buf.read_field::<U24>("end")?.0,
                };
                record.fix();
                Ok(Record::Range(record))
            }
        }
    }
}

impl Writer for Record {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        match self {
            Record::Single(rec) => {
                RecordKind::Single.write(buf)?;
                U24(rec.sequence).write(buf)
            }
            Record::Range(rec) => {
                RecordKind::Range.write(buf)?;
                U24(rec.start).write(buf)?;
                U24(rec.end).write(buf)
            }
        }
    }
}

/// An ACK or NACK packet, depending on `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub id: u8,
    pub records: Vec<Record>,
}

impl Ack {
    pub fn new(nack: bool) -> Self {
        Self {
            id: if nack { NACK } else { ACK },
            records: Vec::new(),
        }
    }

    pub fn is_nack(&self) -> bool {
        self.id == NACK
    }

    /// Builds an ack from a list of sequences, coalescing every contiguous
    /// run into a single range record.
    pub fn from_records(mut sequences: Vec<u32>, nack: bool) -> Self {
        sequences.sort_unstable();
        sequences.dedup();

        let mut ack = Self::new(nack);
        let mut iter = sequences.into_iter();
        let Some(first) = iter.next() else {
            return ack;
        };
        let (mut start, mut end) = (first, first);
        for seq in iter {
            if seq == end + 1 {
                end = seq;
            } else {
                ack.records.push(Record::new(start, end));
                start = seq;
                end = seq;
            }
        }
        ack.records.push(Record::new(start, end));
        ack
    }

    /// Every sequence this packet covers, at most [`MAX_ACK_SEQUENCES`].
    pub fn sequences(&self) -> Vec<u32> {
        let mut sequences = Vec::new();
        for record in &self.records {
            match record {
                Record::Single(rec) => sequences.push(rec.sequence),
                Record::Range(rec) => {
                    let end = rec.end.min(U24_MAX);
                    let room = (MAX_ACK_SEQUENCES - sequences.len()) as u32;
                    let span = end.saturating_sub(rec.start).min(room.saturating_sub(1));
                    sequences.extend(rec.start..=rec.start + span);
                }
            }
            if sequences.len() >= MAX_ACK_SEQUENCES {
                sequences.truncate(MAX_ACK_SEQUENCES);
                break;
            }
        }
        sequences
    }
}

impl Reader for Ack {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let offset = buf.position();
        let id = buf.read_u8()?;
        if id != ACK && id != NACK {
            return Err(DecodeError::new(
                offset,
                DecodeErrorKind::UnknownTag(id as u64),
            ));
        }
        let count = buf.read_field::<u16>("count")?;
        let mut records = Vec::with_capacity((count as usize).min(buf.remaining() / 4));
        for _ in 0..count {
            records.push(buf.read_field::<Record>("records")?);
        }
        Ok(Self { id, records })
    }
}

impl Writer for Ack {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        if self.records.len() > u16::MAX as usize {
            return Err(EncodeError::TooLong {
                len: self.records.len(),
                max: u16::MAX as usize,
            });
        }
        buf.write_u8(self.id);
        (self.records.len() as u16).write(buf)?;
        for record in &self.records {
            record.write(buf)?;
        }
        Ok(())
    }
}
