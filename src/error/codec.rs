//! Codec errors are raised by the [`codec`](crate::codec) framework and the packet
//! catalogues built on top of it.
//!
//! Every decode failure carries the field that failed and the byte offset the
//! failing read started at. Decoding never returns partially built values.
use thiserror::Error;

/// What went wrong while decoding a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    /// The buffer ended before the value did.
    #[error("unexpected end of buffer, needed {needed} bytes but {remaining} remain")]
    UnexpectedEof { needed: usize, remaining: usize },
    /// An enum-tagged value carried a tag that is not declared.
    #[error("unknown tag {0:#04x}")]
    UnknownTag(u64),
    /// The offline message id did not match.
    #[error("invalid offline magic")]
    InvalidMagic,
    /// A string was not valid UTF-8.
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    /// A variable length integer did not terminate in time, or overflowed.
    #[error("variable length integer is too long")]
    VarIntTooLong,
    /// The value is structurally invalid.
    #[error("{0}")]
    Invalid(&'static str),
}

/// A failed decode, pointing at the field and the offset of the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to decode `{field}` at byte {offset}: {kind}")]
pub struct DecodeError {
    /// The name of the field being decoded, empty if it is not known.
    pub field: &'static str,
    /// Offset from the start of the buffer.
    pub offset: usize,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(offset: usize, kind: DecodeErrorKind) -> Self {
        Self {
            field: "",
            offset,
            kind,
        }
    }

    /// Attributes the error to `field`, unless a nested codec already named
    /// the field that failed.
    pub fn in_field(mut self, field: &'static str) -> Self {
        if self.field.is_empty() {
            self.field = field;
        }
        self
    }
}

/// A value that can not be represented on the wire.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A length prefix or size field can not hold the value.
    #[error("value is too long to encode ({len} > {max})")]
    TooLong { len: usize, max: usize },
    /// A field required by the value's shape is missing.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// The batch compressor failed.
    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// A failure to decode a whole packet from a catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// The buffer was empty, there is no tag to dispatch on.
    #[error("empty packet")]
    Empty,
    /// The leading tag byte is not part of the catalogue.
    #[error("unknown packet tag {0:#04x}")]
    UnknownTag(u8),
    /// The tag is known but one of its fields failed to decode.
    #[error(transparent)]
    Field(#[from] DecodeError),
}
