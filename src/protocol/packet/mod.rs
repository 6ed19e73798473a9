//! This module contains all the packets that are used by the RakNet protocol.
//! This module is split into two submodules:
//! - [`offline`]: Any packet that is not sent within a [`Frame`].
//! - [`online`]: Any packet considered to be online, which is sent within a [`Frame`].
//!
//! Packet kinds are declared with [`packets!`](crate::packets), which builds a
//! closed enum and the [`Catalogue`] used to dispatch on the leading tag byte.
//! Catalogues are plain values, built once by their owner and passed around
//! by reference.
//!
//! [`offline`]: crate::protocol::packet::offline
//! [`online`]: crate::protocol::packet::online
//! [`Frame`]: crate::protocol::frame::Frame
pub mod offline;
pub mod online;

use std::fmt;

use self::offline::OfflinePacket;
use super::ack::{Ack, ACK, NACK};
use super::frame::FrameSet;
use crate::codec::{ByteReader, ByteWriter, Reader, Writer};
use crate::error::codec::{DecodeError, EncodeError, PacketError};

/// Decodes the body of a packet, the tag byte has already been consumed.
pub type Decoder<P> = fn(&mut ByteReader<'_>) -> Result<P, DecodeError>;

/// An immutable dispatch table from tag byte to packet decoder.
pub struct Catalogue<P> {
    name: &'static str,
    decoders: [Option<Decoder<P>>; 256],
}

impl<P> Catalogue<P> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            decoders: [None; 256],
        }
    }

    /// Registers the decoder of `tag`, replacing any previous one.
    pub fn register(mut self, tag: u8, decoder: Decoder<P>) -> Self {
        self.decoders[tag as usize] = Some(decoder);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn contains(&self, tag: u8) -> bool {
        self.decoders[tag as usize].is_some()
    }

    /// The number of registered tags.
    pub fn len(&self) -> usize {
        self.decoders.iter().filter(|d| d.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes a whole packet, dispatching on its leading tag.
    pub fn decode(&self, bytes: &[u8]) -> Result<P, PacketError> {
        let tag = *bytes.first().ok_or(PacketError::Empty)?;
        let decoder = self.decoders[tag as usize].ok_or(PacketError::UnknownTag(tag))?;
        let mut buf = ByteReader::new(bytes);
        buf.read_u8()?;
        Ok(decoder(&mut buf)?)
    }
}

impl<P: Writer> Catalogue<P> {
    pub fn encode(&self, packet: &P) -> Result<Vec<u8>, EncodeError> {
        packet.write_to_bytes()
    }
}

impl<P> Clone for Catalogue<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            decoders: self.decoders,
        }
    }
}

impl<P> fmt::Debug for Catalogue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<String> = (0..=255u8)
            .filter(|tag| self.contains(*tag))
            .map(|tag| format!("{:#04x}", tag))
            .collect();
        f.debug_struct("Catalogue")
            .field("name", &self.name)
            .field("tags", &tags)
            .finish()
    }
}

/// Declares a closed enum of packets, one variant per tag.
///
/// Every variant wraps a type implementing [`Reader`] and [`Writer`], usually
/// declared with [`record!`](crate::record). The macro generates:
/// - `tag()`, the tag byte of a packet.
/// - `catalogue()`, a fresh [`Catalogue`] of every variant.
/// - `Reader` and `Writer` for the enum, the tag byte followed by the body.
/// - `From<Body>` for the enum.
///
/// ```rust ignore
/// packets! {
///     pub enum OnlinePacket: "online" {
///         ConnectedPing(ConnectedPing) = 0x00,
///         ConnectedPong(ConnectedPong) = 0x03,
///     }
/// }
/// ```
#[macro_export]
macro_rules! packets {
    (
        $(#[$meta: meta])*
        $vis: vis enum $name: ident: $label: literal {
            $($variant: ident($body: ty) = $tag: literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis enum $name {
            $($variant($body)),*
        }

        impl $name {
            /// The tag byte this packet is written with.
            pub fn tag(&self) -> u8 {
                match self {
                    $(Self::$variant(_) => $tag),*
                }
            }

            /// Builds the dispatch table of every packet in this enum.
            pub fn catalogue() -> $crate::protocol::packet::Catalogue<Self> {
                $crate::protocol::packet::Catalogue::new($label)
                $(
                    .register($tag, |buf| {
                        Ok(Self::$variant(<$body as $crate::codec::Reader>::read(buf)?))
                    })
                )*
            }
        }

        impl $crate::codec::Reader for $name {
            fn read(
                buf: &mut $crate::codec::ByteReader<'_>,
            ) -> ::std::result::Result<Self, $crate::error::DecodeError> {
                let offset = buf.position();
                match buf.read_u8()? {
                    $($tag => Ok(Self::$variant(buf.read_type::<$body>()?)),)*
                    tag => Err($crate::error::DecodeError::new(
                        offset,
                        $crate::error::DecodeErrorKind::UnknownTag(tag as u64),
                    )),
                }
            }
        }

        impl $crate::codec::Writer for $name {
            fn write(
                &self,
                buf: &mut $crate::codec::ByteWriter,
            ) -> ::std::result::Result<(), $crate::error::EncodeError> {
                buf.write_u8(self.tag());
                match self {
                    $(Self::$variant(packet) => buf.write_type(packet)),*
                }
            }
        }

        $(
            impl From<$body> for $name {
                fn from(packet: $body) -> Self {
                    Self::$variant(packet)
                }
            }
        )*
    };
}

/// A decoded datagram. Datagrams of an established session are frame sets
/// and acknowledgements, everything else is an offline packet.
#[derive(Debug, Clone, PartialEq)]
pub enum RakPacket {
    FrameSet(FrameSet),
    Ack(Ack),
    Nack(Ack),
    Offline(OfflinePacket),
}

impl RakPacket {
    /// Decodes a datagram, looking offline packets up in `offline`.
    pub fn decode(bytes: &[u8], offline: &Catalogue<OfflinePacket>) -> Result<Self, PacketError> {
        let tag = *bytes.first().ok_or(PacketError::Empty)?;
        match tag {
            tag if FrameSet::is_frame_set(tag) => Ok(RakPacket::FrameSet(FrameSet::read_from_slice(bytes)?)),
            ACK => Ok(RakPacket::Ack(Ack::read_from_slice(bytes)?)),
            NACK => Ok(RakPacket::Nack(Ack::read_from_slice(bytes)?)),
            _ => offline.decode(bytes).map(RakPacket::Offline),
        }
    }

    pub fn is_online(&self) -> bool {
        !matches!(self, RakPacket::Offline(_))
    }

    pub fn get_offline(&self) -> Option<&OfflinePacket> {
        match self {
            RakPacket::Offline(packet) => Some(packet),
            _ => None,
        }
    }
}

impl Writer for RakPacket {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        match self {
            RakPacket::FrameSet(set) => set.write(buf),
            RakPacket::Ack(ack) | RakPacket::Nack(ack) => ack.write(buf),
            RakPacket::Offline(packet) => packet.write(buf),
        }
    }
}

impl From<OfflinePacket> for RakPacket {
    fn from(packet: OfflinePacket) -> Self {
        RakPacket::Offline(packet)
    }
}

impl From<FrameSet> for RakPacket {
    fn from(set: FrameSet) -> Self {
        RakPacket::FrameSet(set)
    }
}

impl From<Ack> for RakPacket {
    fn from(ack: Ack) -> Self {
        if ack.is_nack() {
            RakPacket::Nack(ack)
        } else {
            RakPacket::Ack(ack)
        }
    }
}
