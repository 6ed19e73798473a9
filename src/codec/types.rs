//! Composite codecs: 24 bit integers, length-prefixed blocks, optional values,
//! fixed-size lists, enum-tagged values and socket addresses.
use std::marker::PhantomData;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};
use std::ops::Deref;

use byteorder::{ByteOrder, LittleEndian};

use super::{ByteReader, ByteWriter, Le, Reader, VarU32, Writer};
use crate::error::codec::{DecodeError, DecodeErrorKind, EncodeError};
use crate::util::U24_MAX;

/// A 24 bit little-endian unsigned integer, used by RakNet for sequence
/// numbers, reliable indices and order indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct U24(pub u32);

impl Reader for U24 {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(U24(LittleEndian::read_u24(buf.take(3)?)))
    }
}

impl Writer for U24 {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        if self.0 > U24_MAX {
            return Err(EncodeError::TooLong {
                len: self.0 as usize,
                max: U24_MAX as usize,
            });
        }
        let mut bytes = [0u8; 3];
        LittleEndian::write_u24(&mut bytes, self.0);
        buf.write_bytes(&bytes);
        Ok(())
    }
}

/// A codec usable as the length prefix of a block.
pub trait LengthPrefix: Reader + Writer {
    const MAX: usize;

    fn to_len(&self) -> usize;

    fn from_len(len: usize) -> Self;
}

impl LengthPrefix for u8 {
    const MAX: usize = u8::MAX as usize;

    fn to_len(&self) -> usize {
        *self as usize
    }

    fn from_len(len: usize) -> Self {
        len as u8
    }
}

impl LengthPrefix for u16 {
    const MAX: usize = u16::MAX as usize;

    fn to_len(&self) -> usize {
        *self as usize
    }

    fn from_len(len: usize) -> Self {
        len as u16
    }
}

impl LengthPrefix for u32 {
    const MAX: usize = u32::MAX as usize;

    fn to_len(&self) -> usize {
        *self as usize
    }

    fn from_len(len: usize) -> Self {
        len as u32
    }
}

impl LengthPrefix for VarU32 {
    const MAX: usize = u32::MAX as usize;

    fn to_len(&self) -> usize {
        self.0 as usize
    }

    fn from_len(len: usize) -> Self {
        VarU32(len as u32)
    }
}

fn read_prefixed<'a, L: LengthPrefix>(buf: &mut ByteReader<'a>) -> Result<&'a [u8], DecodeError> {
    let len = L::read(buf)?.to_len();
    buf.take(len)
}

fn write_prefixed<L: LengthPrefix>(buf: &mut ByteWriter, bytes: &[u8]) -> Result<(), EncodeError> {
    if bytes.len() > L::MAX {
        return Err(EncodeError::TooLong {
            len: bytes.len(),
            max: L::MAX,
        });
    }
    L::from_len(bytes.len()).write(buf)?;
    buf.write_bytes(bytes);
    Ok(())
}

/// A block of raw bytes prefixed with its length, encoded by `L`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Prefixed<L> {
    bytes: Vec<u8>,
    _len: PhantomData<fn() -> L>,
}

/// Bytes behind a big-endian `u16` length.
pub type ShortBytes = Prefixed<u16>;
/// Bytes behind a [`VarU32`] length.
pub type VarBytes = Prefixed<VarU32>;

impl<L> Prefixed<L> {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            _len: PhantomData,
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

impl<L> Deref for Prefixed<L> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<L> From<Vec<u8>> for Prefixed<L> {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl<L: LengthPrefix> Reader for Prefixed<L> {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self::new(read_prefixed::<L>(buf)?.to_vec()))
    }
}

impl<L: LengthPrefix> Writer for Prefixed<L> {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        write_prefixed::<L>(buf, &self.bytes)
    }
}

fn utf8(start: usize, bytes: &[u8]) -> Result<String, DecodeError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| DecodeError::new(start, DecodeErrorKind::InvalidUtf8))
}

/// Strings are prefixed with a big-endian `u16` length, as RakNet writes them.
impl Reader for String {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let start = buf.position();
        let bytes = read_prefixed::<u16>(buf)?;
        utf8(start, bytes)
    }
}

impl Writer for String {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        write_prefixed::<u16>(buf, self.as_bytes())
    }
}

/// A string prefixed with a [`VarU32`] length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VarString(pub String);

impl Reader for VarString {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let start = buf.position();
        let bytes = read_prefixed::<VarU32>(buf)?;
        utf8(start, bytes).map(VarString)
    }
}

impl Writer for VarString {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        write_prefixed::<VarU32>(buf, self.0.as_bytes())
    }
}

/// An optional value is a presence byte followed by the value itself.
impl<T: Reader> Reader for Option<T> {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        if bool::read(buf)? {
            Ok(Some(T::read(buf)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: Writer> Writer for Option<T> {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        match self {
            Some(value) => {
                true.write(buf)?;
                value.write(buf)
            }
            None => false.write(buf),
        }
    }
}

/// A fixed-size list is its `N` items back to back, with no length.
impl<T: Reader, const N: usize> Reader for [T; N] {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let start = buf.position();
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::read(buf)?);
        }
        items
            .try_into()
            .map_err(|_| DecodeError::new(start, DecodeErrorKind::Invalid("fixed-size list")))
    }
}

impl<T: Writer, const N: usize> Writer for [T; N] {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        for item in self.iter() {
            item.write(buf)?;
        }
        Ok(())
    }
}

/// Declares an enum whose variants are encoded as a fixed tag value.
///
/// ```rust ignore
/// tagged! {
///     pub enum AddressFamily: u8 {
///         V4 = 4,
///         V6 = 6,
///     }
/// }
/// ```
///
/// Decoding a tag that is not listed fails with
/// [`DecodeErrorKind::UnknownTag`](crate::error::DecodeErrorKind::UnknownTag).
#[macro_export]
macro_rules! tagged {
    (
        $(#[$meta: meta])*
        $vis: vis enum $name: ident: $tag: ty {
            $($(#[$vmeta: meta])* $variant: ident = $value: expr),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),*
        }

        impl $name {
            /// The tag this variant is encoded as.
            pub fn tag(&self) -> $tag {
                match self {
                    $(Self::$variant => $value),*
                }
            }
        }

        impl $crate::codec::Reader for $name {
            fn read(
                buf: &mut $crate::codec::ByteReader<'_>,
            ) -> ::std::result::Result<Self, $crate::error::DecodeError> {
                let offset = buf.position();
                let tag = <$tag as $crate::codec::Reader>::read(buf)?;
                $(
                    if tag == $value {
                        return Ok(Self::$variant);
                    }
                )*
                Err($crate::error::DecodeError::new(
                    offset,
                    $crate::error::DecodeErrorKind::UnknownTag(tag as u64),
                ))
            }
        }

        impl $crate::codec::Writer for $name {
            fn write(
                &self,
                buf: &mut $crate::codec::ByteWriter,
            ) -> ::std::result::Result<(), $crate::error::EncodeError> {
                $crate::codec::Writer::write(&self.tag(), buf)
            }
        }
    };
}

crate::tagged! {
    /// The version byte in front of every encoded socket address.
    pub enum AddressFamily: u8 {
        V4 = 4,
        V6 = 6,
    }
}

/// `AF_INET6` as RakNet writes it in front of IPv6 addresses.
const AF_INET6: u16 = 23;

/// IPv4 octets are written inverted, followed by the port. IPv6 addresses
/// follow the `sockaddr_in6` layout.
impl Reader for SocketAddr {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        match AddressFamily::read(buf)? {
            AddressFamily::V4 => {
                let octets = buf.read_array::<4>()?.map(|b| !b);
                let port = u16::read(buf)?;
                Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
            }
            AddressFamily::V6 => {
                let _family = Le::<u16>::read(buf)?;
                let port = u16::read(buf)?;
                let flow_info = u32::read(buf)?;
                let octets = buf.read_array::<16>()?;
                let scope_id = u32::read(buf)?;
                Ok(SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(octets),
                    port,
                    flow_info,
                    scope_id,
                )))
            }
        }
    }
}

impl Writer for SocketAddr {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        match self {
            SocketAddr::V4(addr) => {
                AddressFamily::V4.write(buf)?;
                buf.write_bytes(&addr.ip().octets().map(|b| !b));
                addr.port().write(buf)
            }
            SocketAddr::V6(addr) => {
                AddressFamily::V6.write(buf)?;
                Le(AF_INET6).write(buf)?;
                addr.port().write(buf)?;
                addr.flowinfo().write(buf)?;
                buf.write_bytes(&addr.ip().octets());
                addr.scope_id().write(buf)
            }
        }
    }
}
