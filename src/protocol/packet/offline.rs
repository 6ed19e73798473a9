//! Offline packets are packets that are sent before a connection is established.
//! In rak-transport, these packets consist of:
//! - [`UnconnectedPing`]
//! - [`UnconnectedPingOpenConnections`]
//! - [`UnconnectedPong`]
//! - [`OpenConnectRequest`]
//! - [`OpenConnectReply`]
//! - [`SessionInfoRequest`]
//! - [`SessionInfoReply`]
//! - [`IncompatibleProtocolVersion`]
//!
//! During this stage, the client and server are exchanging information about each other, such as
//! the server id, the client id, the mtu size, etc, to prepare for the connection handshake.
use std::net::SocketAddr;

use crate::codec::{ByteReader, ByteWriter, Reader, Writer};
use crate::error::codec::{DecodeError, EncodeError};
use crate::protocol::{Magic, UDP_HEADER_SIZE};
use crate::{packets, record};

packets! {
    /// This is an enum of all offline packets.
    pub enum OfflinePacket: "offline" {
        UnconnectedPing(UnconnectedPing) = 0x01,
        UnconnectedPingOpenConnections(UnconnectedPingOpenConnections) = 0x02,
        UnconnectedPong(UnconnectedPong) = 0x1c,
        OpenConnectRequest(OpenConnectRequest) = 0x05,
        OpenConnectReply(OpenConnectReply) = 0x06,
        SessionInfoRequest(SessionInfoRequest) = 0x07,
        SessionInfoReply(SessionInfoReply) = 0x08,
        IncompatibleProtocolVersion(IncompatibleProtocolVersion) = 0x19,
    }
}

record! {
    /// Send to the other peer expecting a [`UnconnectedPong`] packet,
    /// this is used to determine the latency between the client and the server,
    /// and to determine if the server is online.
    pub struct UnconnectedPing {
        pub time: u64,
        pub magic: Magic,
        pub client_guid: u64,
    }
}

record! {
    /// An [`UnconnectedPing`] that should only be answered by servers with
    /// open connection slots.
    pub struct UnconnectedPingOpenConnections {
        pub time: u64,
        pub magic: Magic,
        pub client_guid: u64,
    }
}

record! {
    /// Sent in response to a [`UnconnectedPing`] packet.
    /// The `server_id` is the advertisement string of the server, for MCPE
    /// servers a [`Motd`](crate::protocol::mcpe::motd::Motd).
    pub struct UnconnectedPong {
        pub time: u64,
        pub server_guid: u64,
        pub magic: Magic,
        pub server_id: String,
    }
}

/// This packet is sent by the peer to a server to request a connection.
/// It contains the protocol version and, through its padding, the MTU the
/// peer would like to use.
///
/// The packet is padded with zeros so that the datagram, including the IP
/// and UDP headers, is `mtu_size` long.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenConnectRequest {
    pub protocol: u8,
    pub mtu_size: u16,
}

impl Reader for OpenConnectRequest {
    fn read(buf: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        buf.read_field::<Magic>("magic")?;
        let protocol = buf.read_field::<u8>("protocol")?;
        buf.take_rest();
        let len = buf.len().min(u16::MAX as usize) as u16;
        Ok(OpenConnectRequest {
            protocol,
            mtu_size: len.saturating_add(UDP_HEADER_SIZE),
        })
    }
}

impl Writer for OpenConnectRequest {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), EncodeError> {
        // the tag has already been written by the enclosing packet
        let start = buf.len().saturating_sub(1);
        Magic.write(buf)?;
        buf.write_u8(self.protocol);
        let target = self.mtu_size.saturating_sub(UDP_HEADER_SIZE) as usize;
        let written = buf.len() - start;
        if target > written {
            buf.pad(target - written);
        }
        Ok(())
    }
}

record! {
    /// This packet is sent in response to a [`OpenConnectRequest`] packet, and confirms
    /// the MTU the server is willing to use.
    pub struct OpenConnectReply {
        pub magic: Magic,
        pub server_guid: u64,
        pub security: bool,
        pub mtu_size: u16,
    }
}

record! {
    /// This packet is sent after receiving a [`OpenConnectReply`] packet, and confirms
    /// that the peer wishes to proceed with the connection.
    pub struct SessionInfoRequest {
        pub magic: Magic,
        /// The address of the server, as seen by the peer.
        pub server_address: SocketAddr,
        pub mtu_size: u16,
        pub client_guid: u64,
    }
}

record! {
    /// This packet is sent in response to a [`SessionInfoRequest`] packet, and specifies
    /// the external address of the peer.
    pub struct SessionInfoReply {
        pub magic: Magic,
        pub server_guid: u64,
        pub client_address: SocketAddr,
        pub mtu_size: u16,
        pub security: bool,
    }
}

record! {
    /// This packet is sent by the server to indicate that the server does not support the
    /// protocol version of the client.
    pub struct IncompatibleProtocolVersion {
        pub protocol: u8,
        pub magic: Magic,
        pub server_guid: u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_connect_request_is_padded_to_the_mtu() {
        let packet = OfflinePacket::from(OpenConnectRequest {
            protocol: 11,
            mtu_size: 1492,
        });
        let bytes = packet.write_to_bytes().unwrap();
        assert_eq!(bytes.len(), 1492 - 28);
        assert_eq!(bytes[0], 0x05);
        assert_eq!(bytes[17], 11);
        assert!(bytes[18..].iter().all(|b| *b == 0));
        assert_eq!(OfflinePacket::read_from_slice(&bytes).unwrap(), packet);
    }

    #[test]
    fn pong_carries_guid_and_server_id() {
        let pong = OfflinePacket::from(UnconnectedPong {
            time: 5,
            server_guid: 0xdead_beef,
            magic: Magic,
            server_id: "MCPE;rak".into(),
        });
        let bytes = pong.write_to_bytes().unwrap();
        assert_eq!(bytes[0], 0x1c);
        assert_eq!(&bytes[9..17], &0xdead_beefu64.to_be_bytes());
        assert_eq!(OfflinePacket::catalogue().decode(&bytes).unwrap(), pong);
    }
}
