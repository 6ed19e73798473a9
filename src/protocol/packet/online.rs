//! Online packets are packets that are sent when the client is connected to the server
//! and are used to keep the connection alive, and to complete the connection handshake.
//!
//! The following module provides the following packets:
//! - [`ConnectedPing`]
//! - [`ConnectedPong`]
//! - [`ConnectionRequest`]
//! - [`ConnectionAccept`]
//! - [`NewConnection`]
//! - [`Disconnect`]
//!
//! Any other tag inside a frame belongs to the application.
use std::net::{Ipv4Addr, SocketAddr};

use crate::{packets, record};

/// The number of internal addresses exchanged during the handshake.
pub const INTERNAL_ADDRESSES: usize = 20;

packets! {
    /// An enum of all Online packets.
    pub enum OnlinePacket: "online" {
        ConnectedPing(ConnectedPing) = 0x00,
        ConnectedPong(ConnectedPong) = 0x03,
        ConnectionRequest(ConnectionRequest) = 0x09,
        ConnectionAccept(ConnectionAccept) = 0x10,
        NewConnection(NewConnection) = 0x13,
        Disconnect(Disconnect) = 0x15,
    }
}

record! {
    /// This packet is sent by either the client or the server to the other peer.
    /// The other peer should respond with a [`ConnectedPong`] packet. The server
    /// sends one every [`Config::ping_interval`](crate::config::Config) to keep the
    /// connection alive.
    pub struct ConnectedPing {
        /// The time you sent the packet to the peer.
        pub time: u64,
    }
}

record! {
    /// Sent in response to a [`ConnectedPing`] packet.
    pub struct ConnectedPong {
        /// The time that the peer sent the [`ConnectedPing`] packet.
        pub ping_time: u64,
        /// The time that you sent the [`ConnectedPong`] packet to the peer.
        pub pong_time: u64,
    }
}

record! {
    /// A connection Request, this contains information about the client. Like it's
    /// current time and the client id.
    pub struct ConnectionRequest {
        pub client_guid: u64,
        pub time: u64,
        pub security: bool,
    }
}

record! {
    /// A connection Accept packet, this is sent by the server to the client.
    pub struct ConnectionAccept {
        /// The address of the client, as seen by the server.
        pub client_address: SocketAddr,
        pub system_index: u16,
        /// Alternative addresses of the server.
        pub internal_addresses: [SocketAddr; INTERNAL_ADDRESSES],
        /// The time of the timestamp the client sent with `ConnectionRequest`.
        pub request_time: u64,
        /// The time on the server.
        pub time: u64,
    }
}

record! {
    /// Sent by the client once it received [`ConnectionAccept`], after which
    /// the session carries application traffic.
    pub struct NewConnection {
        /// The address of the server, as seen by the client.
        pub server_address: SocketAddr,
        pub internal_addresses: [SocketAddr; INTERNAL_ADDRESSES],
        pub request_time: u64,
        pub time: u64,
    }
}

record! {
    /// A disconnect notification. Tells the peer to disconnect.
    pub struct Disconnect {}
}

/// The internal addresses the server advertises: loopback followed by
/// unspecified addresses.
pub fn internal_addresses() -> [SocketAddr; INTERNAL_ADDRESSES] {
    let mut addresses = [SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)); INTERNAL_ADDRESSES];
    addresses[0] = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    addresses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Reader, Writer};

    #[test]
    fn connection_accept_has_twenty_addresses() {
        let accept = OnlinePacket::from(ConnectionAccept {
            client_address: "10.0.0.2:5000".parse().unwrap(),
            system_index: 0,
            internal_addresses: internal_addresses(),
            request_time: 1,
            time: 2,
        });
        let bytes = accept.write_to_bytes().unwrap();
        // tag, address, index, 20 addresses, two timestamps
        assert_eq!(bytes.len(), 1 + 7 + 2 + 20 * 7 + 16);
        assert_eq!(OnlinePacket::read_from_slice(&bytes).unwrap(), accept);
    }

    #[test]
    fn disconnect_is_just_a_tag() {
        let bytes = OnlinePacket::from(Disconnect {}).write_to_bytes().unwrap();
        assert_eq!(bytes, vec![0x15]);
        assert_eq!(
            OnlinePacket::catalogue().decode(&bytes).unwrap(),
            OnlinePacket::Disconnect(Disconnect {})
        );
    }
}
