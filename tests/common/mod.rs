#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Instant;

use rak_transport::codec::Writer;
use rak_transport::protocol::frame::{Frame, FrameSet};
use rak_transport::protocol::packet::offline::{
    OfflinePacket, OpenConnectRequest, SessionInfoRequest,
};
use rak_transport::protocol::packet::online::{
    internal_addresses, ConnectionRequest, NewConnection, OnlinePacket,
};
use rak_transport::protocol::packet::{Catalogue, RakPacket};
use rak_transport::protocol::Magic;
use rak_transport::{ConnectionState, Event, Reliability, Server};

/// A hand driven RakNet client talking to a [`Server`] in memory.
pub struct TestClient {
    pub address: SocketAddr,
    pub guid: u64,
    sequence: u32,
    reliable: u32,
    offline: Catalogue<OfflinePacket>,
    online: Catalogue<OnlinePacket>,
}

impl TestClient {
    pub fn new(address: &str, guid: u64) -> Self {
        Self {
            address: address.parse().unwrap(),
            guid,
            sequence: 0,
            reliable: 0,
            offline: OfflinePacket::catalogue(),
            online: OnlinePacket::catalogue(),
        }
    }

    pub fn server_address() -> SocketAddr {
        "10.0.0.1:19132".parse().unwrap()
    }

    /// Sends an offline packet, returning the server's reply, if any.
    pub fn offline(
        &self,
        server: &mut Server,
        packet: OfflinePacket,
        now: Instant,
    ) -> Option<OfflinePacket> {
        server.on_datagram(&packet.write_to_bytes().unwrap(), self.address, now);
        let transmit = server.poll_transmit()?;
        assert_eq!(transmit.address, self.address);
        Some(self.offline.decode(&transmit.payload).unwrap())
    }

    /// The sequence number the next frame set goes out with.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Sends `frames` in one frame set under the next sequence number.
    pub fn send_frames(&mut self, server: &mut Server, frames: Vec<Frame>, now: Instant) -> u32 {
        let sequence = self.sequence;
        self.sequence += 1;
        let set = FrameSet::new(sequence, frames);
        server.on_datagram(&set.write_to_bytes().unwrap(), self.address, now);
        sequence
    }

    /// A reliable frame carrying `body` with the next reliable index.
    pub fn reliable_frame(&mut self, reliability: Reliability, body: Vec<u8>) -> Frame {
        let mut frame = Frame::new(reliability, body);
        frame.reliable_index = Some(self.reliable);
        self.reliable += 1;
        frame
    }

    pub fn send_reliable(&mut self, server: &mut Server, body: Vec<u8>, now: Instant) {
        let frame = self.reliable_frame(Reliability::Reliable, body);
        self.send_frames(server, vec![frame], now);
    }

    pub fn send_online(&mut self, server: &mut Server, packet: OnlinePacket, now: Instant) {
        self.send_reliable(server, packet.write_to_bytes().unwrap(), now);
    }

    /// Every datagram the server queued, decoded.
    pub fn drain(&self, server: &mut Server) -> Vec<RakPacket> {
        let mut packets = Vec::new();
        while let Some(transmit) = server.poll_transmit() {
            assert_eq!(transmit.address, self.address);
            packets.push(RakPacket::decode(&transmit.payload, &self.offline).unwrap());
        }
        packets
    }

    /// The frames of every frame set in `packets`.
    pub fn frames(packets: &[RakPacket]) -> Vec<Frame> {
        packets
            .iter()
            .filter_map(|packet| match packet {
                RakPacket::FrameSet(set) => Some(set.frames.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// The online packets carried by `packets`, skipping application payloads.
    pub fn online_packets(&self, packets: &[RakPacket]) -> Vec<OnlinePacket> {
        Self::frames(packets)
            .iter()
            .filter_map(|frame| self.online.decode(&frame.body).ok())
            .collect()
    }

    /// Runs the whole handshake, leaving a confirmed session behind.
    pub fn connect(&mut self, server: &mut Server, now: Instant) {
        let request = OpenConnectRequest {
            protocol: 11,
            mtu_size: 1400,
        };
        assert!(matches!(
            self.offline(server, request.into(), now),
            Some(OfflinePacket::OpenConnectReply(_))
        ));
        let request = SessionInfoRequest {
            magic: Magic::new(),
            server_address: Self::server_address(),
            mtu_size: 1400,
            client_guid: self.guid,
        };
        assert!(matches!(
            self.offline(server, request.into(), now),
            Some(OfflinePacket::SessionInfoReply(_))
        ));

        let request = ConnectionRequest {
            client_guid: self.guid,
            time: 100,
            security: false,
        };
        self.send_online(server, request.into(), now);
        assert_eq!(server.session_state(self.address), ConnectionState::Connected);

        let confirm = NewConnection {
            server_address: Self::server_address(),
            internal_addresses: internal_addresses(),
            request_time: 0,
            time: 100,
        };
        self.send_online(server, confirm.into(), now);
        assert_eq!(
            server.poll_event(),
            Some(Event::Connected {
                address: self.address,
                guid: self.guid,
            })
        );
        server.tick(now);
        self.drain(server);
    }
}
