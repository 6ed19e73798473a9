//! This is the server implementation of RakNet.
//!
//! The protocol itself lives in [`Server`], a sans-IO state machine: datagrams
//! are fed in with [`Server::on_datagram`], time moves forward with
//! [`Server::tick`], and whatever has to go out is taken from
//! [`Server::poll_transmit`] and [`Server::poll_event`]. The async
//! [`Listener`] drives a `Server` over a UDP socket.
//!
//! ```rust ignore
//! use std::time::Instant;
//! use rak_transport::{Config, Server};
//!
//! let mut server = Server::new(Config::default(), Instant::now());
//! server.on_datagram(&datagram, origin, Instant::now());
//! while let Some(transmit) = server.poll_transmit() {
//!     socket.send_to(&transmit.payload, transmit.address)?;
//! }
//! ```
pub mod event;
pub mod listener;

pub use self::event::{DisconnectReason, Event};
pub use self::listener::{BindAddr, Listener};

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Instant;

use crate::config::Config;
use crate::connection::state::ConnectionState;
use crate::connection::{Context, Session};
use crate::error::ConnectionError;
use crate::protocol::mcpe::{Batch, Motd};
use crate::protocol::packet::offline::{
    IncompatibleProtocolVersion, OfflinePacket, OpenConnectReply, OpenConnectRequest,
    SessionInfoReply, SessionInfoRequest, UnconnectedPong,
};
use crate::protocol::packet::online::OnlinePacket;
use crate::protocol::packet::{Catalogue, RakPacket};
use crate::protocol::reliability::Reliability;
use crate::protocol::{Magic, MIN_MTU};
use crate::util::to_address_token;
use crate::{rak_debug, rak_debug_buffers};

/// A datagram the server wants sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    pub address: SocketAddr,
    pub payload: Vec<u8>,
}

/// The RakNet server state machine, one [`Session`] per remote address.
///
/// Nothing in here blocks or reads the clock: every call takes the current
/// [`Instant`], and output is queued until polled.
#[derive(Debug)]
pub struct Server {
    config: Config,
    guid: u64,
    /// Wire timestamps are milliseconds since this instant.
    epoch: Instant,
    offline: Catalogue<OfflinePacket>,
    online: Catalogue<OnlinePacket>,
    advertisement: String,
    sessions: HashMap<SocketAddr, Session>,
    transmits: VecDeque<Transmit>,
    events: VecDeque<Event>,
}

impl Server {
    /// Creates a server with a random guid.
    pub fn new(config: Config, now: Instant) -> Self {
        Self::with_guid(config, rand::random(), now)
    }

    pub fn with_guid(config: Config, guid: u64, now: Instant) -> Self {
        let advertisement = config
            .advertisement
            .clone()
            .unwrap_or_else(|| Motd::new(guid, "19132").write());
        Self {
            config,
            guid,
            epoch: now,
            offline: OfflinePacket::catalogue(),
            online: OnlinePacket::catalogue(),
            advertisement,
            sessions: HashMap::new(),
            transmits: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    pub fn guid(&self) -> u64 {
        self.guid
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The server-id string answered to unconnected pings.
    pub fn advertisement(&self) -> &str {
        &self.advertisement
    }

    pub fn set_advertisement<S: Into<String>>(&mut self, advertisement: S) {
        self.advertisement = advertisement.into();
    }

    /// The state of the session for `address`, [`ConnectionState::Uninitialized`]
    /// when there is none.
    pub fn session_state(&self, address: SocketAddr) -> ConnectionState {
        self.sessions
            .get(&address)
            .map_or(ConnectionState::Uninitialized, Session::state)
    }

    pub fn session(&self, address: SocketAddr) -> Option<&Session> {
        self.sessions.get(&address)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Handles one datagram received from `origin`. Malformed datagrams and
    /// packets that do not fit the state of the session are dropped.
    pub fn on_datagram(&mut self, bytes: &[u8], origin: SocketAddr, now: Instant) {
        rak_debug_buffers!(
            "[{}] Received {} bytes\n{:?}\n",
            to_address_token(origin),
            bytes.len(),
            bytes
        );

        let packet = match RakPacket::decode(bytes, &self.offline) {
            Ok(packet) => packet,
            Err(e) => {
                rak_debug!(
                    true,
                    "[{}] Dropping malformed datagram: {}",
                    to_address_token(origin),
                    e
                );
                return;
            }
        };

        if let RakPacket::Offline(packet) = packet {
            self.handle_offline(packet, origin, now);
            return;
        }

        let mut ctx = Context {
            config: &self.config,
            online: &self.online,
            epoch: self.epoch,
            transmits: &mut self.transmits,
            events: &mut self.events,
        };
        let Some(session) = self.sessions.get_mut(&origin) else {
            rak_debug!(
                true,
                "[{}] Dropping online packet from an unknown peer",
                to_address_token(origin)
            );
            return;
        };

        match packet {
            RakPacket::FrameSet(set) => session.handle_frame_set(set, &mut ctx, now),
            RakPacket::Ack(ack) | RakPacket::Nack(ack) => session.handle_ack(&ack, &mut ctx, now),
            RakPacket::Offline(_) => {}
        }
        self.reap();
    }

    fn handle_offline(&mut self, packet: OfflinePacket, origin: SocketAddr, now: Instant) {
        match packet {
            OfflinePacket::UnconnectedPing(ping) => {
                self.reply_pong(ping.time, origin);
            }
            OfflinePacket::UnconnectedPingOpenConnections(ping) => {
                self.reply_pong(ping.time, origin);
            }
            OfflinePacket::OpenConnectRequest(request) => {
                self.handle_open_connect(request, origin, now);
            }
            OfflinePacket::SessionInfoRequest(request) => {
                self.handle_session_info(request, origin, now);
            }
            packet => {
                rak_debug!(
                    "[{}] Received invalid packet! {:?} is not sent to servers",
                    to_address_token(origin),
                    packet
                );
            }
        }
    }

    fn reply_pong(&mut self, time: u64, origin: SocketAddr) {
        let pong = UnconnectedPong {
            time,
            server_guid: self.guid,
            magic: Magic::new(),
            server_id: self.advertisement.clone(),
        };
        self.transmit_offline(pong.into(), origin);
    }

    fn negotiate_mtu(&self, requested: u16) -> u16 {
        requested.min(self.config.max_mtu).max(MIN_MTU)
    }

    fn handle_open_connect(&mut self, request: OpenConnectRequest, origin: SocketAddr, now: Instant) {
        if !self.config.protocol_versions.contains(&request.protocol) {
            rak_debug!(
                "[{}] Sent ({}) which is invalid RakNet protocol. Version is incompatible with server.",
                to_address_token(origin),
                request.protocol
            );
            let reply = IncompatibleProtocolVersion {
                protocol: self
                    .config
                    .protocol_versions
                    .iter()
                    .copied()
                    .max()
                    .unwrap_or(request.protocol),
                magic: Magic::new(),
                server_guid: self.guid,
            };
            self.transmit_offline(reply.into(), origin);
            return;
        }

        let mtu = self.negotiate_mtu(request.mtu_size);
        rak_debug!(
            true,
            "[{}] Client requested Mtu Size: {}, offering {}",
            to_address_token(origin),
            request.mtu_size,
            mtu
        );

        match self.sessions.get_mut(&origin) {
            None => {
                rak_debug!(true, "[{}] Creating new session", to_address_token(origin));
                self.sessions
                    .insert(origin, Session::new(origin, mtu, &self.config, now));
            }
            Some(session) if session.state().is_handshaking() => {
                session.update_handshake(mtu, None, now);
            }
            Some(session) => {
                rak_debug!(
                    "[{}] Ignoring OpenConnectRequest in state {}",
                    to_address_token(origin),
                    session.state()
                );
                return;
            }
        }

        let reply = OpenConnectReply {
            magic: Magic::new(),
            server_guid: self.guid,
            security: false,
            mtu_size: mtu,
        };
        self.transmit_offline(reply.into(), origin);
    }

    fn handle_session_info(&mut self, request: SessionInfoRequest, origin: SocketAddr, now: Instant) {
        let mtu = self.negotiate_mtu(request.mtu_size);
        match self.sessions.get_mut(&origin) {
            Some(session) if session.state().is_handshaking() => {
                let mtu = mtu.min(session.mtu());
                session.update_handshake(mtu, Some(request.client_guid), now);
                rak_debug!(
                    true,
                    "[{}] Updated mtu size to {}",
                    to_address_token(origin),
                    mtu
                );
                let reply = SessionInfoReply {
                    magic: Magic::new(),
                    server_guid: self.guid,
                    client_address: origin,
                    mtu_size: mtu,
                    security: false,
                };
                self.transmit_offline(reply.into(), origin);
            }
            session => {
                rak_debug!(
                    "[{}] Ignoring SessionInfoRequest in state {}",
                    to_address_token(origin),
                    session.map_or(ConnectionState::Uninitialized, |s| s.state())
                );
            }
        }
    }

    fn transmit_offline(&mut self, packet: OfflinePacket, address: SocketAddr) {
        match self.offline.encode(&packet) {
            Ok(payload) => self.transmits.push_back(Transmit { address, payload }),
            Err(e) => rak_debug!(
                "[{}] Failed to encode {:?}: {}",
                to_address_token(address),
                packet,
                e
            ),
        }
    }

    /// Advances every session to `now`: resends, acknowledgements, pings and
    /// timeouts.
    pub fn tick(&mut self, now: Instant) {
        let mut ctx = Context {
            config: &self.config,
            online: &self.online,
            epoch: self.epoch,
            transmits: &mut self.transmits,
            events: &mut self.events,
        };
        for session in self.sessions.values_mut() {
            session.tick(&mut ctx, now);
        }
        self.reap();
    }

    /// Drops every closed session, telling the application about those it had
    /// been told were connected.
    fn reap(&mut self) {
        let events = &mut self.events;
        self.sessions.retain(|address, session| {
            let Some(reason) = session.closed_reason() else {
                return true;
            };
            rak_debug!(
                true,
                "[{}] Removing session: {}",
                to_address_token(*address),
                reason
            );
            if session.is_confirmed() {
                events.push_back(Event::Disconnected {
                    address: *address,
                    reason,
                });
            }
            false
        });
    }

    /// Queues an application payload for `address`. It goes out on the next
    /// [`Server::tick`]. Sessions still in their handshake refuse payloads.
    pub fn send(
        &mut self,
        address: SocketAddr,
        payload: &[u8],
        reliability: Reliability,
        channel: u8,
        now: Instant,
    ) -> Result<(), ConnectionError> {
        let session = self
            .sessions
            .get_mut(&address)
            .ok_or(ConnectionError::SessionNotFound(address))?;
        if !session.is_confirmed() {
            return Err(ConnectionError::NotConnected(address));
        }
        session.send(payload, reliability, channel, now)?;
        Ok(())
    }

    /// Wraps `payloads` in one [`Batch`] and queues it for `address`.
    pub fn send_batch(
        &mut self,
        address: SocketAddr,
        payloads: Vec<Vec<u8>>,
        reliability: Reliability,
        channel: u8,
        now: Instant,
    ) -> Result<(), ConnectionError> {
        if !self.sessions.contains_key(&address) {
            return Err(ConnectionError::SessionNotFound(address));
        }
        let batch = Batch::new(payloads).encode(self.config.compression_threshold)?;
        self.send(address, &batch, reliability, channel, now)
    }

    /// Closes the session of `address` with a `Disconnect`, dropping whatever
    /// it still had queued. The session is removed right away.
    pub fn close(&mut self, address: SocketAddr, now: Instant) -> Result<(), ConnectionError> {
        let mut ctx = Context {
            config: &self.config,
            online: &self.online,
            epoch: self.epoch,
            transmits: &mut self.transmits,
            events: &mut self.events,
        };
        let session = self
            .sessions
            .get_mut(&address)
            .ok_or(ConnectionError::SessionNotFound(address))?;
        session.close(DisconnectReason::LocalClose, &mut ctx, now);
        self.reap();
        Ok(())
    }

    /// Closes every session.
    pub fn close_all(&mut self, now: Instant) {
        let addresses: Vec<SocketAddr> = self.sessions.keys().copied().collect();
        for address in addresses {
            let _ = self.close(address, now);
        }
    }

    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.transmits.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Writer;
    use crate::protocol::packet::offline::UnconnectedPing;

    fn client() -> SocketAddr {
        "10.0.0.2:50000".parse().unwrap()
    }

    fn offline(server: &mut Server, packet: OfflinePacket, now: Instant) -> OfflinePacket {
        server.on_datagram(&packet.write_to_bytes().unwrap(), client(), now);
        let transmit = server.poll_transmit().expect("no reply");
        assert_eq!(transmit.address, client());
        server.offline.decode(&transmit.payload).unwrap()
    }

    #[test]
    fn pings_do_not_create_sessions() {
        let now = Instant::now();
        let mut server = Server::with_guid(Config::default().with_advertisement("ad"), 3, now);
        let ping = UnconnectedPing {
            time: 9,
            magic: Magic::new(),
            client_guid: 1,
        };
        match offline(&mut server, ping.into(), now) {
            OfflinePacket::UnconnectedPong(pong) => {
                assert_eq!(pong.time, 9);
                assert_eq!(pong.server_guid, 3);
                assert_eq!(pong.server_id, "ad");
            }
            other => panic!("unexpected reply {:?}", other),
        }
        assert_eq!(server.session_count(), 0);
    }

    #[test]
    fn default_advertisement_is_a_motd() {
        let server = Server::with_guid(Config::default(), 77, Instant::now());
        let motd: Motd = server.advertisement().parse().unwrap();
        assert_eq!(motd.server_guid, 77);
    }

    #[test]
    fn unsupported_protocols_are_refused() {
        let now = Instant::now();
        let mut server = Server::with_guid(Config::default(), 3, now);
        let request = OpenConnectRequest {
            protocol: 6,
            mtu_size: 1400,
        };
        match offline(&mut server, request.into(), now) {
            OfflinePacket::IncompatibleProtocolVersion(reply) => {
                assert_eq!(reply.protocol, 11);
                assert_eq!(reply.server_guid, 3);
            }
            other => panic!("unexpected reply {:?}", other),
        }
        assert_eq!(server.session_state(client()), ConnectionState::Uninitialized);
    }

    #[test]
    fn mtu_is_clamped() {
        let now = Instant::now();
        let mut server = Server::new(Config::default().with_max_mtu(1200), now);
        let request = OpenConnectRequest {
            protocol: 11,
            mtu_size: 1492,
        };
        match offline(&mut server, request.into(), now) {
            OfflinePacket::OpenConnectReply(reply) => assert_eq!(reply.mtu_size, 1200),
            other => panic!("unexpected reply {:?}", other),
        }
        assert_eq!(server.session(client()).unwrap().mtu(), 1200);
    }

    #[test]
    fn session_info_without_session_is_ignored() {
        let now = Instant::now();
        let mut server = Server::new(Config::default(), now);
        let request = SessionInfoRequest {
            magic: Magic::new(),
            server_address: "10.0.0.1:19132".parse().unwrap(),
            mtu_size: 1400,
            client_guid: 5,
        };
        server.on_datagram(
            &OfflinePacket::from(request).write_to_bytes().unwrap(),
            client(),
            now,
        );
        assert!(server.poll_transmit().is_none());
        assert_eq!(server.session_count(), 0);
    }

    #[test]
    fn unknown_sessions_are_reported() {
        let now = Instant::now();
        let mut server = Server::new(Config::default(), now);
        assert!(matches!(
            server.send(client(), &[1], Reliability::Reliable, 0, now),
            Err(ConnectionError::SessionNotFound(_))
        ));
        assert!(matches!(
            server.close(client(), now),
            Err(ConnectionError::SessionNotFound(_))
        ));
    }

    #[test]
    fn handshaking_sessions_refuse_payloads() {
        let now = Instant::now();
        let mut server = Server::new(Config::default(), now);
        let request = OpenConnectRequest {
            protocol: 11,
            mtu_size: 1400,
        };
        offline(&mut server, request.into(), now);
        assert!(matches!(
            server.send(client(), &[0x42], Reliability::Reliable, 0, now),
            Err(ConnectionError::NotConnected(_))
        ));
        assert!(matches!(
            server.send_batch(client(), vec![vec![1]], Reliability::Reliable, 0, now),
            Err(ConnectionError::NotConnected(_))
        ));
        server.tick(now);
        assert!(server.poll_transmit().is_none());
    }

    #[test]
    fn garbage_is_dropped() {
        let now = Instant::now();
        let mut server = Server::new(Config::default(), now);
        server.on_datagram(&[], client(), now);
        server.on_datagram(&[0x05, 0x00], client(), now);
        server.on_datagram(&[0x84, 0x00], client(), now);
        assert!(server.poll_transmit().is_none());
        assert!(server.poll_event().is_none());
    }
}
