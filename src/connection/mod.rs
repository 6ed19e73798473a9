//! Per-peer protocol state.
//!
//! A [`Session`] owns everything the server knows about one remote address:
//! its handshake progress, the send and receive queues and the acknowledgement
//! tracker. It never touches a socket, datagrams it wants sent are pushed into
//! the [`Context`] the [`Server`](crate::server::Server) lends it.
pub mod conn;
pub mod controller;
pub mod queue;
pub mod state;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Instant;

use crate::ack::{AckTracker, Ackable};
use crate::codec::Writer;
use crate::config::Config;
use crate::error::PacketError;
use crate::protocol::ack::Ack;
use crate::protocol::mcpe::{Batch, BATCH_ID};
use crate::protocol::frame::FrameSet;
use crate::protocol::packet::online::{
    internal_addresses, ConnectedPing, ConnectedPong, ConnectionAccept, ConnectionRequest,
    Disconnect, OnlinePacket,
};
use crate::protocol::packet::Catalogue;
use crate::protocol::reliability::Reliability;
use crate::rak_debug;
use crate::server::{DisconnectReason, Event, Transmit};
use crate::util::{elapsed, millis_since, to_address_token};

pub use self::conn::Connection;
pub use self::queue::{RecvQueue, SendQueue, SendQueueError};
pub use self::state::ConnectionState;

/// What a session borrows from its server while it handles a datagram or a
/// tick.
pub(crate) struct Context<'a> {
    pub config: &'a Config,
    pub online: &'a Catalogue<OnlinePacket>,
    /// The instant timestamps on the wire are measured from.
    pub epoch: Instant,
    pub transmits: &'a mut VecDeque<Transmit>,
    pub events: &'a mut VecDeque<Event>,
}

impl Context<'_> {
    fn transmit(&mut self, address: SocketAddr, payload: Vec<u8>) {
        self.transmits.push_back(Transmit { address, payload });
    }
}

/// The state of one remote peer.
#[derive(Debug)]
pub struct Session {
    address: SocketAddr,
    /// The client guid, known once `SessionInfoRequest` arrives.
    guid: u64,
    /// Set once `SessionInfoRequest` was answered, `ConnectionRequest` is
    /// ignored before that.
    identified: bool,
    state: ConnectionState,
    /// Set by `NewConnection`, from then on application payloads flow.
    confirmed: bool,
    closed: Option<DisconnectReason>,
    created: Instant,
    last_recv: Instant,
    last_ping: Instant,
    send_queue: SendQueue,
    recv_queue: RecvQueue,
    acks: AckTracker,
}

impl Session {
    /// Creates a session in the handshake, as done on the first
    /// `OpenConnectRequest` from `address`.
    pub fn new(address: SocketAddr, mtu: u16, config: &Config, now: Instant) -> Self {
        Self {
            address,
            guid: 0,
            identified: false,
            state: ConnectionState::Handshaking,
            confirmed: false,
            closed: None,
            created: now,
            last_recv: now,
            last_ping: now,
            send_queue: SendQueue::new(mtu, config.resend_interval),
            recv_queue: RecvQueue::new(),
            acks: AckTracker::new(),
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn guid(&self) -> u64 {
        self.guid
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mtu(&self) -> u16 {
        self.send_queue.mtu()
    }

    /// Whether the client completed the handshake with `NewConnection`.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// The reason the session ended, once it has.
    pub fn closed_reason(&self) -> Option<DisconnectReason> {
        self.closed
    }

    /// Applies the MTU agreed in one of the offline handshake packets.
    pub fn update_handshake(&mut self, mtu: u16, guid: Option<u64>, now: Instant) {
        self.send_queue.set_mtu(mtu);
        if let Some(guid) = guid {
            self.guid = guid;
            self.identified = true;
        }
        self.last_recv = now;
    }

    /// Handles an incoming frame set.
    pub(crate) fn handle_frame_set(&mut self, set: FrameSet, ctx: &mut Context<'_>, now: Instant) {
        if !self.state.is_available() {
            return;
        }
        self.last_recv = now;

        // left unacknowledged, the peer resends it once the window moved
        if !self.recv_queue.fits_window(&set.frames) {
            rak_debug!(
                true,
                "[{}] Frame set {} is ahead of the reliable window",
                to_address_token(self.address),
                set.sequence
            );
            return;
        }

        if !self.acks.record(set.sequence) {
            rak_debug!(
                true,
                "[{}] Dropping duplicate frame set {}",
                to_address_token(self.address),
                set.sequence
            );
            return;
        }

        for frame in set.frames {
            self.recv_queue.insert(frame, now);
        }
        for payload in self.recv_queue.flush() {
            self.handle_payload(payload, ctx, now);
            if self.state.is_closed() {
                break;
            }
        }
    }

    pub(crate) fn handle_ack(&mut self, ack: &Ack, ctx: &mut Context<'_>, now: Instant) {
        self.last_recv = now;
        if ack.is_nack() {
            for datagram in self.send_queue.nack(ack, now) {
                ctx.transmit(self.address, datagram);
            }
        } else {
            self.send_queue.ack(ack);
        }
    }

    fn handle_payload(&mut self, payload: Vec<u8>, ctx: &mut Context<'_>, now: Instant) {
        let packet = match ctx.online.decode(&payload) {
            Ok(packet) => packet,
            Err(PacketError::UnknownTag(tag)) => {
                if !self.state.is_connected() || !self.confirmed {
                    rak_debug!(
                        "[{}] Dropping application packet 0x{:02x} received before the connection was confirmed",
                        to_address_token(self.address),
                        tag
                    );
                } else if tag == BATCH_ID {
                    self.handle_batch(&payload, ctx);
                } else {
                    ctx.events.push_back(Event::Payload {
                        address: self.address,
                        payload,
                    });
                }
                return;
            }
            Err(e) => {
                rak_debug!(
                    "[{}] Dropping malformed online packet: {}",
                    to_address_token(self.address),
                    e
                );
                return;
            }
        };

        match packet {
            OnlinePacket::ConnectedPing(ping) => {
                let pong = ConnectedPong {
                    ping_time: ping.time,
                    pong_time: millis_since(ctx.epoch, now),
                };
                self.send_packet(pong.into(), Reliability::Unreliable, ctx, now);
            }
            OnlinePacket::ConnectedPong(pong) => {
                rak_debug!(
                    true,
                    "[{}] Round trip of {}ms",
                    to_address_token(self.address),
                    millis_since(ctx.epoch, now).saturating_sub(pong.ping_time)
                );
            }
            OnlinePacket::ConnectionRequest(request) => {
                self.handle_connection_request(request, ctx, now);
            }
            OnlinePacket::NewConnection(_) => {
                if self.state.is_connected() && !self.confirmed {
                    self.confirmed = true;
                    rak_debug!(
                        true,
                        "[{}] Connection confirmed",
                        to_address_token(self.address)
                    );
                    ctx.events.push_back(Event::Connected {
                        address: self.address,
                        guid: self.guid,
                    });
                } else {
                    rak_debug!(
                        "[{}] Ignoring NewConnection in state {}",
                        to_address_token(self.address),
                        self.state
                    );
                }
            }
            OnlinePacket::Disconnect(_) => {
                rak_debug!(
                    true,
                    "[{}] Client requested disconnect",
                    to_address_token(self.address)
                );
                self.close(DisconnectReason::ClientRequest, ctx, now);
            }
            OnlinePacket::ConnectionAccept(_) => {
                rak_debug!(
                    "[{}] Ignoring ConnectionAccept sent to a server",
                    to_address_token(self.address)
                );
            }
        }
    }

    /// Unwraps a batch, every payload in it becomes its own event.
    fn handle_batch(&mut self, payload: &[u8], ctx: &mut Context<'_>) {
        match Batch::decode(payload) {
            Ok(batch) => {
                for payload in batch.payloads {
                    ctx.events.push_back(Event::Payload {
                        address: self.address,
                        payload,
                    });
                }
            }
            Err(e) => rak_debug!(
                "[{}] Dropping malformed batch: {}",
                to_address_token(self.address),
                e
            ),
        }
    }

    fn handle_connection_request(
        &mut self,
        request: ConnectionRequest,
        ctx: &mut Context<'_>,
        now: Instant,
    ) {
        if !self.state.is_handshaking() || !self.identified {
            rak_debug!(
                "[{}] Ignoring ConnectionRequest in state {}",
                to_address_token(self.address),
                self.state
            );
            return;
        }

        self.guid = request.client_guid;
        let accept = ConnectionAccept {
            client_address: self.address,
            system_index: 0,
            internal_addresses: internal_addresses(),
            request_time: request.time,
            time: millis_since(ctx.epoch, now),
        };
        self.send_packet(accept.into(), Reliability::Reliable, ctx, now);
        self.state = ConnectionState::Connected;
        self.last_ping = now;
        rak_debug!(
            true,
            "[{}] Accepted connection request from {}",
            to_address_token(self.address),
            self.guid
        );
    }

    fn send_packet(
        &mut self,
        packet: OnlinePacket,
        reliability: Reliability,
        ctx: &mut Context<'_>,
        now: Instant,
    ) {
        let result = ctx
            .online
            .encode(&packet)
            .map_err(SendQueueError::from)
            .and_then(|bytes| self.send_queue.insert(&bytes, reliability, 0, now));
        if let Err(e) = result {
            rak_debug!(
                "[{}] Failed to queue {:?}: {}",
                to_address_token(self.address),
                packet,
                e
            );
        }
    }

    /// Queues an application payload.
    pub fn send(
        &mut self,
        payload: &[u8],
        reliability: Reliability,
        channel: u8,
        now: Instant,
    ) -> Result<(), SendQueueError> {
        self.send_queue.insert(payload, reliability, channel, now)
    }

    /// Runs the time based work of the session: timeouts, keep-alive pings,
    /// acknowledgements and the send queue.
    pub(crate) fn tick(&mut self, ctx: &mut Context<'_>, now: Instant) {
        if self.state.is_closed() {
            return;
        }

        if !self.confirmed && elapsed(self.created, now, ctx.config.handshake_timeout) {
            rak_debug!(
                true,
                "[{}] Handshake timed out in state {}",
                to_address_token(self.address),
                self.state
            );
            self.close(DisconnectReason::HandshakeTimeout, ctx, now);
            return;
        }
        if self.confirmed && elapsed(self.last_recv, now, ctx.config.idle_timeout) {
            rak_debug!(
                true,
                "[{}] Timed out after {}ms of silence",
                to_address_token(self.address),
                now.saturating_duration_since(self.last_recv).as_millis()
            );
            self.close(DisconnectReason::IdleTimeout, ctx, now);
            return;
        }

        if self.state.is_connected() && elapsed(self.last_ping, now, ctx.config.ping_interval) {
            self.last_ping = now;
            let ping = ConnectedPing {
                time: millis_since(ctx.epoch, now),
            };
            self.send_packet(ping.into(), Reliability::Unreliable, ctx, now);
        }

        self.recv_queue.evict_stale(now, ctx.config.fragment_timeout);
        self.flush(ctx, now);
    }

    fn flush(&mut self, ctx: &mut Context<'_>, now: Instant) {
        for ack in [self.acks.flush_acks(), self.acks.flush_nacks()]
            .into_iter()
            .flatten()
        {
            self.transmit_ack(ack, ctx);
        }

        for datagram in self.send_queue.pass(now) {
            ctx.transmit(self.address, datagram);
        }
    }

    fn transmit_ack(&self, ack: Ack, ctx: &mut Context<'_>) {
        match ack.write_to_bytes() {
            Ok(bytes) => ctx.transmit(self.address, bytes),
            Err(e) => rak_debug!(
                "[{}] Failed to encode acknowledgement: {}",
                to_address_token(self.address),
                e
            ),
        }
    }

    /// Sends a `Disconnect` in a frame set of its own, skipping the send
    /// queue.
    fn send_disconnect(&mut self, ctx: &mut Context<'_>, now: Instant) {
        let packet = OnlinePacket::from(Disconnect {});
        let result = ctx
            .online
            .encode(&packet)
            .map_err(SendQueueError::from)
            .and_then(|bytes| {
                self.send_queue
                    .encode_now(&bytes, Reliability::ReliableOrd, 0, now)
            });
        match result {
            Ok(datagrams) => {
                for datagram in datagrams {
                    ctx.transmit(self.address, datagram);
                }
            }
            Err(e) => rak_debug!(
                "[{}] Failed to send Disconnect: {}",
                to_address_token(self.address),
                e
            ),
        }
    }

    /// Ends the session, dropping everything still queued. The peer gets a
    /// `Disconnect` unless it asked for the close itself, then only the ACK
    /// of its last frame sets goes out.
    pub(crate) fn close(&mut self, reason: DisconnectReason, ctx: &mut Context<'_>, now: Instant) {
        if self.state.is_closed() {
            return;
        }
        self.state = ConnectionState::Closing;

        if reason == DisconnectReason::ClientRequest {
            if let Some(ack) = self.acks.flush_acks() {
                self.transmit_ack(ack, ctx);
            }
        } else {
            self.send_disconnect(ctx, now);
        }

        self.send_queue = SendQueue::new(self.send_queue.mtu(), ctx.config.resend_interval);
        self.recv_queue = RecvQueue::new();
        self.acks = AckTracker::new();
        self.state = ConnectionState::Closed;
        self.closed = Some(reason);
    }
}
