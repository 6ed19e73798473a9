//! Property-based tests using proptest
//!
//! These check the codec, reassembly, ordering and scheduling invariants
//! across randomly generated inputs.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::{Duration, Instant};

use proptest::prelude::*;
use rak_transport::ack::Ackable;
use rak_transport::codec::{Reader, VarBytes, Writer};
use rak_transport::connection::queue::{FragmentQueue, OrderedQueue, SendQueue};
use rak_transport::protocol::ack::Ack;
use rak_transport::protocol::frame::{Frame, FrameSet};
use rak_transport::protocol::mcpe::Batch;
use rak_transport::protocol::packet::offline::*;
use rak_transport::protocol::packet::online::*;
use rak_transport::protocol::{Magic, MIN_MTU};
use rak_transport::util::U24_MAX;
use rak_transport::Reliability;

fn address() -> impl Strategy<Value = SocketAddr> {
    prop_oneof![
        (any::<[u8; 4]>(), any::<u16>())
            .prop_map(|(ip, port)| SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(ip), port))),
        (any::<[u8; 16]>(), any::<u16>(), any::<u32>(), any::<u32>()).prop_map(
            |(ip, port, flow, scope)| {
                SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::from(ip), port, flow, scope))
            }
        ),
    ]
}

fn offline_packet() -> impl Strategy<Value = OfflinePacket> {
    prop_oneof![
        (any::<u64>(), any::<u64>()).prop_map(|(time, client_guid)| OfflinePacket::from(UnconnectedPing {
            time,
            magic: Magic::new(),
            client_guid,
        })),
        (any::<u64>(), any::<u64>()).prop_map(|(time, client_guid)| {
            OfflinePacket::from(UnconnectedPingOpenConnections {
                time,
                magic: Magic::new(),
                client_guid,
            })
        }),
        (any::<u64>(), any::<u64>(), "[a-zA-Z0-9;. ]{0,64}").prop_map(
            |(time, server_guid, server_id)| OfflinePacket::from(UnconnectedPong {
                time,
                server_guid,
                magic: Magic::new(),
                server_id,
            })
        ),
        // the smallest request is the tag, the magic and the protocol
        (any::<u8>(), 46u16..=1492).prop_map(|(protocol, mtu_size)| {
            OfflinePacket::from(OpenConnectRequest { protocol, mtu_size })
        }),
        (any::<u64>(), any::<bool>(), any::<u16>()).prop_map(|(server_guid, security, mtu_size)| {
            OfflinePacket::from(OpenConnectReply {
                magic: Magic::new(),
                server_guid,
                security,
                mtu_size,
            })
        }),
        (address(), any::<u16>(), any::<u64>()).prop_map(
            |(server_address, mtu_size, client_guid)| OfflinePacket::from(SessionInfoRequest {
                magic: Magic::new(),
                server_address,
                mtu_size,
                client_guid,
            })
        ),
        (any::<u64>(), address(), any::<u16>(), any::<bool>()).prop_map(
            |(server_guid, client_address, mtu_size, security)| OfflinePacket::from(SessionInfoReply {
                magic: Magic::new(),
                server_guid,
                client_address,
                mtu_size,
                security,
            })
        ),
        (any::<u8>(), any::<u64>()).prop_map(|(protocol, server_guid)| {
            OfflinePacket::from(IncompatibleProtocolVersion {
                protocol,
                magic: Magic::new(),
                server_guid,
            })
        }),
    ]
}

fn online_packet() -> impl Strategy<Value = OnlinePacket> {
    prop_oneof![
        any::<u64>().prop_map(|time| OnlinePacket::from(ConnectedPing { time })),
        (any::<u64>(), any::<u64>())
            .prop_map(|(ping_time, pong_time)| OnlinePacket::from(ConnectedPong { ping_time, pong_time })),
        (any::<u64>(), any::<u64>(), any::<bool>()).prop_map(|(client_guid, time, security)| {
            OnlinePacket::from(ConnectionRequest {
                client_guid,
                time,
                security,
            })
        }),
        (
            address(),
            any::<u16>(),
            prop::array::uniform20(address()),
            any::<u64>(),
            any::<u64>()
        )
            .prop_map(
                |(client_address, system_index, internal_addresses, request_time, time)| {
                    OnlinePacket::from(ConnectionAccept {
                        client_address,
                        system_index,
                        internal_addresses,
                        request_time,
                        time,
                    })
                }
            ),
        (
            address(),
            prop::array::uniform20(address()),
            any::<u64>(),
            any::<u64>()
        )
            .prop_map(|(server_address, internal_addresses, request_time, time)| {
                OnlinePacket::from(NewConnection {
                    server_address,
                    internal_addresses,
                    request_time,
                    time,
                })
            }),
        Just(OnlinePacket::from(Disconnect {})),
    ]
}

fn reliability() -> impl Strategy<Value = Reliability> {
    prop_oneof![
        Just(Reliability::Unreliable),
        Just(Reliability::UnreliableSeq),
        Just(Reliability::Reliable),
        Just(Reliability::ReliableOrd),
        Just(Reliability::ReliableSeq),
    ]
}

// Property: every offline packet survives encoding
proptest! {
    #[test]
    fn prop_offline_packet_roundtrip(packet in offline_packet()) {
        let bytes = packet.write_to_bytes().unwrap();
        prop_assert_eq!(bytes[0], packet.tag());
        let decoded = OfflinePacket::catalogue().decode(&bytes).unwrap();
        prop_assert_eq!(decoded, packet);
    }
}

// Property: every online packet survives encoding
proptest! {
    #[test]
    fn prop_online_packet_roundtrip(packet in online_packet()) {
        let bytes = packet.write_to_bytes().unwrap();
        prop_assert_eq!(bytes[0], packet.tag());
        let decoded = OnlinePacket::catalogue().decode(&bytes).unwrap();
        prop_assert_eq!(decoded, packet);
    }
}

// Property: acknowledgements cover exactly the sequences they were built from
proptest! {
    #[test]
    fn prop_ack_roundtrip(sequences in prop::collection::vec(0..=U24_MAX, 0..200), nack in any::<bool>()) {
        let ack = Ack::from_records(sequences.clone(), nack);
        let decoded = Ack::read_from_slice(&ack.write_to_bytes().unwrap()).unwrap();
        prop_assert_eq!(&decoded, &ack);

        let mut expected = sequences;
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(decoded.sequences(), expected);
    }
}

// Property: reassembly yields the sent payload regardless of arrival order
proptest! {
    #[test]
    fn prop_fragment_any_order(
        (payload, frag_size, order) in (prop::collection::vec(any::<u8>(), 1..4000), 4usize..600)
            .prop_flat_map(|(payload, frag_size)| {
                let count = payload.len().div_ceil(frag_size);
                let order = Just((0..count).collect::<Vec<_>>()).prop_shuffle();
                (Just(payload), Just(frag_size), order)
            })
    ) {
        let frames = Frame::partition(&payload, Reliability::ReliableOrd, 3, frag_size);
        let mut queue = FragmentQueue::new();
        for (step, index) in order.iter().enumerate() {
            let meta = frames[*index].fragment_meta.unwrap();
            queue.append(meta.id, meta.size, meta.index, frames[*index].body.clone()).unwrap();
            if step + 1 < order.len() {
                prop_assert_eq!(queue.pop(3), None);
            }
        }
        prop_assert_eq!(queue.pop(3), Some(payload));
        prop_assert!(queue.is_empty());
    }
}

// Property: an ordering channel releases 0..n in order for any arrival order
proptest! {
    #[test]
    fn prop_ordering_any_permutation(
        order in (1u32..64).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    ) {
        let mut queue = OrderedQueue::new();
        let mut released = Vec::new();
        for index in &order {
            prop_assert!(queue.append(*index, *index));
            released.extend(queue.ready());
            // never ahead of a missing predecessor
            let prefix: Vec<u32> = (0..released.len() as u32).collect();
            prop_assert_eq!(&released, &prefix);
        }
        prop_assert_eq!(released.len(), order.len());
    }
}

// Property: discarding twice is the same as discarding once
proptest! {
    #[test]
    fn prop_idempotent_discard(count in 1u32..20, target in 0u32..20, twice in any::<bool>()) {
        let target = target % count;
        let start = Instant::now();
        let resend = Duration::from_secs(1);
        let mut queue = SendQueue::new(1400, resend);
        for i in 0..count {
            queue.insert(&[i as u8; 8], Reliability::Reliable, 0, start).unwrap();
        }
        prop_assert_eq!(queue.pass(start).len(), 1);

        queue.discard(target);
        if twice {
            queue.discard(target);
        }
        prop_assert!(!queue.is_pending(target));

        let resent: Vec<u32> = queue
            .pass(start + resend)
            .iter()
            .flat_map(|bytes| FrameSet::read_from_slice(bytes).unwrap().frames)
            .filter_map(|frame| frame.reliable_index)
            .collect();
        prop_assert!(!resent.contains(&target));
        prop_assert_eq!(resent.len() as u32, count - 1);
    }
}

// Property: batches round trip, small ones are stored verbatim
proptest! {
    #[test]
    fn prop_batch_roundtrip(payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..2000), 0..8)) {
        let batch = Batch::new(payloads.clone());
        let bytes = batch.encode(256).unwrap();
        prop_assert_eq!(Batch::decode(&bytes).unwrap().payloads, payloads);
    }

    #[test]
    fn prop_batch_below_threshold_is_stored(payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..30), 1..6)) {
        let mut framed = Vec::new();
        for payload in &payloads {
            framed.extend(VarBytes::new(payload.clone()).write_to_bytes().unwrap());
        }
        prop_assume!(framed.len() < 256);

        let bytes = Batch::new(payloads.clone()).encode(256).unwrap();
        prop_assert!(bytes[1..].windows(framed.len()).any(|w| w == framed.as_slice()));
        prop_assert_eq!(Batch::decode(&bytes).unwrap().payloads, payloads);
    }
}

// Property: no frame set is larger than the MTU allows
proptest! {
    #[test]
    fn prop_mtu_bound(
        mtu in MIN_MTU..=1492u16,
        sends in prop::collection::vec((0usize..6000, reliability()), 1..20)
    ) {
        let start = Instant::now();
        let mut queue = SendQueue::new(mtu, Duration::from_secs(1));
        for (len, reliability) in &sends {
            queue.insert(&vec![0xab; *len], *reliability, 0, start).unwrap();
        }
        let max = (mtu - 28) as usize;
        for datagram in queue.pass(start) {
            prop_assert!(datagram.len() <= max, "{} > {}", datagram.len(), max);
        }

        // resends after a NACK obey the same bound
        let nack = Ack::from_records((0..64).collect(), true);
        for datagram in queue.nack(&nack, start) {
            prop_assert!(datagram.len() <= max);
        }
    }
}
