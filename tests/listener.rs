#![cfg(feature = "async_std")]

use std::net::SocketAddr;
use std::time::Duration;

use async_std::future::timeout;
use async_std::net::UdpSocket;
use async_std::task::block_on;
use rak_transport::codec::Writer;
use rak_transport::protocol::frame::{Frame, FrameSet};
use rak_transport::protocol::packet::offline::*;
use rak_transport::protocol::packet::online::*;
use rak_transport::protocol::packet::RakPacket;
use rak_transport::protocol::Magic;
use rak_transport::{Config, Listener, Reliability};

const WAIT: Duration = Duration::from_secs(5);

async fn recv_packet(socket: &UdpSocket) -> RakPacket {
    let mut buf = [0u8; 2048];
    let (len, _) = timeout(WAIT, socket.recv_from(&mut buf))
        .await
        .expect("timed out")
        .unwrap();
    RakPacket::decode(&buf[..len], &OfflinePacket::catalogue()).unwrap()
}

async fn send_frame(socket: &UdpSocket, to: SocketAddr, sequence: u32, body: Vec<u8>) {
    let mut frame = Frame::new(Reliability::Reliable, body);
    frame.reliable_index = Some(sequence);
    let set = FrameSet::new(sequence, vec![frame]);
    socket.send_to(&set.write_to_bytes().unwrap(), to).await.unwrap();
}

#[test]
fn loopback_echo() {
    block_on(async {
        let config = Config::default()
            .with_tick_interval(Duration::from_millis(10))
            .with_advertisement("loopback");
        let mut listener = Listener::bind_with("127.0.0.1:0", config).await.unwrap();
        listener.start().await.unwrap();
        let server = listener.address;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let ping = OfflinePacket::from(UnconnectedPing {
            time: 1,
            magic: Magic::new(),
            client_guid: 9,
        });
        client.send_to(&ping.write_to_bytes().unwrap(), server).await.unwrap();
        match recv_packet(&client).await {
            RakPacket::Offline(OfflinePacket::UnconnectedPong(pong)) => {
                assert_eq!(pong.server_id, "loopback");
            }
            other => panic!("unexpected reply {:?}", other),
        }

        let request = OfflinePacket::from(OpenConnectRequest {
            protocol: 11,
            mtu_size: 1200,
        });
        client.send_to(&request.write_to_bytes().unwrap(), server).await.unwrap();
        assert!(matches!(
            recv_packet(&client).await,
            RakPacket::Offline(OfflinePacket::OpenConnectReply(_))
        ));

        let request = OfflinePacket::from(SessionInfoRequest {
            magic: Magic::new(),
            server_address: server,
            mtu_size: 1200,
            client_guid: 9,
        });
        client.send_to(&request.write_to_bytes().unwrap(), server).await.unwrap();
        assert!(matches!(
            recv_packet(&client).await,
            RakPacket::Offline(OfflinePacket::SessionInfoReply(_))
        ));

        let request = OnlinePacket::from(ConnectionRequest {
            client_guid: 9,
            time: 0,
            security: false,
        });
        send_frame(&client, server, 0, request.write_to_bytes().unwrap()).await;
        let confirm = OnlinePacket::from(NewConnection {
            server_address: server,
            internal_addresses: internal_addresses(),
            request_time: 0,
            time: 0,
        });
        send_frame(&client, server, 1, confirm.write_to_bytes().unwrap()).await;

        let mut conn = timeout(WAIT, listener.accept())
            .await
            .expect("timed out")
            .unwrap();
        assert_eq!(conn.guid, 9);

        send_frame(&client, server, 2, vec![0x42, 1, 2, 3]).await;
        let payload = timeout(WAIT, conn.recv()).await.expect("timed out").unwrap();
        assert_eq!(payload, vec![0x42, 1, 2, 3]);

        conn.send(&[0x42, 4, 5], Reliability::ReliableOrd, 0)
            .await
            .unwrap();
        loop {
            if let RakPacket::FrameSet(set) = recv_packet(&client).await {
                if set.frames.iter().any(|f| f.body == vec![0x42, 4, 5]) {
                    break;
                }
            }
        }

        conn.close().await.unwrap();
        assert!(conn.is_closed().await);
        listener.stop().await.unwrap();
    });
}
