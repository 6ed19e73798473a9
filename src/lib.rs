//! # rak-transport
//!
//! A reliable, ordered, connection oriented transport over UDP, speaking the
//! RakNet protocol, together with the binary codec every packet is declared
//! with.
//!
//! The crate is split in two layers:
//! - [`Server`] implements the protocol without doing any IO. Datagrams go in
//!   through [`Server::on_datagram`], time moves with [`Server::tick`] and the
//!   output is polled.
//! - [`Listener`](server::Listener) drives a `Server` over a UDP socket with
//!   `async-std` (the default) or `tokio` (the `async_tokio` feature) and hands
//!   out a [`Connection`] per client.
//!
//! ```rust ignore
//! use rak_transport::server::Listener;
//! use rak_transport::protocol::reliability::Reliability;
//!
//! #[async_std::main]
//! async fn main() {
//!     let mut server = Listener::bind("0.0.0.0:19132").await.unwrap();
//!     server.start().await.unwrap();
//!
//!     loop {
//!         let mut conn = server.accept().await.unwrap();
//!         async_std::task::spawn(async move {
//!             while let Ok(payload) = conn.recv().await {
//!                 conn.send(&payload, Reliability::ReliableOrd, 0).await.ok();
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! Log output goes through `tracing`; the `debug_buffers` feature also dumps
//! every datagram.

/// Acknowledgement tracking of received frame sets.
pub mod ack;
/// The binary codec every packet is built on.
pub mod codec;
pub mod config;
/// Raknet sessions.
/// A session is the state of one remote peer, the [`Connection`] handle is
/// how the application talks to it.
pub mod connection;
pub mod error;
pub(crate) mod notify;
/// Home of the RakNet protocol: packets, frames and the MCPE envelope.
pub mod protocol;
pub mod server;
pub mod util;

pub use crate::config::Config;
pub use crate::connection::state::ConnectionState;
pub use crate::connection::Connection;
pub use crate::protocol::reliability::Reliability;
pub use crate::server::{DisconnectReason, Event, Listener, Server, Transmit};
