//! Errors for every layer of the transport.
//!
//! - [`codec`]: decode and encode failures of wire values and packets.
//! - [`connection`]: failures addressing a session.
//! - [`server`]: failures of the async [`Listener`](crate::server::listener::Listener).
pub mod codec;
pub mod connection;
pub mod server;

pub use self::codec::{DecodeError, DecodeErrorKind, EncodeError, PacketError};
pub use self::connection::ConnectionError;
pub use self::server::ServerError;
