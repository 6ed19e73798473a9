//! # Connection Error
//! These errors are returned when addressing a session, either through the
//! [`Server`] or a [`Connection`] handle.
//!
//! [`Server`]: crate::server::Server
//! [`Connection`]: crate::connection::conn::Connection
use std::net::SocketAddr;

use thiserror::Error;

use crate::connection::queue::SendQueueError;
use crate::error::codec::EncodeError;

#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The session for this address no longer exists. Any higher level state
    /// tied to the address should be torn down.
    #[error("no session exists for {0}")]
    SessionNotFound(SocketAddr),
    /// The session has not finished its handshake, nothing can be sent to it
    /// before `NewConnection` confirms it.
    #[error("session {0} is not connected yet")]
    NotConnected(SocketAddr),
    /// The connection has been closed.
    #[error("connection closed")]
    Closed,
    /// The payload could not be queued.
    #[error(transparent)]
    SendQueue(#[from] SendQueueError),
    /// The payload could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}
