use std::net::SocketAddr;

/// Something the application has to know about, taken from
/// [`Server::poll_event`](super::Server::poll_event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A client completed the handshake.
    Connected { address: SocketAddr, guid: u64 },
    /// A reassembled, in-order application payload.
    Payload { address: SocketAddr, payload: Vec<u8> },
    /// A connected session is gone.
    Disconnected {
        address: SocketAddr,
        reason: DisconnectReason,
    },
}

impl Event {
    pub fn address(&self) -> SocketAddr {
        match self {
            Event::Connected { address, .. }
            | Event::Payload { address, .. }
            | Event::Disconnected { address, .. } => *address,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent `Disconnect`.
    ClientRequest,
    /// The application closed the session.
    LocalClose,
    /// Nothing was received for [`Config::idle_timeout`](crate::config::Config).
    IdleTimeout,
    /// The handshake did not finish within
    /// [`Config::handshake_timeout`](crate::config::Config).
    HandshakeTimeout,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientRequest => write!(f, "client request"),
            Self::LocalClose => write!(f, "closed locally"),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::HandshakeTimeout => write!(f, "handshake timeout"),
        }
    }
}
