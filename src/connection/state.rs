/// Connection States
/// These are all possible states of a raknet session. A session only exists
/// once a client has sent its first `OpenConnectRequest`, so `Uninitialized`
/// describes a peer the server has not heard from yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub enum ConnectionState {
    /// No session exists for the peer. Unconnected pings are answered
    /// statelessly from this state.
    Uninitialized,

    /// The offline handshake is in progress: the MTU has been offered and the
    /// client has not yet sent its `ConnectionRequest`.
    Handshaking,

    /// The session accepted the `ConnectionRequest`. It becomes usable for
    /// application traffic once the client confirms with `NewConnection`.
    Connected,

    /// The session is shutting down and flushing its last datagrams.
    Closing,

    /// The session is gone and every queue has been released.
    Closed,
}

impl ConnectionState {
    /// Returns whether or not the session is still in the handshake.
    pub fn is_handshaking(&self) -> bool {
        matches!(self, Self::Handshaking)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns whether or not the session may still send and receive frames.
    /// Sessions in this state are:
    /// - Handshaking
    /// - Connected
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Handshaking | Self::Connected)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Connected => write!(f, "Connected"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
