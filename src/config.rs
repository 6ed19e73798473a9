use std::time::Duration;

use crate::protocol::MAX_MTU;

/// Tunables of a [`Server`](crate::server::Server).
///
/// ```rust ignore
/// use std::time::Duration;
/// use rak_transport::Config;
///
/// let config = Config::default()
///     .with_max_mtu(1400)
///     .with_idle_timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// How long a reliable frame waits for an ACK before it is sent again.
    pub resend_interval: Duration,
    /// The largest MTU the server agrees to during the handshake.
    pub max_mtu: u16,
    /// Batches smaller than this many bytes are stored, not compressed.
    pub compression_threshold: usize,
    /// How long a session may take to send `NewConnection`.
    pub handshake_timeout: Duration,
    /// A connected session that is silent for this long is dropped.
    pub idle_timeout: Duration,
    /// Keep-alive ping interval once connected.
    pub ping_interval: Duration,
    /// How long an incomplete split packet is kept.
    pub fragment_timeout: Duration,
    /// How often the [`Listener`](crate::server::Listener) ticks the server.
    pub tick_interval: Duration,
    /// RakNet protocol versions accepted in `OpenConnectRequest`.
    pub protocol_versions: Vec<u8>,
    /// The server-id string sent in `UnconnectedPong`. When unset, a default
    /// [`Motd`](crate::protocol::mcpe::Motd) is advertised.
    pub advertisement: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resend_interval: Duration::from_secs(1),
            max_mtu: MAX_MTU,
            compression_threshold: 256,
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(15),
            ping_interval: Duration::from_secs(5),
            fragment_timeout: Duration::from_secs(10),
            tick_interval: Duration::from_millis(50),
            protocol_versions: vec![10, 11],
            advertisement: None,
        }
    }
}

impl Config {
    pub fn with_resend_interval(mut self, interval: Duration) -> Self {
        self.resend_interval = interval;
        self
    }

    pub fn with_max_mtu(mut self, mtu: u16) -> Self {
        self.max_mtu = mtu;
        self
    }

    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_fragment_timeout(mut self, timeout: Duration) -> Self {
        self.fragment_timeout = timeout;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_protocol_versions<V: Into<Vec<u8>>>(mut self, versions: V) -> Self {
        self.protocol_versions = versions.into();
        self
    }

    pub fn with_advertisement<S: Into<String>>(mut self, advertisement: S) -> Self {
        self.advertisement = Some(advertisement.into());
        self
    }
}
