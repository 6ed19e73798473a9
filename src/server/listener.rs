use std::borrow::Cow;
use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "async_std")]
use async_std::{
    channel::{bounded, Receiver, Sender},
    net::UdpSocket,
    stream::interval,
    sync::Mutex,
    task,
};
#[cfg(feature = "async_std")]
use futures::{select, FutureExt, StreamExt};

#[cfg(feature = "async_tokio")]
use tokio::{
    net::UdpSocket,
    select,
    sync::mpsc::channel as bounded,
    sync::mpsc::{Receiver, Sender},
    sync::Mutex,
    task,
    time::interval,
};

use super::{Event, Server, Transmit};
use crate::config::Config;
use crate::connection::Connection;
use crate::error::ServerError;
use crate::notify::Notify;
use crate::rak_debug;
use crate::util::to_address_token;

/// How many received payloads a [`Connection`] buffers before the listener
/// waits for the application to catch up.
const CONNECTION_BUFFER: usize = 512;
/// How many accepted connections wait for [`Listener::accept`].
const ACCEPT_BUFFER: usize = 10;

/// Anything [`Listener::bind`] accepts as a bind address: a parsed
/// [`SocketAddr`] or text such as `"0.0.0.0:19132"` or `"localhost:19132"`.
#[derive(Debug, Clone)]
pub enum BindAddr<'a> {
    Parsed(SocketAddr),
    Text(Cow<'a, str>),
}

impl BindAddr<'_> {
    /// Parses the address, falling back to a host name lookup.
    pub fn resolve(&self) -> Option<SocketAddr> {
        match self {
            BindAddr::Parsed(addr) => Some(*addr),
            BindAddr::Text(text) => match text.parse::<SocketAddr>() {
                Ok(addr) => Some(addr),
                Err(_) => text.to_socket_addrs().ok()?.next(),
            },
        }
    }
}

impl<'a> From<&'a str> for BindAddr<'a> {
    fn from(text: &'a str) -> Self {
        BindAddr::Text(Cow::Borrowed(text))
    }
}

impl From<String> for BindAddr<'_> {
    fn from(text: String) -> Self {
        BindAddr::Text(Cow::Owned(text))
    }
}

impl From<SocketAddr> for BindAddr<'_> {
    fn from(addr: SocketAddr) -> Self {
        BindAddr::Parsed(addr)
    }
}

impl std::fmt::Display for BindAddr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindAddr::Parsed(addr) => addr.fmt(f),
            BindAddr::Text(text) => f.write_str(text),
        }
    }
}

/// The inbound payload channels of the connections handed out so far.
type Inboxes = HashMap<SocketAddr, Sender<Vec<u8>>>;

/// Drives a [`Server`] over a UDP socket.
///
/// One task selects between the socket, a ticker firing every
/// [`Config::tick_interval`] and the shutdown signal. Every connected client
/// is handed to the application as a [`Connection`] through
/// [`Listener::accept`].
///
/// ```rust ignore
/// let mut listener = Listener::bind("0.0.0.0:19132").await?;
/// listener.start().await?;
///
/// while let Ok(mut conn) = listener.accept().await {
///     async_std::task::spawn(async move {
///         while let Ok(payload) = conn.recv().await {
///             tracing::info!("{} sent {} bytes", conn.address, payload.len());
///         }
///     });
/// }
/// ```
pub struct Listener {
    /// The address the socket is bound to.
    pub address: SocketAddr,
    /// Set between `start` and `stop`.
    serving: bool,
    sock: Arc<UdpSocket>,
    server: Arc<Mutex<Server>>,
    /// Dispatches accepted connections to `Listener::accept`.
    recv_comm: Receiver<Connection>,
    send_comm: Sender<Connection>,
    /// A Notifier that stops the network task.
    closed: Arc<Notify>,
}

impl Listener {
    /// Binds a new listener with the default [`Config`].
    pub async fn bind<'a, I: Into<BindAddr<'a>>>(address: I) -> Result<Self, ServerError> {
        Self::bind_with(address, Config::default()).await
    }

    /// Binds the socket without serving it yet, see [`Listener::start`].
    /// When the config carries no advertisement an MCPE motd with the bound
    /// port is used.
    pub async fn bind_with<'a, I: Into<BindAddr<'a>>>(
        address: I,
        mut config: Config,
    ) -> Result<Self, ServerError> {
        let address = address.into();
        let Some(address) = address.resolve() else {
            rak_debug!("listener: cannot resolve bind address {}", address);
            return Err(ServerError::AddrBindErr);
        };

        let sock = UdpSocket::bind(address)
            .await
            .map_err(|_| ServerError::AddrBindErr)?;
        let address = sock.local_addr().unwrap_or(address);
        rak_debug!(true, "listener: Bound to {}", address);

        let now = Instant::now();
        let guid: u64 = rand::random();
        if config.advertisement.is_none() {
            let motd = crate::protocol::mcpe::Motd::new(guid, address.port().to_string());
            config.advertisement = Some(motd.write());
        }

        let (send_comm, recv_comm) = bounded::<Connection>(ACCEPT_BUFFER);

        Ok(Self {
            address,
            serving: false,
            sock: Arc::new(sock),
            server: Arc::new(Mutex::new(Server::with_guid(config, guid, now))),
            recv_comm,
            send_comm,
            closed: Arc::new(Notify::new()),
        })
    }

    /// The sans-IO server this listener drives.
    pub fn server(&self) -> Arc<Mutex<Server>> {
        self.server.clone()
    }

    /// Spawns the network task. Fails when already serving or stopped.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        if self.serving {
            return Err(ServerError::AlreadyOnline);
        }
        if self.closed.is_notified() {
            return Err(ServerError::Killed);
        }

        let socket = self.sock.clone();
        let server = self.server.clone();
        let send_comm = self.send_comm.clone();
        let closer = self.closed.clone();
        let tick_interval = server.lock().await.config().tick_interval;

        self.serving = true;

        task::spawn(async move {
            let mut buf = [0u8; 2048];
            let mut inboxes = Inboxes::new();
            let mut ticker = interval(tick_interval);

            loop {
                macro_rules! recv_body {
                    ($recv: ident) => {
                        match $recv {
                            Ok((length, origin)) => {
                                let mut s = server.lock().await;
                                s.on_datagram(&buf[..length], origin, Instant::now());
                            }
                            Err(e) => match e.kind() {
                                std::io::ErrorKind::ConnectionReset => {}
                                _ => {
                                    rak_debug!(true, "listener: recv failed: {}", e);
                                }
                            },
                        }
                    };
                }

                #[cfg(feature = "async_std")]
                select! {
                    _ = closer.wait().fuse() => {
                        rak_debug!(true, "listener: shutting down");
                        break;
                    }
                    recv = socket.recv_from(&mut buf).fuse() => {
                        recv_body!(recv);
                    }
                    _ = ticker.next().fuse() => {
                        server.lock().await.tick(Instant::now());
                    }
                }

                #[cfg(feature = "async_tokio")]
                select! {
                    _ = closer.wait() => {
                        rak_debug!(true, "listener: shutting down");
                        break;
                    }
                    recv = socket.recv_from(&mut buf) => {
                        recv_body!(recv);
                    }
                    _ = ticker.tick() => {
                        server.lock().await.tick(Instant::now());
                    }
                }

                dispatch(&socket, &server, &send_comm, &mut inboxes).await;
            }

            {
                let mut s = server.lock().await;
                s.close_all(Instant::now());
            }
            // the final disconnects, dropping the inboxes closes every connection
            dispatch(&socket, &server, &send_comm, &mut inboxes).await;
        });

        Ok(())
    }

    /// Waits for the next client to complete the handshake.
    /// Dropping the returned [`Connection`] does not disconnect the client, use
    /// [`Connection::close`] for that.
    pub async fn accept(&mut self) -> Result<Connection, ServerError> {
        if !self.serving {
            return Err(ServerError::NotListening);
        }

        #[cfg(feature = "async_std")]
        let connection = self.recv_comm.recv().await.ok();
        #[cfg(feature = "async_tokio")]
        let connection = self.recv_comm.recv().await;

        connection.ok_or(ServerError::Killed)
    }

    /// Stops the listener, disconnecting every client.
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        if !self.serving {
            return Err(ServerError::NotListening);
        }
        self.closed.notify();
        self.serving = false;
        Ok(())
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.closed.notify();
    }
}

/// Sends what the server queued and hands events to the connections.
async fn dispatch(
    socket: &UdpSocket,
    server: &Arc<Mutex<Server>>,
    send_comm: &Sender<Connection>,
    inboxes: &mut Inboxes,
) {
    let (transmits, events) = {
        let mut s = server.lock().await;
        let transmits: Vec<Transmit> = std::iter::from_fn(|| s.poll_transmit()).collect();
        let events: Vec<Event> = std::iter::from_fn(|| s.poll_event()).collect();
        (transmits, events)
    };

    for transmit in transmits {
        if let Err(e) = socket.send_to(&transmit.payload, transmit.address).await {
            rak_debug!(
                true,
                "[{}] Failed to send datagram: {}",
                to_address_token(transmit.address),
                e
            );
        }
    }

    for event in events {
        match event {
            Event::Connected { address, guid } => {
                let (inbox, recv_queue) = bounded::<Vec<u8>>(CONNECTION_BUFFER);
                let connection = Connection::new(address, guid, server.clone(), recv_queue);
                if send_comm.send(connection).await.is_err() {
                    rak_debug!(
                        "[{}] accept queue closed, dropping the session",
                        to_address_token(address)
                    );
                    let _ = server.lock().await.close(address, Instant::now());
                    continue;
                }
                inboxes.insert(address, inbox);
            }
            Event::Payload { address, payload } => {
                let Some(inbox) = inboxes.get(&address) else {
                    continue;
                };
                if inbox.send(payload).await.is_err() {
                    rak_debug!(
                        true,
                        "[{}] Connection handle dropped, discarding payload",
                        to_address_token(address)
                    );
                }
            }
            Event::Disconnected { address, reason } => {
                rak_debug!(
                    true,
                    "[{}] disconnected: {}",
                    to_address_token(address),
                    reason
                );
                inboxes.remove(&address);
            }
        }
    }
}
