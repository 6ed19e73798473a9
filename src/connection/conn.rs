use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "async_std")]
use async_std::{channel::Receiver, sync::Mutex};
#[cfg(feature = "async_tokio")]
use tokio::sync::{mpsc::Receiver, Mutex};

use crate::connection::state::ConnectionState;
use crate::error::ConnectionError;
use crate::protocol::reliability::Reliability;
use crate::rak_debug;
use crate::server::Server;
use crate::util::to_address_token;

/// A handle to one connected client, handed out by
/// [`Listener::accept`](crate::server::Listener::accept).
///
/// Received payloads are buffered until [`Connection::recv`] takes them.
/// Everything sent goes through the shared [`Server`] and is transmitted on
/// its next tick.
///
/// ```rust ignore
/// async fn handle(mut conn: Connection) {
///     while let Ok(payload) = conn.recv().await {
///         conn.send(&payload, Reliability::ReliableOrd, 0).await.ok();
///     }
/// }
/// ```
pub struct Connection {
    /// The address of the client.
    pub address: SocketAddr,
    /// The guid the client sent in its `ConnectionRequest`.
    pub guid: u64,
    server: Arc<Mutex<Server>>,
    recv_queue: Receiver<Vec<u8>>,
}

impl Connection {
    pub(crate) fn new(
        address: SocketAddr,
        guid: u64,
        server: Arc<Mutex<Server>>,
        recv_queue: Receiver<Vec<u8>>,
    ) -> Self {
        Self {
            address,
            guid,
            server,
            recv_queue,
        }
    }

    /// Waits for the next application payload. Fails with
    /// [`ConnectionError::Closed`] once the session is gone and every buffered
    /// payload has been taken.
    #[cfg(feature = "async_std")]
    pub async fn recv(&mut self) -> Result<Vec<u8>, ConnectionError> {
        self.recv_queue
            .recv()
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    #[cfg(feature = "async_tokio")]
    pub async fn recv(&mut self) -> Result<Vec<u8>, ConnectionError> {
        self.recv_queue.recv().await.ok_or(ConnectionError::Closed)
    }

    /// Queues `payload` on the order `channel`.
    pub async fn send(
        &self,
        payload: &[u8],
        reliability: Reliability,
        channel: u8,
    ) -> Result<(), ConnectionError> {
        let mut server = self.server.lock().await;
        server
            .send(self.address, payload, reliability, channel, Instant::now())
            .map_err(|e| self.closed_on_missing(e))
    }

    /// Queues `payloads` as one [`Batch`](crate::protocol::mcpe::Batch).
    pub async fn send_batch(
        &self,
        payloads: Vec<Vec<u8>>,
        reliability: Reliability,
        channel: u8,
    ) -> Result<(), ConnectionError> {
        let mut server = self.server.lock().await;
        server
            .send_batch(self.address, payloads, reliability, channel, Instant::now())
            .map_err(|e| self.closed_on_missing(e))
    }

    fn closed_on_missing(&self, e: ConnectionError) -> ConnectionError {
        match e {
            ConnectionError::SessionNotFound(_) => ConnectionError::Closed,
            e => e,
        }
    }

    pub async fn state(&self) -> ConnectionState {
        let server = self.server.lock().await;
        match server.session_state(self.address) {
            ConnectionState::Uninitialized => ConnectionState::Closed,
            state => state,
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.state().await.is_closed()
    }

    /// Disconnects the client. The `Disconnect` goes out with the next tick.
    pub async fn close(&mut self) -> Result<(), ConnectionError> {
        rak_debug!(true, "[{}] Closing connection", to_address_token(self.address));
        let mut server = self.server.lock().await;
        server
            .close(self.address, Instant::now())
            .map_err(|e| self.closed_on_missing(e))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("guid", &self.guid)
            .finish()
    }
}
