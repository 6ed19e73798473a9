//! Server errors
//! Server errors are errors that can occur when using the [`Listener`](crate::server::listener::Listener) api.
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Error)]
pub enum ServerError {
    /// The server is unable to bind to the given address.
    #[error("unable to bind to address")]
    AddrBindErr,
    /// The server is already online and can not be started again.
    #[error("already online")]
    AlreadyOnline,
    /// The server is offline and can not send packets.
    #[error("not listening")]
    NotListening,
    /// The server has been closed.
    #[error("killed")]
    Killed,
}
