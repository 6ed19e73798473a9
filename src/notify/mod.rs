//! A one-shot shutdown signal shared by the tasks of a [`Listener`](crate::server::Listener).
#[cfg(feature = "async_std")]
mod async_std;

#[cfg(feature = "async_tokio")]
mod tokio;

#[cfg(feature = "async_std")]
pub use self::async_std::Notify;

#[cfg(feature = "async_tokio")]
pub use self::tokio::Notify;
