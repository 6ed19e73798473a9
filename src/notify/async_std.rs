use async_std::channel::{Receiver, Sender};

/// Notify wraps a channel that is never written to. Closing it wakes every
/// waiter at once.
#[derive(Clone)]
pub struct Notify(Sender<()>, Receiver<()>);

impl Notify {
    pub fn new() -> Self {
        let (send, recv) = async_std::channel::bounded(1);
        Self(send, recv)
    }

    /// Wakes every waiter. Returns `false` if this was already done.
    pub fn notify(&self) -> bool {
        self.0.close()
    }

    pub fn is_notified(&self) -> bool {
        self.0.is_closed()
    }

    /// Waits until [`Notify::notify`] is called.
    pub async fn wait(&self) -> bool {
        self.1.recv().await.is_err()
    }
}

impl Default for Notify {
    fn default() -> Self {
        Self::new()
    }
}
