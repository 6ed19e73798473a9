use tokio::sync::watch::{Receiver, Sender};

/// Notify wraps a watch channel flipped to `true` once. Every waiter holds
/// its own receiver, so any number of tasks may wait at the same time.
pub struct Notify(Sender<bool>, Receiver<bool>);

impl Notify {
    pub fn new() -> Self {
        let (send, recv) = tokio::sync::watch::channel(false);
        Self(send, recv)
    }

    /// Wakes every waiter. Returns `false` if this was already done.
    pub fn notify(&self) -> bool {
        !self.0.send_replace(true)
    }

    pub fn is_notified(&self) -> bool {
        *self.1.borrow()
    }

    /// Waits until [`Notify::notify`] is called.
    pub async fn wait(&self) -> bool {
        let mut receiver = self.1.clone();
        receiver.wait_for(|notified| *notified).await.is_ok()
    }
}

impl Default for Notify {
    fn default() -> Self {
        Self::new()
    }
}
