use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::connection::controller::window::ReliableWindow;
use crate::protocol::frame::Frame;
use crate::protocol::MAX_ORD_CHANS;
use crate::{rak_debug, rak_debug_buffers};

use super::{FragmentQueue, OrderedQueue};

/// The receive side of a session: duplicate suppression, reassembly and
/// ordering of incoming frames.
#[derive(Debug, Clone)]
pub struct RecvQueue {
    frag_queue: FragmentQueue,
    reliable_window: ReliableWindow,
    order_channels: HashMap<u8, OrderedQueue<Vec<u8>>>,
    ready: Vec<Vec<u8>>,
}

impl RecvQueue {
    pub fn new() -> Self {
        Self {
            frag_queue: FragmentQueue::new(),
            reliable_window: ReliableWindow::new(),
            order_channels: HashMap::new(),
            ready: Vec::new(),
        }
    }

    /// Whether every reliable frame of `frames` fits in the duplicate window.
    /// A frame set that does not must be neither handled nor acknowledged,
    /// so the peer sends it again once the window has moved.
    pub fn fits_window(&self, frames: &[Frame]) -> bool {
        frames
            .iter()
            .filter_map(|frame| frame.reliable_index)
            .all(|index| !self.reliable_window.is_ahead(index))
    }

    /// Handles one frame of an incoming frame set.
    pub fn insert(&mut self, frame: Frame, now: Instant) {
        if let Some(reliable_index) = frame.reliable_index {
            if !self.reliable_window.insert(reliable_index) {
                rak_debug!(true, "Dropping duplicate reliable frame {}", reliable_index);
                return;
            }
        }

        let frame = match frame.fragment_meta {
            Some(meta) => {
                if let Err(e) =
                    self.frag_queue
                        .append_at(meta.id, meta.size, meta.index, frame.body.clone(), now)
                {
                    rak_debug!(true, "Rejected fragment {:?}: {}", meta, e);
                    return;
                }
                match self.frag_queue.pop(meta.id) {
                    Some(body) => Frame {
                        fragment_meta: None,
                        body,
                        ..frame
                    },
                    None => return,
                }
            }
            None => frame,
        };

        rak_debug_buffers!("RecvQueue: {}\n{:?}\n", frame.body.len(), frame.body);
        self.release(frame);
    }

    fn release(&mut self, frame: Frame) {
        if !frame.reliability.is_sequenced_or_ordered() {
            self.ready.push(frame.body);
            return;
        }

        let (Some(order_index), Some(channel)) = (frame.order_index, frame.order_channel) else {
            return;
        };
        if channel >= MAX_ORD_CHANS {
            rak_debug!(true, "Dropping frame on invalid channel {}", channel);
            return;
        }
        let queue = self.order_channels.entry(channel).or_default();

        if frame.reliability.is_sequenced() {
            let newer = frame
                .sequence_index
                .map_or(false, |index| queue.accept_sequence(index));
            if newer {
                self.ready.push(frame.body);
            }
        } else if queue.append(order_index, frame.body) {
            self.ready.extend(queue.ready());
        }
    }

    /// Drops fragment sets that have not completed within `retention`.
    pub fn evict_stale(&mut self, now: Instant, retention: Duration) {
        let evicted = self.frag_queue.evict_stale(now, retention);
        if evicted > 0 {
            rak_debug!(true, "Evicted {} incomplete split packets", evicted);
        }
    }

    /// Takes every payload released so far, in release order.
    pub fn flush(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.ready)
    }
}

impl Default for RecvQueue {
    fn default() -> Self {
        Self::new()
    }
}
