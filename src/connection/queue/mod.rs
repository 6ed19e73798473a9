pub(crate) mod recv;
pub(crate) mod send;

pub use self::recv::*;
pub use self::send::*;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::error::codec::EncodeError;
use crate::protocol::{MAX_FRAGS, MAX_SPLIT_SETS};
use crate::util::{u24_before, next_u24};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FragmentQueueError {
    /// The split count is zero or above [`MAX_FRAGS`].
    #[error("invalid split count {0}")]
    InvalidCount(u32),
    #[error("split index {index} is out of bounds for {count} fragments")]
    IndexOutOfBounds { index: u32, count: u32 },
    /// A fragment disagrees with the split count of its set.
    #[error("split count {got} does not match the expected {expected}")]
    CountMismatch { expected: u32, got: u32 },
}

#[derive(Debug, Error)]
pub enum SendQueueError {
    /// The frame can not fit in a single datagram.
    #[error("frame of {len} bytes does not fit in {max} bytes")]
    FrameTooLarge { len: usize, max: usize },
    /// The payload would need more than [`MAX_FRAGS`] fragments.
    #[error("payload of {0} bytes needs too many fragments")]
    PayloadTooLarge(usize),
    /// The order channel is above [`MAX_ORD_CHANS`](crate::protocol::MAX_ORD_CHANS).
    #[error("invalid order channel {0}")]
    InvalidChannel(u8),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Clone)]
struct FragmentSet {
    count: u32,
    received: u32,
    chunks: Vec<Option<Vec<u8>>>,
    created: Instant,
}

/// A specialized structure for reassembling split payloads.
///
/// Fragments are stored by split id until every index of the set has been
/// received, at which point [`FragmentQueue::pop`] hands the payload back and
/// forgets the set. A fragment arriving twice replaces the earlier copy.
///
/// At most [`MAX_SPLIT_SETS`] sets are kept at once, the oldest one is evicted
/// to make room. Abandoned sets are dropped by [`FragmentQueue::evict_stale`].
#[derive(Clone, Debug)]
pub struct FragmentQueue {
    fragments: HashMap<u16, FragmentSet>,
}

impl FragmentQueue {
    pub fn new() -> Self {
        Self {
            fragments: HashMap::new(),
        }
    }

    /// Stores `chunk` at `split_index` of the set `split_id`.
    pub fn append(
        &mut self,
        split_id: u16,
        split_count: u32,
        split_index: u32,
        chunk: Vec<u8>,
    ) -> Result<(), FragmentQueueError> {
        self.append_at(split_id, split_count, split_index, chunk, Instant::now())
    }

    /// [`FragmentQueue::append`] with an explicit arrival time.
    pub fn append_at(
        &mut self,
        split_id: u16,
        split_count: u32,
        split_index: u32,
        chunk: Vec<u8>,
        now: Instant,
    ) -> Result<(), FragmentQueueError> {
        if split_count == 0 || split_count > MAX_FRAGS {
            return Err(FragmentQueueError::InvalidCount(split_count));
        }
        if split_index >= split_count {
            return Err(FragmentQueueError::IndexOutOfBounds {
                index: split_index,
                count: split_count,
            });
        }

        if !self.fragments.contains_key(&split_id) && self.fragments.len() >= MAX_SPLIT_SETS {
            self.evict_oldest();
        }
        let set = self.fragments.entry(split_id).or_insert_with(|| FragmentSet {
            count: split_count,
            received: 0,
            chunks: vec![None; split_count as usize],
            created: now,
        });
        if set.count != split_count {
            return Err(FragmentQueueError::CountMismatch {
                expected: set.count,
                got: split_count,
            });
        }

        let slot = &mut set.chunks[split_index as usize];
        if slot.is_none() {
            set.received += 1;
        }
        *slot = Some(chunk);
        Ok(())
    }

    /// Returns the reassembled payload of `split_id` once every fragment has
    /// arrived, removing the set. Returns `None` while fragments are missing.
    pub fn pop(&mut self, split_id: u16) -> Option<Vec<u8>> {
        let set = self.fragments.get(&split_id)?;
        if set.received != set.count {
            return None;
        }
        let set = self.fragments.remove(&split_id)?;
        let mut payload = Vec::new();
        for chunk in set.chunks.into_iter().flatten() {
            payload.extend_from_slice(&chunk);
        }
        Some(payload)
    }

    /// Drops every set older than `retention`, returning how many were dropped.
    pub fn evict_stale(&mut self, now: Instant, retention: Duration) -> usize {
        let before = self.fragments.len();
        self.fragments
            .retain(|_, set| now.saturating_duration_since(set.created) < retention);
        before - self.fragments.len()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .fragments
            .iter()
            .min_by_key(|(_, set)| set.created)
            .map(|(id, _)| *id);
        if let Some(id) = oldest {
            self.fragments.remove(&id);
        }
    }

    /// The number of incomplete sets.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// This will hard clear the fragment queue.
    pub fn clear(&mut self) {
        self.fragments.clear();
    }
}

impl Default for FragmentQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered queue releases items of one channel strictly in index order.
///
/// Items are buffered by their order index until the run starting at the next
/// expected index is contiguous; [`OrderedQueue::ready`] then releases that
/// run. Indices compare on the 24 bit ring, so the channel survives wrapping.
///
/// Sequenced items skip the buffer: [`OrderedQueue::accept_sequence`] only
/// lets through items newer than the newest one seen.
#[derive(Debug, Clone)]
pub struct OrderedQueue<Item> {
    next: u32,
    buffer: HashMap<u32, Item>,
    highest_sequence: Option<u32>,
}

impl<Item> OrderedQueue<Item> {
    pub fn new() -> Self {
        Self {
            next: 0,
            buffer: HashMap::new(),
            highest_sequence: None,
        }
    }

    /// Buffers `item` under `index`. Returns `false` if the index was already
    /// released or is already buffered.
    pub fn append(&mut self, index: u32, item: Item) -> bool {
        if u24_before(index, self.next) || self.buffer.contains_key(&index) {
            return false;
        }
        self.buffer.insert(index, item);
        true
    }

    /// Releases the contiguous run starting at the expected index. Stops at
    /// the first gap and may be called again once it fills.
    pub fn ready(&mut self) -> Ready<'_, Item> {
        Ready { queue: self }
    }

    /// Whether a sequenced item with `index` is newer than anything seen on
    /// this channel. Accepting it makes it the newest.
    pub fn accept_sequence(&mut self, index: u32) -> bool {
        match self.highest_sequence {
            Some(highest) if !u24_before(highest, index) => false,
            _ => {
                self.highest_sequence = Some(index);
                true
            }
        }
    }

    /// The index the next released item must carry.
    pub fn expected(&self) -> u32 {
        self.next
    }

    /// The number of items waiting on a gap.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl<Item> Default for OrderedQueue<Item> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`OrderedQueue::ready`].
pub struct Ready<'a, Item> {
    queue: &'a mut OrderedQueue<Item>,
}

impl<Item> Iterator for Ready<'_, Item> {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        let item = self.queue.buffer.remove(&self.queue.next)?;
        self.queue.next = next_u24(self.queue.next);
        Some(item)
    }
}
