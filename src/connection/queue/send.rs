use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};

use super::SendQueueError;
use crate::ack::Ackable;
use crate::codec::Writer;
use crate::error::EncodeError;
use crate::protocol::ack::Ack;
use crate::protocol::frame::{Frame, FrameSet};
use crate::protocol::reliability::Reliability;
use crate::protocol::{
    FRAME_SET_HEADER_SIZE, MAX_FRAGS, MAX_FRAME_HEADER_SIZE, MAX_ORD_CHANS, UDP_HEADER_SIZE,
};
use crate::rak_debug;
use crate::util::next_u24;

/// Sent datagrams are remembered for this many resend intervals, after which
/// an ACK or NACK of their sequence is ignored.
pub const DATAGRAM_RETENTION_FACTOR: u32 = 4;

/// A frame waiting for its send time.
#[derive(Debug)]
struct Scheduled {
    at: Instant,
    order: u64,
    frame: Frame,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.order == other.order
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // reversed, the heap pops the earliest entry first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// The reliable frames a frame set carried.
#[derive(Debug, Clone)]
struct SentDatagram {
    at: Instant,
    frames: Vec<Frame>,
}

/// This queue schedules every frame a session sends.
///
/// Frames wait in a heap ordered by send time. Each [`SendQueue::pass`] sends
/// the due ones packed into MTU sized frame sets, and schedules reliable
/// frames again one resend interval later until they are acknowledged.
///
/// Acknowledged frames are not searched for in the heap. [`SendQueue::discard`]
/// only marks their reliable index, and the entry is dropped the next time it
/// comes due. This keeps discarding constant time at the cost of holding an
/// acknowledged frame for at most one more resend interval.
#[derive(Debug)]
pub struct SendQueue {
    mtu: u16,
    resend_interval: Duration,
    heap: BinaryHeap<Scheduled>,
    /// Insertion counter, breaking ties between equal send times.
    order: u64,
    /// Reliable indices with a live entry in the heap.
    pending: HashSet<u32>,
    /// Reliable indices acknowledged while their entry is still in the heap.
    discarded: HashSet<u32>,
    /// The reliable frames of every recent frame set, by sequence.
    sent: HashMap<u32, SentDatagram>,
    send_seq: u32,
    reliable_seq: u32,
    order_seq: [u32; MAX_ORD_CHANS as usize],
    sequence_seq: [u32; MAX_ORD_CHANS as usize],
    split_id: u16,
}

impl SendQueue {
    pub fn new(mtu: u16, resend_interval: Duration) -> Self {
        Self {
            mtu,
            resend_interval,
            heap: BinaryHeap::new(),
            order: 0,
            pending: HashSet::new(),
            discarded: HashSet::new(),
            sent: HashMap::new(),
            send_seq: 0,
            reliable_seq: 0,
            order_seq: [0; MAX_ORD_CHANS as usize],
            sequence_seq: [0; MAX_ORD_CHANS as usize],
            split_id: 0,
        }
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn set_mtu(&mut self, mtu: u16) {
        self.mtu = mtu;
    }

    /// The largest frame set this queue sends.
    pub fn max_datagram(&self) -> usize {
        self.mtu.saturating_sub(UDP_HEADER_SIZE) as usize
    }

    /// The largest body a frame can carry without being split.
    pub fn max_frame_body(&self) -> usize {
        self.max_datagram()
            .saturating_sub((FRAME_SET_HEADER_SIZE + MAX_FRAME_HEADER_SIZE) as usize)
    }

    /// Schedules `frame` to be sent `delay` after `now`. Reliable frames must
    /// already carry their reliable index.
    pub fn push(&mut self, frame: Frame, delay: Duration, now: Instant) -> Result<(), SendQueueError> {
        let max = self
            .max_datagram()
            .saturating_sub(FRAME_SET_HEADER_SIZE as usize);
        if frame.encoded_len() > max {
            return Err(SendQueueError::FrameTooLarge {
                len: frame.encoded_len(),
                max,
            });
        }
        if frame.reliability.is_reliable() {
            let index = frame
                .reliable_index
                .ok_or(EncodeError::MissingField("reliable_index"))?;
            self.pending.insert(index);
        }
        self.schedule(frame, now + delay);
        Ok(())
    }

    fn schedule(&mut self, frame: Frame, at: Instant) {
        self.order += 1;
        self.heap.push(Scheduled {
            at,
            order: self.order,
            frame,
        });
    }

    /// Wraps `payload` in frames, assigning its reliable, order and sequence
    /// indices, and schedules them for the next pass. Payloads larger than a
    /// single frame are split, unreliable ones being upgraded to their
    /// reliable counterpart.
    pub fn insert(
        &mut self,
        payload: &[u8],
        reliability: Reliability,
        channel: u8,
        now: Instant,
    ) -> Result<(), SendQueueError> {
        for frame in self.frames_for(payload, reliability, channel)? {
            self.push(frame, Duration::ZERO, now)?;
        }
        Ok(())
    }

    /// Encodes `payload` into frame sets right away, leaving the heap
    /// untouched. Nothing is scheduled for a resend.
    pub fn encode_now(
        &mut self,
        payload: &[u8],
        reliability: Reliability,
        channel: u8,
        now: Instant,
    ) -> Result<Vec<Vec<u8>>, SendQueueError> {
        let frames = self.frames_for(payload, reliability, channel)?;
        Ok(self.pack(frames, now))
    }

    fn frames_for(
        &mut self,
        payload: &[u8],
        reliability: Reliability,
        channel: u8,
    ) -> Result<Vec<Frame>, SendQueueError> {
        if channel >= MAX_ORD_CHANS {
            return Err(SendQueueError::InvalidChannel(channel));
        }
        let max_body = self.max_frame_body();
        let needs_split = payload.len() > max_body;
        if needs_split && (max_body == 0 || payload.len().div_ceil(max_body) > MAX_FRAGS as usize) {
            return Err(SendQueueError::PayloadTooLarge(payload.len()));
        }

        let reliability = if needs_split {
            reliability.upgrade()
        } else {
            reliability
        };

        let ch = channel as usize;
        let mut order_index = None;
        let mut sequence_index = None;
        if reliability.is_sequenced() {
            // sequenced frames share the current order index
            order_index = Some(self.order_seq[ch]);
            sequence_index = Some(self.sequence_seq[ch]);
            self.sequence_seq[ch] = next_u24(self.sequence_seq[ch]);
        } else if reliability.is_ordered() {
            order_index = Some(self.order_seq[ch]);
            self.order_seq[ch] = next_u24(self.order_seq[ch]);
        }

        let mut frames = if needs_split {
            let id = self.split_id;
            self.split_id = self.split_id.wrapping_add(1);
            Frame::partition(payload, reliability, id, max_body)
        } else {
            vec![Frame::new(reliability, payload.to_vec())]
        };

        for frame in frames.iter_mut() {
            if reliability.is_reliable() {
                frame.reliable_index = Some(self.reliable_seq);
                self.reliable_seq = next_u24(self.reliable_seq);
            }
            if reliability.is_sequenced_or_ordered() {
                frame.order_index = order_index;
                frame.sequence_index = sequence_index;
                frame.order_channel = Some(channel);
            }
        }
        Ok(frames)
    }

    /// Marks `reliable_index` as acknowledged. Its entry is dropped the next
    /// time it comes due. Discarding an index twice, or one that is not
    /// pending, does nothing.
    pub fn discard(&mut self, reliable_index: u32) {
        if self.pending.contains(&reliable_index) {
            self.discarded.insert(reliable_index);
        }
    }

    /// Whether `reliable_index` is still going to be resent.
    pub fn is_pending(&self, reliable_index: u32) -> bool {
        self.pending.contains(&reliable_index) && !self.discarded.contains(&reliable_index)
    }

    /// Sends every frame that is due, returning the encoded frame sets.
    pub fn pass(&mut self, now: Instant) -> Vec<Vec<u8>> {
        let mut due = Vec::new();
        while self.heap.peek().map_or(false, |entry| entry.at <= now) {
            let Some(entry) = self.heap.pop() else {
                break;
            };
            if let Some(index) = entry.frame.reliable_index {
                if self.discarded.remove(&index) {
                    self.pending.remove(&index);
                    continue;
                }
            }
            due.push(entry.frame);
        }

        // rescheduled after draining, a zero interval would spin otherwise
        let resend_at = now + self.resend_interval;
        for frame in due.iter().filter(|f| f.reliability.is_reliable()) {
            self.schedule(frame.clone(), resend_at);
        }

        let datagrams = self.pack(due, now);
        self.prune(now);
        datagrams
    }

    /// Packs `frames` into as few frame sets as the MTU allows.
    fn pack(&mut self, frames: Vec<Frame>, now: Instant) -> Vec<Vec<u8>> {
        let budget = self.max_datagram();
        let mut datagrams = Vec::new();
        let mut current = Vec::new();
        let mut size = FRAME_SET_HEADER_SIZE as usize;

        for frame in frames {
            let len = frame.encoded_len();
            if !current.is_empty() && size + len > budget {
                datagrams.extend(self.flush(std::mem::take(&mut current), now));
                size = FRAME_SET_HEADER_SIZE as usize;
            }
            size += len;
            current.push(frame);
        }
        if !current.is_empty() {
            datagrams.extend(self.flush(current, now));
        }
        datagrams
    }

    fn flush(&mut self, frames: Vec<Frame>, now: Instant) -> Option<Vec<u8>> {
        let sequence = self.send_seq;
        self.send_seq = next_u24(self.send_seq);

        let reliable: Vec<Frame> = frames
            .iter()
            .filter(|f| f.reliability.is_reliable())
            .cloned()
            .collect();
        match FrameSet::new(sequence, frames).write_to_bytes() {
            Ok(bytes) => {
                if !reliable.is_empty() {
                    self.sent.insert(
                        sequence,
                        SentDatagram {
                            at: now,
                            frames: reliable,
                        },
                    );
                }
                Some(bytes)
            }
            Err(e) => {
                rak_debug!("Failed to encode frame set {}: {}", sequence, e);
                None
            }
        }
    }

    fn prune(&mut self, now: Instant) {
        let retention = self.resend_interval * DATAGRAM_RETENTION_FACTOR;
        self.sent
            .retain(|_, datagram| now.saturating_duration_since(datagram.at) <= retention);
    }

    /// The number of frames waiting in the heap, discarded ones included.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The sequence the next frame set will carry.
    pub fn next_seq(&self) -> u32 {
        self.send_seq
    }
}

impl Ackable for SendQueue {
    fn ack(&mut self, ack: &Ack) {
        if ack.is_nack() {
            return;
        }

        for sequence in ack.sequences() {
            if let Some(datagram) = self.sent.remove(&sequence) {
                for index in datagram.frames.iter().filter_map(|f| f.reliable_index) {
                    self.discard(index);
                }
            }
        }
    }

    fn nack(&mut self, nack: &Ack, now: Instant) -> Vec<Vec<u8>> {
        if !nack.is_nack() {
            return Vec::new();
        }

        let mut resend = Vec::new();
        for sequence in nack.sequences() {
            if let Some(datagram) = self.sent.remove(&sequence) {
                resend.extend(
                    datagram
                        .frames
                        .into_iter()
                        .filter(|f| f.reliable_index.map_or(false, |i| self.is_pending(i))),
                );
            }
        }
        self.pack(resend, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Reader;

    const MTU: u16 = 500;

    fn queue() -> SendQueue {
        SendQueue::new(MTU, Duration::from_secs(1))
    }

    fn decode(bytes: &[u8]) -> FrameSet {
        FrameSet::read_from_slice(bytes).unwrap()
    }

    #[test]
    fn empty_pass_sends_nothing() {
        let mut queue = queue();
        assert!(queue.pass(Instant::now()).is_empty());
        assert_eq!(queue.next_seq(), 0);
    }

    #[test]
    fn encode_now_bypasses_the_heap() {
        let now = Instant::now();
        let mut queue = queue();
        queue.insert(&[1; 10], Reliability::ReliableOrd, 0, now).unwrap();
        let sent = queue.encode_now(&[2; 10], Reliability::ReliableOrd, 0, now).unwrap();
        assert_eq!(sent.len(), 1);

        let set = decode(&sent[0]);
        assert_eq!(set.frames.len(), 1);
        assert_eq!(set.frames[0].body, vec![2; 10]);
        assert_eq!(set.frames[0].reliable_index, Some(1));
        assert_eq!(set.frames[0].order_index, Some(1));
        // only the scheduled frame is waiting
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn small_frames_share_a_datagram() {
        let now = Instant::now();
        let mut queue = queue();
        queue.insert(&[1; 10], Reliability::Unreliable, 0, now).unwrap();
        queue.insert(&[2; 10], Reliability::ReliableOrd, 0, now).unwrap();
        queue.insert(&[3; 10], Reliability::ReliableOrd, 0, now).unwrap();

        let sent = queue.pass(now);
        assert_eq!(sent.len(), 1);
        let set = decode(&sent[0]);
        assert_eq!(set.sequence, 0);
        assert_eq!(set.frames.len(), 3);
        assert_eq!(set.frames[1].reliable_index, Some(0));
        assert_eq!(set.frames[1].order_index, Some(0));
        assert_eq!(set.frames[2].reliable_index, Some(1));
        assert_eq!(set.frames[2].order_index, Some(1));
        // only the reliable frames come back
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn delayed_frames_wait() {
        let now = Instant::now();
        let mut queue = queue();
        let mut frame = Frame::new(Reliability::Unreliable, vec![1]);
        queue.push(frame.clone(), Duration::from_millis(100), now).unwrap();
        assert!(queue.pass(now).is_empty());
        assert_eq!(queue.pass(now + Duration::from_millis(100)).len(), 1);

        frame.body = vec![0; MTU as usize];
        assert!(matches!(
            queue.push(frame, Duration::ZERO, now),
            Err(SendQueueError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn large_payloads_are_split_and_upgraded() {
        let now = Instant::now();
        let mut queue = queue();
        let payload: Vec<u8> = (0..1200u32).map(|i| i as u8).collect();
        queue.insert(&payload, Reliability::Unreliable, 0, now).unwrap();

        let sent = queue.pass(now);
        let frames: Vec<Frame> = sent.iter().flat_map(|d| decode(d).frames).collect();
        assert!(frames.len() > 1);
        let mut body = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.reliability, Reliability::Reliable);
            assert_eq!(frame.reliable_index, Some(i as u32));
            assert_eq!(frame.fragment_meta.unwrap().index, i as u32);
            body.extend_from_slice(&frame.body);
        }
        assert_eq!(body, payload);
        for datagram in &sent {
            assert!(datagram.len() <= queue.max_datagram());
        }
    }

    #[test]
    fn split_ordered_payloads_share_one_order_index() {
        let now = Instant::now();
        let mut queue = queue();
        queue.insert(&[0; 1000], Reliability::ReliableOrd, 4, now).unwrap();
        queue.insert(&[1], Reliability::ReliableOrd, 4, now).unwrap();
        let frames: Vec<Frame> = queue
            .pass(now)
            .iter()
            .flat_map(|d| decode(d).frames)
            .collect();
        let (split, single): (Vec<_>, Vec<_>) = frames.iter().partition(|f| f.is_fragmented());
        assert!(split.iter().all(|f| f.order_index == Some(0) && f.order_channel == Some(4)));
        assert_eq!(single[0].order_index, Some(1));
    }

    #[test]
    fn reliable_frames_resend_until_acked() {
        let now = Instant::now();
        let resend = Duration::from_secs(1);
        let mut queue = queue();
        queue.insert(&[7; 4], Reliability::Reliable, 0, now).unwrap();

        let first = queue.pass(now);
        assert_eq!(first.len(), 1);
        assert!(queue.pass(now + resend / 2).is_empty());
        let second = queue.pass(now + resend);
        assert_eq!(second.len(), 1);
        assert_eq!(decode(&second[0]).sequence, 1);
        assert_eq!(decode(&second[0]).frames, decode(&first[0]).frames);

        queue.ack(&Ack::from_records(vec![1], false));
        assert!(!queue.is_pending(0));
        assert!(queue.pass(now + resend * 2).is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn discard_is_idempotent() {
        let now = Instant::now();
        let mut queue = queue();
        queue.insert(&[1], Reliability::Reliable, 0, now).unwrap();
        queue.discard(0);
        queue.discard(0);
        // unknown indices are ignored
        queue.discard(42);
        assert!(queue.pass(now).is_empty());
        queue.discard(0);
        assert!(queue.is_empty());
    }

    #[test]
    fn nack_resends_immediately() {
        let now = Instant::now();
        let mut queue = queue();
        queue.insert(&[1], Reliability::Reliable, 0, now).unwrap();
        queue.insert(&[2], Reliability::Unreliable, 0, now).unwrap();
        queue.pass(now);

        let resent = queue.nack(&Ack::from_records(vec![0], true), now);
        assert_eq!(resent.len(), 1);
        let set = decode(&resent[0]);
        assert_eq!(set.sequence, 1);
        assert_eq!(set.frames.len(), 1);
        assert_eq!(set.frames[0].body, vec![1]);

        // an ack is not a nack
        assert!(queue.nack(&Ack::from_records(vec![1], false), now).is_empty());
    }

    #[test]
    fn invalid_channels_are_rejected() {
        let mut queue = queue();
        assert!(matches!(
            queue.insert(&[1], Reliability::ReliableOrd, MAX_ORD_CHANS, Instant::now()),
            Err(SendQueueError::InvalidChannel(_))
        ));
    }
}
