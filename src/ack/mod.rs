//! Acknowledgement bookkeeping of a session.
//!
//! The receive side is the [`AckTracker`]: it records the sequence number of
//! every frame set that arrives and turns them into ACK and NACK packets. The
//! send side is anything implementing [`Ackable`], reacting to the ACKs and
//! NACKs the peer sends back.
use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use crate::protocol::ack::Ack;
use crate::util::{next_u24, u24_before, u24_distance, U24_MAX};

/// How far behind the newest sequence duplicates are still detected.
pub const DATAGRAM_WINDOW: u32 = 2048;
/// The number of missing sequences remembered for the next NACK.
pub const MAX_NACK_CANDIDATES: usize = 1024;

pub trait Ackable {
    /// When an ack packet is received.
    /// Every reliable frame it covers is done with.
    fn ack(&mut self, ack: &Ack);

    /// When a nack packet is received.
    /// Returns the datagrams to resend right away.
    fn nack(&mut self, nack: &Ack, now: Instant) -> Vec<Vec<u8>>;
}

/// Tracks the frame set sequences received from a peer.
#[derive(Debug, Clone)]
pub struct AckTracker {
    /// The sequence after the newest one received.
    expected: u32,
    seen: HashSet<u32>,
    acks: Vec<u32>,
    missing: BTreeSet<u32>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self {
            expected: 0,
            seen: HashSet::new(),
            acks: Vec::new(),
            missing: BTreeSet::new(),
        }
    }

    /// Records `sequence`. Returns `false` if it is a duplicate, or too old
    /// to tell, in which case the datagram should be dropped.
    pub fn record(&mut self, sequence: u32) -> bool {
        if u24_before(sequence, self.expected) {
            if u24_distance(sequence, self.expected) > DATAGRAM_WINDOW
                || !self.seen.insert(sequence)
            {
                return false;
            }
            self.missing.remove(&sequence);
        } else {
            // everything between the newest and this one is missing
            let gap = u24_distance(self.expected, sequence) as usize;
            let skip = gap.saturating_sub(MAX_NACK_CANDIDATES);
            let mut missing = self.expected.wrapping_add(skip as u32) & U24_MAX;
            for _ in skip..gap {
                if self.missing.len() >= MAX_NACK_CANDIDATES {
                    break;
                }
                self.missing.insert(missing);
                missing = next_u24(missing);
            }
            self.seen.insert(sequence);
            self.expected = next_u24(sequence);
            self.trim();
        }
        self.acks.push(sequence);
        true
    }

    fn trim(&mut self) {
        if self.seen.len() <= DATAGRAM_WINDOW as usize * 2 {
            return;
        }
        let expected = self.expected;
        self.seen
            .retain(|seq| u24_distance(*seq, expected) <= DATAGRAM_WINDOW);
    }

    /// An ACK of every sequence recorded since the last flush.
    pub fn flush_acks(&mut self) -> Option<Ack> {
        if self.acks.is_empty() {
            return None;
        }
        Some(Ack::from_records(std::mem::take(&mut self.acks), false))
    }

    /// A NACK of every gap found since the last flush. A gap is only
    /// reported once, the peer resends its frames in new frame sets.
    pub fn flush_nacks(&mut self) -> Option<Ack> {
        if self.missing.is_empty() {
            return None;
        }
        let missing = std::mem::take(&mut self.missing);
        Some(Ack::from_records(missing.into_iter().collect(), true))
    }

    /// The number of gaps waiting to be reported.
    pub fn missing(&self) -> usize {
        self.missing.len()
    }
}

impl Default for AckTracker {
    fn default() -> Self {
        Self::new()
    }
}
