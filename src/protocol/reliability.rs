/// The delivery guarantee of a frame. Encoded in the top three bits of the
/// frame flags.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reliability {
    /// Unreliable (with no ack)
    Unreliable = 0,
    /// Unreliable with a sequence
    UnreliableSeq,
    /// Reliable
    Reliable,
    /// Reliably ordered
    ReliableOrd,
    /// Reliably sequenced
    ReliableSeq,
    /// never used over the wire
    UnreliableAck,
    /// never used over the wire
    ReliableAck,
    /// never used over the wire
    ReliableOrdAck,
}

impl Reliability {
    pub fn from_flags(flags: u8) -> Self {
        match (flags & 0xe0) >> 5 {
            0 => Reliability::Unreliable,
            1 => Reliability::UnreliableSeq,
            2 => Reliability::Reliable,
            3 => Reliability::ReliableOrd,
            4 => Reliability::ReliableSeq,
            5 => Reliability::UnreliableAck,
            6 => Reliability::ReliableAck,
            _ => Reliability::ReliableOrdAck,
        }
    }

    pub fn to_flags(&self) -> u8 {
        (*self as u8) << 5
    }

    /// Whether or not the frame is released in order on its channel.
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::ReliableOrd | Self::ReliableOrdAck)
    }

    /// Whether or not the frame carries a reliable index and is resent until
    /// acknowledged.
    pub fn is_reliable(&self) -> bool {
        matches!(
            self,
            Self::Reliable
                | Self::ReliableOrd
                | Self::ReliableSeq
                | Self::ReliableAck
                | Self::ReliableOrdAck
        )
    }

    pub fn is_unreliable(&self) -> bool {
        !self.is_reliable()
    }

    /// Whether or not the frame carries a sequence index. Older sequenced
    /// frames are dropped by the receiver.
    pub fn is_sequenced(&self) -> bool {
        matches!(self, Self::UnreliableSeq | Self::ReliableSeq)
    }

    /// Whether or not the frame carries an order index and channel.
    pub fn is_sequenced_or_ordered(&self) -> bool {
        self.is_sequenced() || self.is_ordered()
    }

    /// The reliability a split payload is sent with. Fragments must all
    /// arrive, so unreliable classes become their reliable counterpart.
    pub fn upgrade(&self) -> Self {
        match self {
            Self::Unreliable => Self::Reliable,
            Self::UnreliableSeq => Self::ReliableSeq,
            Self::UnreliableAck => Self::ReliableAck,
            other => *other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Reliability;

    #[test]
    fn flags_round_trip() {
        for bits in 0..8u8 {
            let reliability = Reliability::from_flags((bits << 5) | 0x10);
            assert_eq!(reliability.to_flags(), bits << 5);
        }
    }

    #[test]
    fn classes() {
        assert!(Reliability::ReliableOrd.is_ordered());
        assert!(!Reliability::UnreliableSeq.is_ordered());
        assert!(Reliability::UnreliableSeq.is_sequenced_or_ordered());
        assert!(Reliability::Unreliable.is_unreliable());
        assert_eq!(Reliability::Unreliable.upgrade(), Reliability::Reliable);
        assert_eq!(Reliability::ReliableOrd.upgrade(), Reliability::ReliableOrd);
    }
}
