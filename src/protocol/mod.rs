//! The RakNet wire protocol: packets, frames, acknowledgements and the MCPE
//! envelope carried on top of them.
//!
//! Nothing in here holds connection state; see [`connection`](crate::connection)
//! for that.
pub mod ack;
pub mod frame;
pub mod magic;
pub mod mcpe;
pub mod packet;
pub mod reliability;

pub use magic::*;

/// The maximum amount of fragments a single split packet may have.
pub const MAX_FRAGS: u32 = 1024;
/// The maximum amount of ordering channels a session has.
pub const MAX_ORD_CHANS: u8 = 32;
/// The number of split packets a session reassembles at once.
pub const MAX_SPLIT_SETS: usize = 32;

/// IP + UDP header overhead of every datagram.
pub const UDP_HEADER_SIZE: u16 = 28;
/// Tag byte and U24 sequence number in front of every frame set.
pub const FRAME_SET_HEADER_SIZE: u16 = 4;
/// The largest header a single frame can carry (every index and the split
/// triple present).
pub const MAX_FRAME_HEADER_SIZE: u16 = 23;

/// The smallest MTU a session will be negotiated down to.
pub const MIN_MTU: u16 = 400;
/// The largest MTU a session will be negotiated up to.
pub const MAX_MTU: u16 = 1492;

/// The number of sequences a single ack packet may acknowledge. Ranges
/// covering more than this are truncated.
pub const MAX_ACK_SEQUENCES: usize = 8192;
