//! Minecraft: Bedrock Edition specifics layered on top of RakNet.
//!
//! - [`batch`]: the `0xfe` game packet envelope every MCPE payload travels in.
//! - [`motd`]: the advertisement string carried by the unconnected pong.
pub mod batch;
pub mod motd;

pub use self::batch::{Batch, BATCH_ID, MAX_BATCH_SIZE};
pub use self::motd::{Gamemode, Motd};
