pub mod debug;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// The largest value a 24 bit sequence number can hold.
pub const U24_MAX: u32 = 0x00ff_ffff;

/// Formats an address the way every log line in this crate prefixes it.
pub fn to_address_token(remote: SocketAddr) -> String {
    format!("{}:{}", remote.ip(), remote.port())
}

/// Milliseconds elapsed between `epoch` and `now`, as carried by the
/// ping and connection timestamps.
pub fn millis_since(epoch: Instant, now: Instant) -> u64 {
    now.saturating_duration_since(epoch).as_millis() as u64
}

/// Returns `true` once `interval` has passed since `since`.
pub fn elapsed(since: Instant, now: Instant, interval: Duration) -> bool {
    now.saturating_duration_since(since) >= interval
}

/// Increments a 24 bit counter, wrapping back to zero.
pub fn next_u24(value: u32) -> u32 {
    value.wrapping_add(1) & U24_MAX
}

/// Distance from `from` forward to `to` on the 24 bit ring.
pub fn u24_distance(from: u32, to: u32) -> u32 {
    to.wrapping_sub(from) & U24_MAX
}

/// Whether `a` comes strictly before `b` on the 24 bit ring.
///
/// Half of the ring ahead of `a` is considered "after" it.
pub fn u24_before(a: u32, b: u32) -> bool {
    let distance = u24_distance(a, b);
    distance != 0 && distance < (U24_MAX + 1) / 2
}
