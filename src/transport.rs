//! What the engine needs from its surroundings besides bytes: time and randomness.
//!
//! The engine performs no I/O. Transport bytes reach it through
//! [`Channel::received`](crate::Channel::received) and leave through
//! [`ChannelHandler::on_output_ready`](crate::ChannelHandler::on_output_ready).

use std::time::{SystemTime, UNIX_EPOCH};

/// Timestamp in microseconds from an arbitrary epoch.
/// Used for session creation and expiry.
pub type Instant = u64;

/// Microseconds per second, for converting lifetimes.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Clock for session expiry.
pub trait Clock: Send + Sync {
    /// Current time in microseconds from an arbitrary epoch.
    fn now(&self) -> Instant;
}

/// Wall clock: microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as Instant)
            .unwrap_or(0)
    }
}

/// Random bytes for hello randoms, ECDHE secrets and session identifiers.
///
/// Must be a cryptographic RNG outside of tests.
pub trait Rng {
    /// Fill `buf` with random bytes.
    fn fill(&mut self, buf: &mut [u8]);
}

impl<R: Rng + ?Sized> Rng for &mut R {
    fn fill(&mut self, buf: &mut [u8]) {
        (**self).fill(buf)
    }
}
