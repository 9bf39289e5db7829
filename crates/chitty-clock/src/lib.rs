//! Scalar Lamport clock for Chitty.
//!
//! The relay keeps one logical clock for the whole process. It is a
//! single counter, not a vector clock: it gives every relayed message a
//! timestamp that is strictly greater than anything the relay has stamped
//! or observed before, which is enough to order a chat transcript.
//!
//! The rules are the classic three:
//!
//! 1. Local work (a join, a leave) advances the counter: [`LamportClock::tick`].
//! 2. A message carries the counter value it was stamped with.
//! 3. On receipt, take the max of our counter and the message's, then
//!    advance: [`LamportClock::receive`].
//!
//! # Concurrency
//!
//! `LamportClock` is a plain value with `&mut self` methods. It is owned
//! by the relay actor, which serializes every join, leave and message, so
//! no atomics or locks are needed here.

use tracing::trace;

/// A monotonically non-decreasing logical counter.
///
/// ```rust
/// use chitty_clock::LamportClock;
///
/// let mut clock = LamportClock::new();
/// assert_eq!(clock.tick(), 1);        // someone joined
/// assert_eq!(clock.receive(10), 11);  // a message stamped 10 arrived
/// assert_eq!(clock.receive(3), 12);   // stale stamps never move us back
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LamportClock {
    counter: u64,
}

impl LamportClock {
    /// Creates a clock at logical time 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current logical time without advancing it.
    pub fn now(&self) -> u64 {
        self.counter
    }

    /// Advances the clock by one and returns the new value.
    ///
    /// Saturates at `u64::MAX`; overflow is not a practical concern for
    /// a chat server.
    pub fn tick(&mut self) -> u64 {
        self.counter = self.counter.saturating_add(1);
        trace!(logical_time = self.counter, "clock tick");
        self.counter
    }

    /// Moves the clock forward to `remote` if it is ahead. Never moves
    /// the clock backwards.
    pub fn observe(&mut self, remote: u64) {
        if remote > self.counter {
            trace!(from = self.counter, to = remote, "clock jumped forward");
            self.counter = remote;
        }
    }

    /// The message-receipt rule: `observe(remote)` then `tick()`.
    ///
    /// The returned value is strictly greater than both the previous
    /// counter and `remote` (short of saturation).
    pub fn receive(&mut self, remote: u64) -> u64 {
        self.observe(remote);
        self.tick()
    }
}
