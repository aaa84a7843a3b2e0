//! Request identifiers and the counter that issues them.
//!
//! # What is a request id?
//!
//! Every outbound message carries a `req` field.  The wall copies that field
//! into its reply, which is how a reply finds its way back to the caller that
//! asked the question.  On the wire the id is a decimal string (`"1"`, `"2"`,
//! ...); in Rust it is a `u64` so ids can be compared and ordered.
//!
//! # Never reused
//!
//! The counter starts at 1 and only moves forward.  A reply that arrives late
//! can therefore never be mistaken for the answer to a newer request.  A `u64`
//! incremented once per message cannot realistically overflow.

use std::fmt;

/// Identifier correlating one outbound request with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    /// Wraps a raw counter value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Parses the string form used on the wire.
    ///
    /// Returns `None` for anything that is not exactly the string this id
    /// would be written as, so a garbage `req` field simply fails to match
    /// any pending request.  `"+7"` and `"007"` are not `"7"`.
    pub fn parse(wire: &str) -> Option<Self> {
        wire.parse::<u64>()
            .ok()
            .map(Self)
            .filter(|id| id.to_string() == wire)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of [`RequestId`]s.
///
/// The counter is owned by exactly one connection, so it needs no atomics:
/// whoever holds `&mut` is the only writer.
///
/// # Examples
///
/// ```rust
/// use wall_core::protocol::RequestIdCounter;
///
/// let mut ids = RequestIdCounter::new();
/// assert_eq!(ids.next_id().to_string(), "1");
/// assert_eq!(ids.next_id().to_string(), "2");
/// ```
#[derive(Debug)]
pub struct RequestIdCounter {
    next: u64,
}

impl RequestIdCounter {
    /// Creates a counter whose first id is `1`.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next id and advances the counter.
    pub fn next_id(&mut self) -> RequestId {
        let id = RequestId(self.next);
        self.next += 1;
        id
    }

    /// Returns the id the next call to [`next_id`](Self::next_id) will hand out.
    pub fn peek(&self) -> RequestId {
        RequestId(self.next)
    }
}

impl Default for RequestIdCounter {
    fn default() -> Self {
        Self::new()
    }
}
