//! Thread-safe counter labelling connection attempts.
//!
//! Every time a session needs a transport it asks the counter for a fresh
//! [`AttemptId`].  The id travels with the in-flight handshake and comes back
//! with its result, so the state machine can recognise a result that belongs
//! to an attempt the caller has since abandoned (for example after an explicit
//! `disconnect()` while the handshake was still pending).
//!
//! The counter uses an `AtomicU64`, so concurrent callers never receive the
//! same id and never block each other.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a single connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A thread-safe, monotonically increasing source of [`AttemptId`]s.
///
/// Ids start at 0 and wrap around at `u64::MAX` without panicking.
///
/// # Examples
///
/// ```rust
/// use tv_remote_core::{AttemptCounter, AttemptId};
///
/// let counter = AttemptCounter::new();
/// assert_eq!(counter.next(), AttemptId(0));
/// assert_eq!(counter.next(), AttemptId(1));
/// ```
pub struct AttemptCounter {
    inner: AtomicU64,
}

impl AttemptCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(0),
        }
    }

    /// Returns the next attempt id and atomically advances the counter.
    ///
    /// `Relaxed` ordering is enough: the id only has to be unique, it does not
    /// publish any other memory.
    pub fn next(&self) -> AttemptId {
        AttemptId(self.inner.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for AttemptCounter {
    fn default() -> Self {
        Self::new()
    }
}
