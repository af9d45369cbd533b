//! Version clock for stamping mutations.
//!
//! Stamps are microseconds on a monotonic timeline anchored when the clock is
//! created. They never go backwards when the wall clock is adjusted, and every
//! call to [`VersionClock::now`] returns a value strictly greater than the last.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Opaque version stamp. Clients echo the last one they received as their cursor.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Stamp(pub u64);

impl Stamp {
    /// The cursor of a client that has never synced.
    pub const ZERO: Stamp = Stamp(0);

    /// Whether this is the initial (unset) cursor.
    pub fn is_initial(self) -> bool {
        self.0 == 0
    }

    /// Stamp `duration` earlier on the same timeline, clamped at zero.
    pub fn saturating_sub(self, duration: Duration) -> Stamp {
        Stamp(self.0.saturating_sub(duration_micros(duration)))
    }

    /// Stamp `duration` later on the same timeline.
    pub fn saturating_add(self, duration: Duration) -> Stamp {
        Stamp(self.0.saturating_add(duration_micros(duration)))
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn duration_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Produces strictly increasing [`Stamp`]s.
#[derive(Debug)]
pub struct VersionClock {
    origin: Instant,
    base: u64,
    last: AtomicU64,
}

impl Default for VersionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionClock {
    /// Create a clock whose first stamp is 1.
    pub fn new() -> Self {
        Self::starting_at(Stamp(1))
    }

    /// Create a clock whose timeline starts at `start`.
    ///
    /// Used to resume above the highest stamp held by a durable store.
    pub fn starting_at(start: Stamp) -> Self {
        let base = start.0.max(1);
        Self {
            origin: Instant::now(),
            base,
            last: AtomicU64::new(base - 1),
        }
    }

    /// Next stamp. Strictly greater than every stamp returned before.
    pub fn now(&self) -> Stamp {
        let candidate = self.base.saturating_add(duration_micros(self.origin.elapsed()));
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let next = candidate.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Stamp(next),
                Err(actual) => last = actual,
            }
        }
    }

    /// The most recently issued stamp (or just below the start if none yet).
    pub fn last(&self) -> Stamp {
        Stamp(self.last.load(Ordering::Acquire))
    }
}
