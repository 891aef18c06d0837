use std::sync::atomic::{AtomicU64, Ordering};

/// The global tick counter.
///
/// One tick is one scheduler iteration; the counter is the sole source of
/// LRU ordering and trace timestamps. Only the scheduler advances it,
/// exactly once per tick, before any per-tick work. Reads are acquire and
/// the advance is a release-or-stronger read-modify-write, so every
/// component observes a tick value no newer than the scheduler's.
#[derive(Debug, Default)]
pub struct Clock(AtomicU64);

impl Clock {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Advance by one tick and return the new tick value.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Current tick value.
    pub fn now(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}
