use std::sync::atomic::{AtomicU64, Ordering};

/// The single monotonically increasing process-wide version counter.
///
/// Every transaction samples it at begin (`rv`); every committing
/// read-write transaction bumps it once to obtain its write version
/// (`wv`).
#[derive(Debug)]
pub struct GlobalClock {
    value: AtomicU64,
}

impl GlobalClock {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Snapshot for a transaction's `rv`.
    pub fn snapshot(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Atomically bumps the clock and returns the new value (`wv`).
    ///
    /// Panics on overflow rather than wrapping: a wrapped version
    /// counter would make an old lock value look current again, which
    /// is a correctness bug, not a condition to paper over silently.
    pub fn advance(&self) -> u64 {
        self.value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_add(1))
            .expect("global version clock overflowed u64::MAX")
            + 1
    }
}

impl Default for GlobalClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_returns_successive_versions() {
        let clock = GlobalClock::new();
        assert_eq!(clock.snapshot(), 0);
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
        assert_eq!(clock.snapshot(), 2);
    }
}
