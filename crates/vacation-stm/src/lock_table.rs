use std::sync::atomic::{AtomicU64, Ordering};

/// `2^20` stripes by default — enough that the reservation and
/// ordered-map workload in this crate's companion crates sees little
/// false sharing between unrelated slots while keeping the table a
/// fixed, cheap-to-allocate size.
pub const DEFAULT_STRIPE_BITS: u32 = 20;

const ALIGN_SHIFT: u32 = 3;
const MAX_LOCK_ATTEMPTS: u32 = 32;

/// Encodes "unlocked, at version `v`" as `v << 1` and "locked by
/// transaction `id`" as `(id << 1) | 1`.
#[inline]
pub fn is_locked(raw: u64) -> bool {
    raw & 1 == 1
}

#[inline]
pub fn version_of(raw: u64) -> u64 {
    raw >> 1
}

#[inline]
fn locked_value(owner: u64) -> u64 {
    (owner << 1) | 1
}

/// A fixed array of versioned locks. Every [`crate::TVar`] hashes onto
/// exactly one stripe by address; many `TVar`s share a stripe, which is
/// the point — a stripe lock table is a fixed-size structure, unlike a
/// per-word lock which would grow with the heap.
pub struct StripeLockTable {
    stripes: Box<[AtomicU64]>,
    mask: usize,
}

impl StripeLockTable {
    pub fn new(stripe_bits: u32) -> Self {
        let len = 1usize << stripe_bits;
        let stripes = (0..len).map(|_| AtomicU64::new(0)).collect();
        Self {
            stripes,
            mask: len - 1,
        }
    }

    /// Maps a `TVar`'s address to a stripe index.
    pub fn stripe_for(&self, addr: usize) -> usize {
        (addr >> ALIGN_SHIFT) & self.mask
    }

    /// Raw load of a stripe's versioned-lock word.
    pub fn load(&self, stripe: usize) -> u64 {
        self.stripes[stripe].load(Ordering::Acquire)
    }

    /// Attempts to flip stripe `stripe` from unlocked to
    /// locked-by-`owner`, retrying a bounded number of times if another
    /// transaction holds it only briefly. Returns the prior (unlocked)
    /// value on success, so the caller can restore it verbatim on
    /// abort.
    pub fn try_lock(&self, stripe: usize, owner: u64) -> Option<u64> {
        for _ in 0..MAX_LOCK_ATTEMPTS {
            let current = self.stripes[stripe].load(Ordering::Acquire);
            if is_locked(current) {
                std::hint::spin_loop();
                continue;
            }
            let desired = locked_value(owner);
            match self.stripes[stripe].compare_exchange(
                current,
                desired,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(current),
                Err(_) => continue,
            }
        }
        None
    }

    /// Restores a stripe to an explicit raw value (used to release a
    /// lock back to its pre-commit version on abort).
    pub fn restore(&self, stripe: usize, raw: u64) {
        self.stripes[stripe].store(raw, Ordering::Release);
    }

    /// Releases a stripe by publishing it unlocked at version `wv`.
    pub fn unlock_at_version(&self, stripe: usize, wv: u64) {
        self.stripes[stripe].store(wv << 1, Ordering::Release);
    }
}
