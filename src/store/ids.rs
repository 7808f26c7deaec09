//! Record id allocation
//!
//! One allocator per store. Ids are strictly increasing for the lifetime
//! of the allocator and are never reused. On open the allocator is seeded
//! past the highest id found on disk. `u64::MAX` is never handed out; once
//! the allocator reaches it, allocation fails.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic record id allocator
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Creates an allocator whose first id is `first`
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Returns a fresh id, or `None` once the id space is used up.
    pub fn allocate(&self) -> Option<u64> {
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| next.checked_add(1))
            .ok()
    }

    /// Moves the allocator past an id that was assigned elsewhere, so it is
    /// never handed out.
    pub fn observe(&self, id: u64) {
        self.next.fetch_max(id.saturating_add(1), Ordering::AcqRel);
    }

    /// The id the next `allocate` call will return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Acquire)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}
