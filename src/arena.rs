//! Capacity-bounded bump allocators.
//!
//! The original manages two allocators: row storage for the pixel grid
//! and the reverse-cell-graph parent lists, each backed by fixed-size
//! chunks (≤ 1 GiB, or ≤ 512 MiB under the `small-arena` feature) with no
//! individual free — only release of the whole arena. This port keeps
//! that contract (fixed capacity, append-only, bulk release via `Drop`)
//! but tracks it as a plain byte counter over ordinary `Vec` storage
//! rather than hand-rolled pointer bumping, since nothing here needs the
//! allocations to be contiguous across objects — only capacity-bounded.

use crate::error::{EngineError, EngineResult};

#[cfg(feature = "small-arena")]
pub const DEFAULT_ARENA_CAPACITY: usize = 512 * 1024 * 1024;
#[cfg(not(feature = "small-arena"))]
pub const DEFAULT_ARENA_CAPACITY: usize = 1024 * 1024 * 1024;

/// A bump allocator that only tracks how many bytes have been claimed
/// against a fixed capacity; it never supports freeing a single
/// allocation. Drop the `Arena` (or call [`Arena::reset`]) to release
/// everything at once.
#[derive(Debug)]
pub struct Arena {
    name: &'static str,
    capacity: usize,
    used: usize,
}

impl Arena {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Arena {
            name,
            capacity,
            used: 0,
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reserve `bytes` against the capacity cap. Returns
    /// `ArenaExhausted` without mutating state if the request would
    /// overrun the cap.
    pub fn reserve(&mut self, bytes: usize) -> EngineResult<()> {
        let new_used = self.used.checked_add(bytes).ok_or(EngineError::ArenaExhausted {
            name: self.name,
            used: self.used,
            capacity: self.capacity,
        })?;
        if new_used > self.capacity {
            return Err(EngineError::ArenaExhausted {
                name: self.name,
                used: self.used,
                capacity: self.capacity,
            });
        }
        self.used = new_used;
        Ok(())
    }

    /// Release every reservation made against this arena in one step.
    pub fn reset(&mut self) {
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_within_capacity_succeeds() {
        let mut arena = Arena::new("test", 1024);
        assert!(arena.reserve(512).is_ok());
        assert!(arena.reserve(512).is_ok());
        assert_eq!(arena.used(), 1024);
    }

    #[test]
    fn reserve_past_capacity_fails() {
        let mut arena = Arena::new("test", 1024);
        arena.reserve(1000).unwrap();
        assert!(matches!(arena.reserve(100), Err(EngineError::ArenaExhausted { .. })));
    }

    #[test]
    fn reset_releases_the_whole_arena() {
        let mut arena = Arena::new("test", 64);
        arena.reserve(64).unwrap();
        assert!(arena.reserve(1).is_err());
        arena.reset();
        assert!(arena.reserve(64).is_ok());
    }
}
