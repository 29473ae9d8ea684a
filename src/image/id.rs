use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::protocol::codec::{MAX_ID, MIN_ID};

struct State {
    used: HashSet<u32>,
    rng: StdRng,
}

/// Hands out random image ids, unique among the ids currently in use
///
/// When every id of the range has been handed out the used set is
/// forgotten and allocation starts over.
pub struct IdAllocator {
    range: RangeInclusive<u32>,
    state: Mutex<State>,
}

impl IdAllocator {
    pub fn new(range: RangeInclusive<u32>) -> Self {
        IdAllocator::with_rng(range, StdRng::from_entropy())
    }

    /// Deterministic allocator, for tests
    pub fn with_seed(range: RangeInclusive<u32>, seed: u64) -> Self {
        IdAllocator::with_rng(range, StdRng::seed_from_u64(seed))
    }

    fn with_rng(range: RangeInclusive<u32>, rng: StdRng) -> Self {
        let (start, end) = (*range.start(), *range.end());
        IdAllocator {
            range: start.min(end)..=start.max(end),
            state: Mutex::new(State {
                used: HashSet::new(),
                rng,
            }),
        }
    }

    /// Process-wide allocator over the full id space
    pub fn global() -> Arc<IdAllocator> {
        static GLOBAL: OnceLock<Arc<IdAllocator>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(IdAllocator::new(MIN_ID..=MAX_ID))))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn capacity(&self) -> u64 {
        *self.range.end() as u64 - *self.range.start() as u64 + 1
    }

    pub fn allocate(&self) -> u32 {
        let mut state = self.lock();

        if state.used.len() as u64 >= self.capacity() {
            log::debug!("All {} image ids used, starting over", self.capacity());
            state.used.clear();
        }

        loop {
            let id = state.rng.gen_range(self.range.clone());
            if state.used.insert(id) {
                return id;
            }
        }
    }

    /// Mark an id chosen by the caller as used
    pub fn claim(&self, id: u32) -> bool {
        self.range.contains(&id) && self.lock().used.insert(id)
    }

    pub fn reset(&self) {
        self.lock().used.clear();
    }

    pub fn in_use(&self) -> usize {
        self.lock().used.len()
    }

    pub fn range(&self) -> RangeInclusive<u32> {
        self.range.clone()
    }
}

impl std::fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdAllocator")
            .field("range", &self.range)
            .field("in_use", &self.in_use())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_in_range() {
        let ids = IdAllocator::with_seed(1..=50, 7);
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let id = ids.allocate();
            assert!((1..=50).contains(&id));
            assert!(seen.insert(id));
        }
        assert_eq!(ids.in_use(), 50);
    }

    #[test]
    fn test_exhausted_space_starts_over() {
        let ids = IdAllocator::with_seed(3..=4, 1);
        ids.allocate();
        ids.allocate();
        assert_eq!(ids.in_use(), 2);

        let id = ids.allocate();
        assert!(id == 3 || id == 4);
        assert_eq!(ids.in_use(), 1);
    }

    #[test]
    fn test_seeded_allocators_agree() {
        let a = IdAllocator::with_seed(1..=1_000_000, 42);
        let b = IdAllocator::with_seed(1..=1_000_000, 42);
        assert_eq!(a.allocate(), b.allocate());
        assert_eq!(a.allocate(), b.allocate());
    }

    #[test]
    fn test_reversed_range_is_normalized() {
        let ids = IdAllocator::with_seed(9..=5, 0);
        assert_eq!(ids.range(), 5..=9);
    }

    #[test]
    fn test_claim_and_reset() {
        let ids = IdAllocator::with_seed(1..=10, 0);
        assert!(ids.claim(4));
        assert!(!ids.claim(4));
        assert!(!ids.claim(11));
        ids.reset();
        assert_eq!(ids.in_use(), 0);
    }
}
