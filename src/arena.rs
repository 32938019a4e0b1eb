//------------ Node arena -----------------------------------------------------
//
// A single bump allocator per table. Indices are stable across
// growth because growth relocates only the backing `Vec`, never the
// indices handed out to callers -- a `Vec<Node<WIDTH>>` already gives us
// this for free, so this is a thin wrapper that enforces the 30-bit index
// ceiling and tracks `pool_used` the way the invariants expect it to read.

use crate::entry::{Entry, MAX_ARENA_INDEX};
use log::{debug, trace};

/// A fixed-width stride node: `WIDTH` slots, one per value of the stride's
/// bits (256 for an 8-bit stride, 65536 for the E3 16-bit wide root).
#[derive(Debug, Clone)]
pub struct Node<const WIDTH: usize> {
    pub slots: Vec<Entry>,
}

impl<const WIDTH: usize> Node<WIDTH> {
    pub(crate) fn empty() -> Self {
        Node {
            slots: vec![Entry::EMPTY; WIDTH],
        }
    }
}

/// Bump-allocated pool of `Node<WIDTH>` records, addressed by 30-bit index.
///
/// Index `0` is reserved (the null child); a fresh arena's root lives at
/// index `1` and `pool_used` starts at `2`.
#[derive(Debug)]
pub struct Arena<const WIDTH: usize> {
    pool: Vec<Node<WIDTH>>,
    growth_factor: usize,
}

impl<const WIDTH: usize> Arena<WIDTH> {
    /// Create an arena with its root already allocated at index 1.
    ///
    /// `growth_factor` governs how far `alloc` grows the backing `Vec`
    /// each time it fills up (`capacity *= growth_factor`), rather than
    /// leaving it to `Vec`'s own amortized growth.
    pub fn new(initial_capacity: usize, growth_factor: usize) -> Self {
        let mut pool = Vec::with_capacity(initial_capacity.max(2));
        pool.push(Node::empty()); // index 0: reserved / null
        pool.push(Node::empty()); // index 1: root
        debug!("arena created, root at index 1, width {WIDTH}");
        Arena {
            pool,
            growth_factor: growth_factor.max(2),
        }
    }

    pub fn root_index(&self) -> u32 {
        1
    }

    pub fn pool_used(&self) -> usize {
        self.pool.len()
    }

    pub fn bytes_used(&self) -> usize {
        self.pool.len() * WIDTH * std::mem::size_of::<Entry>()
    }

    #[inline]
    pub fn node(&self, index: u32) -> &Node<WIDTH> {
        &self.pool[index as usize]
    }

    #[inline]
    pub fn node_mut(&mut self, index: u32) -> &mut Node<WIDTH> {
        &mut self.pool[index as usize]
    }

    /// Allocate a new, zero-initialized node and return its index.
    ///
    /// Fails with `None` (arena exhaustion) once `pool_used` would
    /// exceed the 30-bit index ceiling.
    pub fn alloc(&mut self) -> Option<u32> {
        if self.pool.len() >= MAX_ARENA_INDEX {
            return None;
        }
        if self.pool.len() == self.pool.capacity() {
            let target = self.pool.capacity().max(1) * self.growth_factor;
            self.pool.reserve(target - self.pool.capacity());
        }
        let idx = self.pool.len() as u32;
        self.pool.push(Node::empty());
        trace!("allocated node {idx}");
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_arena_has_root_at_one() {
        let a = Arena::<256>::new(4, 2);
        assert_eq!(a.root_index(), 1);
        assert_eq!(a.pool_used(), 2);
    }

    #[test]
    fn alloc_returns_increasing_indices() {
        let mut a = Arena::<256>::new(4, 2);
        let i1 = a.alloc().unwrap();
        let i2 = a.alloc().unwrap();
        assert_eq!(i1, 2);
        assert_eq!(i2, 3);
        assert_eq!(a.pool_used(), 4);
    }

    #[test]
    fn indices_survive_growth() {
        let mut a = Arena::<256>::new(1, 2);
        let mut indices = Vec::new();
        for _ in 0..10_000 {
            indices.push(a.alloc().unwrap());
        }
        for (i, idx) in indices.iter().enumerate() {
            assert_eq!(*idx as usize, i + 2);
            assert!(a.node(*idx).slots.iter().all(|e| !e.is_valid()));
        }
    }
}
