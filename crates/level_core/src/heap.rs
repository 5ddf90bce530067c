//! Indexable min-heap used to pick the next cell to collapse.
//!
//! Items are dense ids (cell indices). Their keys live outside the heap and
//! are read through a key function on every comparison, so the owner can
//! shrink a key and then call [`IndexedHeap::reorder`] to restore heap order
//! in O(log n). The heap keeps a position table `id -> slot` for that purpose.
//!
//! Keys are only ever expected to shrink, so `reorder` sifts towards the root
//! only.

use crate::rng::LevelRng;
use serde::{Deserialize, Serialize};

/// How two items with equal keys are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Coin flip per comparison, drawn from the run's RNG
    #[default]
    Random,
    /// Lower id first; deterministic regardless of RNG state
    StableIndex,
}

/// Array-backed binary min-heap over dense ids with position tracking.
#[derive(Debug, Clone)]
pub struct IndexedHeap {
    /// Heap-ordered ids
    items: Vec<usize>,
    /// `positions[id]` = slot of `id` in `items`, `None` if not in the heap
    positions: Vec<Option<usize>>,
    tie_break: TieBreak,
}

impl IndexedHeap {
    /// Create an empty heap able to hold ids `0..capacity`.
    pub fn with_capacity(capacity: usize, tie_break: TieBreak) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            positions: vec![None; capacity],
            tie_break,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Whether `id` is currently queued.
    pub fn contains(&self, id: usize) -> bool {
        self.position(id).is_some()
    }

    /// Current slot of `id`.
    pub fn position(&self, id: usize) -> Option<usize> {
        self.positions.get(id).copied().flatten()
    }

    /// Add an id and sift it towards the root.
    ///
    /// Inserting an id that is already queued only reorders it.
    pub fn insert(&mut self, id: usize, key: impl Fn(usize) -> usize, rng: &mut dyn LevelRng) {
        if id >= self.positions.len() {
            self.positions.resize(id + 1, None);
        }
        if let Some(pos) = self.positions[id] {
            self.sift_up(pos, &key, rng);
            return;
        }

        let pos = self.items.len();
        self.items.push(id);
        self.positions[id] = Some(pos);
        self.sift_up(pos, &key, rng);
    }

    /// The id with the smallest key.
    pub fn peek(&self) -> Option<usize> {
        self.items.first().copied()
    }

    /// Remove and return the id with the smallest key.
    pub fn pop(&mut self, key: impl Fn(usize) -> usize, rng: &mut dyn LevelRng) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }

        let top = self.items.swap_remove(0);
        self.positions[top] = None;

        if let Some(&moved) = self.items.first() {
            self.positions[moved] = Some(0);
            self.sift_down(0, &key, rng);
        }

        Some(top)
    }

    /// Restore heap order after the key of `id` shrank.
    ///
    /// No-op for ids that are not queued.
    pub fn reorder(&mut self, id: usize, key: impl Fn(usize) -> usize, rng: &mut dyn LevelRng) {
        if let Some(pos) = self.position(id) {
            self.sift_up(pos, &key, rng);
        }
    }

    /// Queued ids in slot order.
    pub fn as_slice(&self) -> &[usize] {
        &self.items
    }

    /// Check the heap property and the position table.
    pub fn is_valid(&self, key: impl Fn(usize) -> usize) -> bool {
        for (pos, &id) in self.items.iter().enumerate() {
            if self.position(id) != Some(pos) {
                return false;
            }
            if pos > 0 && key(self.items[(pos - 1) / 2]) > key(id) {
                return false;
            }
        }
        let queued = self.positions.iter().filter(|p| p.is_some()).count();
        queued == self.items.len()
    }

    /// Whether `a` belongs above `b`.
    fn precedes(
        &self,
        a: usize,
        b: usize,
        key: &impl Fn(usize) -> usize,
        rng: &mut dyn LevelRng,
    ) -> bool {
        let (ka, kb) = (key(a), key(b));
        if ka != kb {
            return ka < kb;
        }
        match self.tie_break {
            TieBreak::Random => rng.next_bool(),
            TieBreak::StableIndex => a < b,
        }
    }

    fn sift_up(&mut self, mut pos: usize, key: &impl Fn(usize) -> usize, rng: &mut dyn LevelRng) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.precedes(self.items[pos], self.items[parent], key, rng) {
                self.swap(pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut pos: usize, key: &impl Fn(usize) -> usize, rng: &mut dyn LevelRng) {
        loop {
            let left = pos * 2 + 1;
            if left >= self.items.len() {
                return;
            }

            let right = left + 1;
            let child = if right < self.items.len()
                && self.precedes(self.items[right], self.items[left], key, rng)
            {
                right
            } else {
                left
            };

            if self.precedes(self.items[child], self.items[pos], key, rng) {
                self.swap(pos, child);
                pos = child;
            } else {
                return;
            }
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.items.swap(a, b);
        self.positions[self.items[a]] = Some(a);
        self.positions[self.items[b]] = Some(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::StdRandom;
    use std::cell::RefCell;

    fn build(keys: &[usize], tie_break: TieBreak, rng: &mut StdRandom) -> IndexedHeap {
        let mut heap = IndexedHeap::with_capacity(keys.len(), tie_break);
        for id in 0..keys.len() {
            heap.insert(id, |i| keys[i], rng);
        }
        heap
    }

    #[test]
    fn test_pop_order_is_ascending() {
        let keys = [5, 3, 9, 1, 7, 3, 2, 8];
        let mut rng = StdRandom::from_seed(7);
        let mut heap = build(&keys, TieBreak::Random, &mut rng);
        assert!(heap.is_valid(|i| keys[i]));

        let mut popped = Vec::new();
        while let Some(id) = heap.pop(|i| keys[i], &mut rng) {
            assert!(heap.is_valid(|i| keys[i]));
            popped.push(keys[id]);
        }
        assert_eq!(popped, vec![1, 2, 3, 3, 5, 7, 8, 9]);
    }

    #[test]
    fn test_stable_index_breaks_ties_by_id() {
        let keys = [4, 4, 4, 4, 4];
        let mut rng = StdRandom::from_seed(1);
        let mut heap = build(&keys, TieBreak::StableIndex, &mut rng);

        let order: Vec<usize> = std::iter::from_fn(|| heap.pop(|i| keys[i], &mut rng)).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_random_ties_still_pop_minimum_first() {
        let keys = [2, 2, 1, 2, 2, 2];
        for seed in 0..20 {
            let mut rng = StdRandom::from_seed(seed);
            let mut heap = build(&keys, TieBreak::Random, &mut rng);
            assert_eq!(heap.pop(|i| keys[i], &mut rng), Some(2));
        }
    }

    #[test]
    fn test_reorder_after_key_shrinks() {
        let keys = RefCell::new(vec![6, 5, 4, 3, 2]);
        let mut rng = StdRandom::from_seed(3);
        let mut heap = IndexedHeap::with_capacity(5, TieBreak::StableIndex);
        for id in 0..5 {
            heap.insert(id, |i| keys.borrow()[i], &mut rng);
        }
        assert_eq!(heap.peek(), Some(4));

        keys.borrow_mut()[0] = 1;
        heap.reorder(0, |i| keys.borrow()[i], &mut rng);
        assert_eq!(heap.peek(), Some(0));
        assert!(heap.is_valid(|i| keys.borrow()[i]));
    }

    #[test]
    fn test_positions_track_slots() {
        let keys = [3, 1, 2];
        let mut rng = StdRandom::from_seed(0);
        let mut heap = build(&keys, TieBreak::StableIndex, &mut rng);

        for (slot, &id) in heap.as_slice().iter().enumerate() {
            assert_eq!(heap.position(id), Some(slot));
        }

        let top = heap.pop(|i| keys[i], &mut rng);
        assert_eq!(top, Some(1));
        assert!(!heap.contains(1));
        assert_eq!(heap.position(1), None);
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn test_reorder_unqueued_is_noop() {
        let keys = [1, 2];
        let mut rng = StdRandom::from_seed(0);
        let mut heap = build(&keys, TieBreak::StableIndex, &mut rng);
        heap.pop(|i| keys[i], &mut rng);

        heap.reorder(0, |i| keys[i], &mut rng);
        heap.reorder(99, |i| keys[i], &mut rng);
        assert_eq!(heap.as_slice(), &[1]);
    }

    #[test]
    fn test_insert_twice_keeps_one_entry() {
        let keys = [1, 2];
        let mut rng = StdRandom::from_seed(0);
        let mut heap = build(&keys, TieBreak::StableIndex, &mut rng);
        heap.insert(1, |i| keys[i], &mut rng);
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn test_pop_empty() {
        let mut rng = StdRandom::from_seed(0);
        let mut heap = IndexedHeap::with_capacity(0, TieBreak::Random);
        assert!(heap.is_empty());
        assert_eq!(heap.peek(), None);
        assert_eq!(heap.pop(|_| 0, &mut rng), None);
    }
}
