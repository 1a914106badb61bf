//! Sparse set of NFA states with O(1) clear.
//!
//! Based on: https://research.swtch.com/sparse
//!
//! Used by NFA simulation and epsilon-closure computation, where the same
//! set is cleared and refilled once per input character.

use super::nfa::StateId;

/// A set of `StateId`s below a known capacity, preserving insertion order.
#[derive(Clone, Debug)]
pub struct StateSet {
    len: usize,
    /// IDs in insertion order.
    dense: Vec<StateId>,
    /// An ID is in the set iff sparse[id] < len && dense[sparse[id]] == id.
    sparse: Vec<usize>,
}

impl StateSet {
    /// Create a set for IDs in `[0, capacity)`.
    pub fn new(capacity: usize) -> Self {
        StateSet {
            len: 0,
            dense: vec![StateId::from_index(0); capacity],
            sparse: vec![0; capacity],
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.dense.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert an ID. Returns true if it was not already present.
    ///
    /// Panics if the ID is out of range.
    #[inline]
    pub fn insert(&mut self, id: StateId) -> bool {
        if self.contains(id) {
            return false;
        }
        debug_assert!(
            self.len < self.capacity(),
            "StateSet overflow: len={}, capacity={}",
            self.len,
            self.capacity()
        );
        self.dense[self.len] = id;
        self.sparse[id.index()] = self.len;
        self.len += 1;
        true
    }

    #[inline]
    pub fn contains(&self, id: StateId) -> bool {
        let idx = self.sparse[id.index()];
        idx < self.len && self.dense[idx] == id
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = StateId> + '_ {
        self.dense[..self.len].iter().copied()
    }

    /// The members as sorted raw indices, used as a subset-construction key.
    pub fn sorted_key(&self) -> Vec<u32> {
        let mut key: Vec<u32> = self.iter().map(|id| id.index() as u32).collect();
        key.sort_unstable();
        key
    }
}

/// Current/next pair for stepping an NFA one character at a time.
#[derive(Clone, Debug)]
pub struct StateSets {
    pub current: StateSet,
    pub next: StateSet,
}

impl StateSets {
    pub fn new(capacity: usize) -> Self {
        StateSets {
            current: StateSet::new(capacity),
            next: StateSet::new(capacity),
        }
    }

    #[inline]
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: usize) -> StateId {
        StateId::from_index(i)
    }

    #[test]
    fn test_state_set_insert_and_order() {
        let mut set = StateSet::new(10);
        assert!(set.is_empty());
        assert!(set.insert(id(5)));
        assert!(set.insert(id(2)));
        assert!(set.insert(id(8)));
        assert!(!set.insert(id(2)));

        assert_eq!(set.len(), 3);
        assert!(set.contains(id(8)));
        assert!(!set.contains(id(0)));
        let items: Vec<_> = set.iter().map(StateId::index).collect();
        assert_eq!(items, vec![5, 2, 8]);
        assert_eq!(set.sorted_key(), vec![2, 5, 8]);
    }

    #[test]
    fn test_state_set_clear_is_reusable() {
        let mut set = StateSet::new(4);
        set.insert(id(1));
        set.insert(id(3));
        set.clear();
        assert!(set.is_empty());
        assert!(!set.contains(id(1)));
        set.insert(id(0));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_state_sets_swap() {
        let mut sets = StateSets::new(4);
        sets.current.insert(id(1));
        sets.next.insert(id(2));
        sets.swap();
        assert!(sets.current.contains(id(2)));
        assert!(sets.next.contains(id(1)));
    }
}
