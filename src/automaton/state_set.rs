//! Sparse set of state ids with O(1) clearing.
//!
//! Based on: https://research.swtch.com/sparse
//!
//! Epsilon closures and the nondeterministic `run` rebuild a live-state set
//! for every input character, so clearing must not cost O(capacity). The set
//! preserves insertion order, which keeps closure traversal deterministic.

use super::arena::StateId;

/// A set of [`StateId`]s below a fixed capacity.
#[derive(Clone, Debug)]
pub struct StateSet {
    len: usize,
    /// Members in insertion order.
    dense: Vec<StateId>,
    /// id -> position in `dense`. An id is a member iff
    /// `sparse[id] < len && dense[sparse[id]] == id`.
    sparse: Vec<usize>,
}

impl StateSet {
    /// Create a set able to hold ids in `[0, capacity)`.
    pub fn new(capacity: usize) -> Self {
        StateSet {
            len: 0,
            dense: vec![StateId::NONE; capacity],
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

    /// Insert an id. Returns true if it was not already present.
    ///
    /// Panics if the id is outside the capacity.
    #[inline]
    pub fn insert(&mut self, id: StateId) -> bool {
        if self.contains(id) {
            return false;
        }
        debug_assert!(self.len < self.capacity(), "StateSet overflow");
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

    /// Members in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = StateId> + '_ {
        self.dense[..self.len].iter().copied()
    }

    /// Members as a sorted vector (canonical subset key).
    pub fn sorted(&self) -> Vec<StateId> {
        let mut v = self.dense[..self.len].to_vec();
        v.sort_unstable();
        v
    }
}

/// Current/next pair of sets for stepping an NFA one character at a time.
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

    /// Make `next` the current set and clear the new `next`.
    #[inline]
    pub fn advance(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
        self.next.clear();
    }
}
