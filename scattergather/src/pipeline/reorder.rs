//! Sequence-ordered release of out-of-order results.
//!
//! Results are keyed by admission sequence in a sparse map. A dense counter,
//! `next_expected`, tracks the next sequence to release; each entry is inserted
//! once and removed once, so releasing is O(1) amortized with no sorting.
//!
//! A sequence whose admission failed (or whose computation panicked) never
//! produces a value. It is recorded as [`Slot::Skipped`] so the counter can
//! move past it.
//!
//! # Example
//!
//! ```ignore
//! let mut buffer = ReorderBuffer::new();
//! buffer.insert(2, Slot::Value("b"));
//! assert!(buffer.pop_next().is_none());
//! buffer.insert(1, Slot::Value("a"));
//! assert_eq!(buffer.pop_next(), Some(Slot::Value("a")));
//! assert_eq!(buffer.pop_next(), Some(Slot::Value("b")));
//! ```

use std::collections::HashMap;

/// First sequence number handed out by admission.
pub(crate) const FIRST_SEQUENCE: u64 = 1;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Slot<R> {
    Value(R),
    Skipped,
}

/// Sparse reorder buffer.
///
/// Invariant: every buffered key is `>= next_expected`.
#[derive(Debug)]
pub(crate) struct ReorderBuffer<R> {
    pending: HashMap<u64, Slot<R>>,
    next_expected: u64,
}

impl<R> ReorderBuffer<R> {
    pub(crate) fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_expected: FIRST_SEQUENCE,
        }
    }

    /// Buffer a slot. Returns `false` (and drops the slot) if the sequence was
    /// already released or is already buffered.
    pub(crate) fn insert(&mut self, sequence: u64, slot: Slot<R>) -> bool {
        if sequence < self.next_expected || self.pending.contains_key(&sequence) {
            return false;
        }
        self.pending.insert(sequence, slot);
        true
    }

    /// Remove and return the slot for `next_expected`, advancing the counter.
    pub(crate) fn pop_next(&mut self) -> Option<Slot<R>> {
        let slot = self.pending.remove(&self.next_expected)?;
        self.next_expected += 1;
        Some(slot)
    }

    /// Empty the buffer regardless of gaps, in ascending sequence order.
    /// Skipped slots are dropped.
    pub(crate) fn drain_remaining(&mut self) -> Vec<(u64, R)> {
        let mut remaining: Vec<(u64, Slot<R>)> = self.pending.drain().collect();
        remaining.sort_unstable_by_key(|(sequence, _)| *sequence);
        if let Some((last, _)) = remaining.last() {
            self.next_expected = last + 1;
        }
        remaining
            .into_iter()
            .filter_map(|(sequence, slot)| match slot {
                Slot::Value(value) => Some((sequence, value)),
                Slot::Skipped => None,
            })
            .collect()
    }

    pub(crate) fn next_expected(&self) -> u64 {
        self.next_expected
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
