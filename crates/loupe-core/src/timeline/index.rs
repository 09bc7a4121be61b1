//! Interval index from timeline positions to changes.
//!
//! Each change occupies the half-open position range
//! `[base_position, base_position + length)`. Ranges are assigned by
//! accumulating lengths in the order the changes are supplied, starting at 1,
//! so they are sorted, disjoint and contiguous. Lookups are predecessor
//! searches over that sorted array.

use std::collections::HashMap;

use crate::model::{Change, OpId, PeerId};

/// A change and the position of its first operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub change: Change,
    pub base_position: u64,
}

impl IndexEntry {
    /// Exclusive end of the position range.
    #[must_use]
    pub fn end_position(&self) -> u64 {
        self.base_position + u64::from(self.change.length)
    }

    #[must_use]
    pub fn covers(&self, position: u64) -> bool {
        position >= self.base_position && position < self.end_position()
    }
}

/// Immutable position → change index.
#[derive(Debug, Clone, Default)]
pub struct PositionIndex {
    entries: Vec<IndexEntry>,
    /// Entry indices per peer, in counter order.
    by_peer: HashMap<PeerId, Vec<usize>>,
    op_count: u64,
}

impl PositionIndex {
    /// Build from changes in ancestors-before-descendants order.
    #[must_use]
    pub fn build(changes: impl IntoIterator<Item = Change>) -> Self {
        let mut entries = Vec::new();
        let mut by_peer: HashMap<PeerId, Vec<usize>> = HashMap::new();
        let mut next = 1_u64;

        for change in changes {
            let length = u64::from(change.length);
            by_peer.entry(change.peer).or_default().push(entries.len());
            entries.push(IndexEntry {
                change,
                base_position: next,
            });
            next += length;
        }

        for indices in by_peer.values_mut() {
            indices.sort_by_key(|&i| entries[i].change.counter);
        }

        Self {
            entries,
            by_peer,
            op_count: next - 1,
        }
    }

    /// Number of indexed changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the lengths of all indexed changes.
    #[must_use]
    pub const fn op_count(&self) -> u64 {
        self.op_count
    }

    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// The entry whose range covers `position`.
    #[must_use]
    pub fn find(&self, position: u64) -> Option<&IndexEntry> {
        let after = self
            .entries
            .partition_point(|entry| entry.base_position <= position);
        let entry = &self.entries[after.checked_sub(1)?];
        entry.covers(position).then_some(entry)
    }

    /// Position of the operation `id`, if some indexed change contains it.
    #[must_use]
    pub fn position_of(&self, id: OpId) -> Option<u64> {
        let indices = self.by_peer.get(&id.peer)?;
        let after = indices.partition_point(|&i| self.entries[i].change.counter <= id.counter);
        let entry = &self.entries[indices[after.checked_sub(1)?]];
        entry
            .change
            .contains(id)
            .then(|| entry.base_position + u64::from(id.counter - entry.change.counter))
    }
}
