//! Change-log data model: operation ids, frontiers, changes and version vectors.
//!
//! These types mirror what a CRDT engine reports about its history. They are
//! plain values: the engine produces them, everything else only reads them.
//!
//! # Identity
//!
//! Every atomic operation is identified by an [`OpId`], the pair of the peer
//! that produced it and that peer's sequence counter. A [`Change`] covers a
//! contiguous counter range `[counter, counter + length)` of one peer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LoupeError;

/// Actor identifier.
pub type PeerId = u64;

// ---------------------------------------------------------------------------
// OpId
// ---------------------------------------------------------------------------

/// Identifier of one atomic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpId {
    /// Peer that produced the operation.
    pub peer: PeerId,
    /// Per-peer sequence number of the operation.
    pub counter: u32,
}

impl OpId {
    #[must_use]
    pub const fn new(peer: PeerId, counter: u32) -> Self {
        Self { peer, counter }
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.peer)
    }
}

impl FromStr for OpId {
    type Err = LoupeError;

    /// Parse the `counter@peer` form used in displays and search queries.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LoupeError::InvalidOpId(s.to_string());
        let (counter, peer) = s.trim().split_once('@').ok_or_else(invalid)?;
        let counter = counter.trim().parse::<u32>().map_err(|_| invalid())?;
        let peer = peer.trim().parse::<PeerId>().map_err(|_| invalid())?;
        Ok(Self { peer, counter })
    }
}

// ---------------------------------------------------------------------------
// Frontier
// ---------------------------------------------------------------------------

/// Set of causally-maximal operations describing a point in history.
///
/// Elements are kept sorted and deduplicated so that two frontiers naming the
/// same operations compare equal regardless of the order they were built in.
/// The empty frontier is the state before any operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<OpId>", into = "Vec<OpId>")]
pub struct Frontier(Vec<OpId>);

impl Frontier {
    /// The empty frontier.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// A frontier holding exactly one operation.
    #[must_use]
    pub fn single(id: OpId) -> Self {
        Self(vec![id])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First element in sorted order, if any.
    #[must_use]
    pub fn first(&self) -> Option<&OpId> {
        self.0.first()
    }

    /// The only element, when the frontier has exactly one.
    #[must_use]
    pub fn as_single(&self) -> Option<OpId> {
        match self.0.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(&self, id: &OpId) -> bool {
        self.0.binary_search(id).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpId> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[OpId] {
        &self.0
    }
}

impl From<Vec<OpId>> for Frontier {
    fn from(mut ids: Vec<OpId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }
}

impl From<Frontier> for Vec<OpId> {
    fn from(frontier: Frontier) -> Self {
        frontier.0
    }
}

impl FromIterator<OpId> for Frontier {
    fn from_iter<I: IntoIterator<Item = OpId>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a Frontier {
    type Item = &'a OpId;
    type IntoIter = std::slice::Iter<'a, OpId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Frontier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("Empty");
        }
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Change
// ---------------------------------------------------------------------------

/// An immutable, committed batch of operations from one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Peer that authored the change.
    pub peer: PeerId,
    /// Counter of the first operation covered.
    pub counter: u32,
    /// Number of operations covered (at least 1).
    pub length: u32,
    /// Lamport clock of the first operation.
    pub lamport: u32,
    /// Wall-clock seconds at commit.
    pub timestamp: i64,
    /// Operations this change causally depends on.
    pub deps: Frontier,
    /// Optional commit message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Change {
    /// Id of the first operation.
    #[must_use]
    pub const fn id(&self) -> OpId {
        OpId::new(self.peer, self.counter)
    }

    /// Id of the last operation.
    #[must_use]
    pub const fn last_id(&self) -> OpId {
        OpId::new(self.peer, self.end_counter() - 1)
    }

    /// Exclusive end of the counter range.
    #[must_use]
    pub const fn end_counter(&self) -> u32 {
        self.counter + self.length
    }

    /// Whether `id` falls inside this change.
    #[must_use]
    pub const fn contains(&self, id: OpId) -> bool {
        id.peer == self.peer && id.counter >= self.counter && id.counter < self.end_counter()
    }

    /// Lamport clock of the operation `id`, which must lie inside this change.
    #[must_use]
    pub const fn lamport_of(&self, id: OpId) -> u32 {
        self.lamport + (id.counter - self.counter)
    }

    /// Lamport clock of the last operation.
    #[must_use]
    pub const fn last_lamport(&self) -> u32 {
        self.lamport + (self.length - 1)
    }

    /// Declared dependencies plus, when the change does not start at counter
    /// 0, the previous operation of the same peer.
    pub fn causal_parents(&self) -> impl Iterator<Item = OpId> + '_ {
        let previous = (self.counter > 0).then(|| OpId::new(self.peer, self.counter - 1));
        self.deps.iter().copied().chain(previous)
    }
}

// ---------------------------------------------------------------------------
// VersionVector
// ---------------------------------------------------------------------------

/// Per-peer exclusive end counters summarising a set of known operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionVector(BTreeMap<PeerId, u32>);

impl VersionVector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// End counter recorded for `peer` (0 when unknown).
    #[must_use]
    pub fn get(&self, peer: PeerId) -> u32 {
        self.0.get(&peer).copied().unwrap_or(0)
    }

    /// Raise the end counter for `peer` to at least `end`.
    pub fn extend_to(&mut self, peer: PeerId, end: u32) {
        let slot = self.0.entry(peer).or_insert(0);
        *slot = (*slot).max(end);
    }

    /// Whether the operation `id` is covered.
    #[must_use]
    pub fn includes(&self, id: OpId) -> bool {
        id.counter < self.get(id.peer)
    }

    /// Total number of operations covered across all peers.
    #[must_use]
    pub fn total_ops(&self) -> u64 {
        self.0.values().map(|&end| u64::from(end)).sum()
    }

    /// Number of peers with at least one entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries sorted by peer id.
    pub fn iter(&self) -> impl Iterator<Item = (PeerId, u32)> + '_ {
        self.0.iter().map(|(&peer, &end)| (peer, end))
    }
}

impl FromIterator<(PeerId, u32)> for VersionVector {
    fn from_iter<I: IntoIterator<Item = (PeerId, u32)>>(iter: I) -> Self {
        let mut vv = Self::new();
        for (peer, end) in iter {
            vv.extend_to(peer, end);
        }
        vv
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn change(peer: PeerId, counter: u32, length: u32) -> Change {
        Change {
            peer,
            counter,
            length,
            lamport: 10,
            timestamp: 0,
            deps: Frontier::empty(),
            message: None,
        }
    }

    #[test]
    fn op_id_display_and_parse() {
        let id = OpId::new(42, 7);
        assert_eq!(id.to_string(), "7@42");
        assert_eq!("7@42".parse::<OpId>().expect("parse"), id);
        assert_eq!(" 7 @ 42 ".parse::<OpId>().expect("parse"), id);
    }

    #[test]
    fn op_id_parse_rejects_garbage() {
        for bad in ["", "7", "@42", "x@1", "1@y", "-1@2"] {
            let err = bad.parse::<OpId>().expect_err("should fail");
            assert!(matches!(err, LoupeError::InvalidOpId(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn frontier_is_order_insensitive() {
        let a = Frontier::from(vec![OpId::new(2, 0), OpId::new(1, 5)]);
        let b = Frontier::from(vec![OpId::new(1, 5), OpId::new(2, 0), OpId::new(1, 5)]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.first(), Some(&OpId::new(1, 5)));
        assert!(a.as_single().is_none());
    }

    #[test]
    fn frontier_display() {
        assert_eq!(Frontier::empty().to_string(), "Empty");
        let f: Frontier = [OpId::new(1, 3), OpId::new(2, 0)].into_iter().collect();
        assert_eq!(f.to_string(), "3@1, 0@2");
    }

    #[test]
    fn frontier_serde_normalizes() {
        let f: Frontier =
            serde_json::from_str(r#"[{"peer":9,"counter":1},{"peer":3,"counter":2}]"#)
                .expect("deserialize");
        assert_eq!(f.as_slice(), &[OpId::new(3, 2), OpId::new(9, 1)]);
    }

    #[test]
    fn change_ranges() {
        let c = change(1, 4, 3);
        assert_eq!(c.id(), OpId::new(1, 4));
        assert_eq!(c.last_id(), OpId::new(1, 6));
        assert_eq!(c.end_counter(), 7);
        assert!(c.contains(OpId::new(1, 4)));
        assert!(c.contains(OpId::new(1, 6)));
        assert!(!c.contains(OpId::new(1, 7)));
        assert!(!c.contains(OpId::new(1, 3)));
        assert!(!c.contains(OpId::new(2, 5)));
        assert_eq!(c.lamport_of(OpId::new(1, 5)), 11);
        assert_eq!(c.last_lamport(), 12);
    }

    #[test]
    fn version_vector_totals() {
        let mut vv = VersionVector::new();
        vv.extend_to(1, 3);
        vv.extend_to(2, 5);
        vv.extend_to(1, 2);
        assert_eq!(vv.get(1), 3);
        assert_eq!(vv.total_ops(), 8);
        assert!(vv.includes(OpId::new(2, 4)));
        assert!(!vv.includes(OpId::new(2, 5)));
        assert!(!vv.includes(OpId::new(7, 0)));
        assert_eq!(vv.iter().collect::<Vec<_>>(), vec![(1, 3), (2, 5)]);
    }
}
