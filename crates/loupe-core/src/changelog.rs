//! In-memory change log implementing [`DocumentEngine`].
//!
//! A [`ChangeLog`] is loaded from a JSON export of a document's change
//! metadata. It validates the history, derives lamport clocks and the logged
//! frontier, and tracks one checked-out frontier.
//!
//! # Causal parents
//!
//! The causal parents of a change are its declared `deps` plus, when the
//! change does not start at counter 0, the previous operation of the same
//! peer. Operations inside a change form a linear chain.
//!
//! # Validation
//!
//! - every change has `length >= 1`;
//! - per peer, changes tile `[0, end)` with no gaps or overlaps;
//! - every dependency names a known operation;
//! - the dependency relation is acyclic.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io::Read;
use std::ops::Range;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::engine::DocumentEngine;
use crate::error::{LoupeError, Result};
use crate::model::{Change, Frontier, OpId, PeerId, VersionVector};

// ---------------------------------------------------------------------------
// Import format
// ---------------------------------------------------------------------------

/// One change as it appears in a change-log export.
///
/// Lamport clocks are not part of the export; they are derived on load.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeRecord {
    pub peer: PeerId,
    pub counter: u32,
    pub length: u32,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub deps: Vec<OpId>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ChangeRecord {
    /// A change with no declared dependencies.
    #[must_use]
    pub const fn new(peer: PeerId, counter: u32, length: u32) -> Self {
        Self {
            peer,
            counter,
            length,
            timestamp: 0,
            deps: Vec::new(),
            message: None,
        }
    }

    #[must_use]
    pub fn deps(mut self, deps: impl IntoIterator<Item = OpId>) -> Self {
        self.deps = deps.into_iter().collect();
        self
    }

    #[must_use]
    pub const fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    const fn id(&self) -> OpId {
        OpId::new(self.peer, self.counter)
    }
}

/// Top-level change-log export document.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeLogExport {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
    /// Initially checked-out frontier; defaults to the logged frontier.
    #[serde(default)]
    pub frontier: Option<Frontier>,
}

// ---------------------------------------------------------------------------
// ChangeLog
// ---------------------------------------------------------------------------

/// Validated, indexed change history with a current checkout.
#[derive(Debug, Clone)]
pub struct ChangeLog {
    name: Option<String>,
    /// All changes sorted by `(peer, counter)`.
    changes: Vec<Change>,
    /// Slice of `changes` owned by each peer.
    peers: BTreeMap<PeerId, Range<usize>>,
    logged_vv: VersionVector,
    logged_frontier: Frontier,
    current: Frontier,
}

impl ChangeLog {
    /// A document with no history.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            name: None,
            changes: Vec::new(),
            peers: BTreeMap::new(),
            logged_vv: VersionVector::new(),
            logged_frontier: Frontier::empty(),
            current: Frontier::empty(),
        }
    }

    /// Load and validate a change-log export from disk.
    ///
    /// The file name is used as the document name when the export has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// describes an invalid history.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut log = Self::from_reader(file)?;
        if log.name.is_none() {
            log.name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        }
        Ok(log)
    }

    /// Parse a change-log export from a reader.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, malformed JSON, or invalid history.
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Self::from_json_str(&buf)
    }

    /// Parse a change-log export from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or invalid history.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let export: ChangeLogExport = serde_json::from_str(json)?;
        Self::from_export(export)
    }

    /// Build from an already-parsed export.
    ///
    /// # Errors
    ///
    /// Returns an error if the history is invalid.
    pub fn from_export(export: ChangeLogExport) -> Result<Self> {
        let mut log = Self::from_records(export.changes)?;
        log.name = export.name;
        if let Some(frontier) = export.frontier {
            log.checkout(&frontier)?;
        }
        Ok(log)
    }

    /// Build from change records given in any order, checked out at the
    /// logged frontier.
    ///
    /// # Errors
    ///
    /// Returns [`LoupeError::InvalidChangeLog`] for zero-length changes or
    /// counter gaps, [`LoupeError::UnknownOperation`] for dangling
    /// dependencies and [`LoupeError::CausalCycle`] for cyclic histories.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn from_records(mut records: Vec<ChangeRecord>) -> Result<Self> {
        if let Some(bad) = records.iter().find(|r| r.length == 0) {
            return Err(LoupeError::InvalidChangeLog(format!(
                "change {} has zero length",
                bad.id()
            )));
        }

        records.sort_by_key(|r| (r.peer, r.counter));

        let mut changes = Vec::with_capacity(records.len());
        let mut peers: BTreeMap<PeerId, Range<usize>> = BTreeMap::new();
        let mut logged_vv = VersionVector::new();

        for (idx, record) in records.into_iter().enumerate() {
            let expected = logged_vv.get(record.peer);
            if record.counter != expected {
                return Err(LoupeError::InvalidChangeLog(format!(
                    "peer {} expected a change at counter {expected}, found {}",
                    record.peer, record.counter
                )));
            }
            let end = record.counter.checked_add(record.length).ok_or_else(|| {
                LoupeError::InvalidChangeLog(format!("change {} overflows the counter", record.id()))
            })?;
            logged_vv.extend_to(record.peer, end);
            peers.entry(record.peer).or_insert(idx..idx).end = idx + 1;
            changes.push(Change {
                peer: record.peer,
                counter: record.counter,
                length: record.length,
                lamport: 0,
                timestamp: record.timestamp,
                deps: Frontier::from(record.deps),
                message: record.message,
            });
        }

        for change in &changes {
            if let Some(dangling) = change.deps.iter().find(|dep| !logged_vv.includes(**dep)) {
                return Err(LoupeError::UnknownOperation(*dangling));
            }
        }

        assign_lamports(&mut changes, &peers)?;

        let referenced: HashSet<OpId> = changes
            .iter()
            .flat_map(|c| c.deps.iter().copied())
            .collect();
        let logged_frontier: Frontier = peers
            .values()
            .map(|range| changes[range.end - 1].last_id())
            .filter(|id| !referenced.contains(id))
            .collect();

        debug!(
            changes = changes.len(),
            peers = peers.len(),
            ops = logged_vv.total_ops(),
            frontier = %logged_frontier,
            "change log loaded"
        );

        Ok(Self {
            name: None,
            changes,
            peers,
            logged_vv,
            current: logged_frontier.clone(),
            logged_frontier,
        })
    }

    /// Display name of the document, if known.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of changes in the log.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// All changes, sorted by peer then counter.
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Version vector of everything causally at or before `frontier`.
    #[must_use]
    pub fn version_vector_of(&self, frontier: &Frontier) -> VersionVector {
        let mut vv = VersionVector::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<OpId> = frontier.iter().copied().collect();

        while let Some(op) = stack.pop() {
            let Some(idx) = find_change(&self.changes, &self.peers, op) else {
                continue;
            };
            vv.extend_to(op.peer, op.counter + 1);
            if visited.insert(idx) {
                stack.extend(self.changes[idx].causal_parents());
            }
        }

        vv
    }
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::empty()
    }
}

impl DocumentEngine for ChangeLog {
    fn logged_frontier(&self) -> Frontier {
        self.logged_frontier.clone()
    }

    fn current_frontier(&self) -> Frontier {
        self.current.clone()
    }

    fn traverse_ancestors(&self, from: &Frontier, visit: &mut dyn FnMut(&Change) -> bool) {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut stack: Vec<OpId> = from.iter().copied().collect();

        while let Some(op) = stack.pop() {
            let Some(idx) = find_change(&self.changes, &self.peers, op) else {
                continue;
            };
            if seen.insert(idx) {
                found.push(idx);
                stack.extend(self.changes[idx].causal_parents());
            }
        }

        // Lamport strictly grows along every dependency edge, so descending
        // lamport order is a valid descendants-first order.
        found.sort_by(|&a, &b| {
            let (ca, cb) = (&self.changes[a], &self.changes[b]);
            cb.lamport
                .cmp(&ca.lamport)
                .then_with(|| cb.peer.cmp(&ca.peer))
        });

        for idx in found {
            if !visit(&self.changes[idx]) {
                break;
            }
        }
    }

    fn change_containing(&self, id: OpId) -> Option<Change> {
        find_change(&self.changes, &self.peers, id).map(|idx| self.changes[idx].clone())
    }

    fn checkout(&mut self, frontier: &Frontier) -> Result<()> {
        if let Some(unknown) = frontier.iter().find(|id| !self.logged_vv.includes(**id)) {
            return Err(LoupeError::UnknownOperation(*unknown));
        }
        debug!(frontier = %frontier, "checkout");
        self.current = frontier.clone();
        Ok(())
    }

    fn logged_version_vector(&self) -> VersionVector {
        self.logged_vv.clone()
    }

    fn current_version_vector(&self) -> VersionVector {
        self.version_vector_of(&self.current)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Index into `changes` of the change covering `id`.
fn find_change(changes: &[Change], peers: &BTreeMap<PeerId, Range<usize>>, id: OpId) -> Option<usize> {
    let range = peers.get(&id.peer)?;
    let slice = &changes[range.clone()];
    let after = slice.partition_point(|c| c.counter <= id.counter);
    let idx = after.checked_sub(1)?;
    slice[idx].contains(id).then_some(range.start + idx)
}

/// Derive lamport clocks in topological order (Kahn's algorithm).
fn assign_lamports(changes: &mut [Change], peers: &BTreeMap<PeerId, Range<usize>>) -> Result<()> {
    let n = changes.len();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0_usize; n];

    for (idx, change) in changes.iter().enumerate() {
        for parent in change.causal_parents() {
            let parent_idx = find_change(changes, peers, parent)
                .ok_or(LoupeError::UnknownOperation(parent))?;
            if parent_idx == idx {
                return Err(LoupeError::CausalCycle(change.id()));
            }
            children[parent_idx].push(idx);
            in_degree[idx] += 1;
        }
    }

    let mut ready: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut processed = 0;

    while let Some(idx) = ready.pop_front() {
        processed += 1;
        let length = changes[idx].length;
        let lamport = lamport_for(changes, peers, idx)
            .filter(|first| first.checked_add(length - 1).is_some())
            .ok_or_else(|| {
                LoupeError::InvalidChangeLog(format!(
                    "change {} overflows the lamport clock",
                    changes[idx].id()
                ))
            })?;
        changes[idx].lamport = lamport;

        for &child in &children[idx] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push_back(child);
            }
        }
    }

    if processed < n {
        let stuck = (0..n).find(|&i| in_degree[i] > 0).unwrap_or(0);
        return Err(LoupeError::CausalCycle(changes[stuck].id()));
    }

    Ok(())
}

/// One past the highest lamport among the causal parents of `changes[idx]`,
/// or `None` when that does not fit in a `u32`.
fn lamport_for(changes: &[Change], peers: &BTreeMap<PeerId, Range<usize>>, idx: usize) -> Option<u32> {
    changes[idx]
        .causal_parents()
        .filter_map(|op| find_change(changes, peers, op).map(|p| changes[p].lamport_of(op)))
        .try_fold(0_u32, |highest, parent| parent.checked_add(1).map(|next| highest.max(next)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
