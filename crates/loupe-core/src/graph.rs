//! Change dependency graph.
//!
//! # Overview
//!
//! Builds a [`petgraph`] directed graph with one node per change (or per
//! merged run of changes) and an edge `A → B` whenever `B` causally depends
//! on an operation of `A`. Layout is left to Graphviz via [`ChangeGraph::to_dot`].
//!
//! ## Node identity
//!
//! A node is named after the last operation it covers, `peer_counter`.
//!
//! ## Chain merging
//!
//! Long single-peer runs would otherwise produce one node per commit. When
//! merging is enabled, a change `next` is folded into the preceding change
//! `current` of the same peer when all of the following hold:
//!
//! - `next` starts where `current` ends;
//! - `next` is the only change depending on `current`;
//! - every causal parent of `next` lies inside `current`.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::engine::DocumentEngine;
use crate::model::{Change, OpId, PeerId};

// ---------------------------------------------------------------------------
// Node presentation
// ---------------------------------------------------------------------------

/// Visual weight of a node, by operation count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Normal,
    /// More than a thousand operations.
    Mid,
    /// More than a million operations.
    Large,
}

impl SizeClass {
    #[must_use]
    pub const fn of(length: u32) -> Self {
        if length > 1_000_000 {
            Self::Large
        } else if length > 1_000 {
            Self::Mid
        } else {
            Self::Normal
        }
    }

    const fn color(self) -> &'static str {
        match self {
            Self::Normal => "gray",
            Self::Mid => "blue",
            Self::Large => "red",
        }
    }
}

/// Node height in points, one step per order of magnitude of `length`.
#[must_use]
pub const fn node_height(length: u32) -> u32 {
    match length {
        0..100 => 70,
        100..1_000 => 130,
        1_000..10_000 => 180,
        10_000..100_000 => 230,
        100_000..1_000_000 => 280,
        1_000_000..10_000_000 => 330,
        _ => 380,
    }
}

/// Layout direction for DOT output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Top to bottom.
    #[default]
    Tb,
    /// Left to right.
    Lr,
}

impl Direction {
    const fn rankdir(self) -> &'static str {
        match self {
            Self::Tb => "TB",
            Self::Lr => "LR",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tb" | "td" => Ok(Self::Tb),
            "lr" => Ok(Self::Lr),
            other => Err(format!("unknown graph direction '{other}' (expected tb or lr)")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tb => "tb",
            Self::Lr => "lr",
        })
    }
}

// ---------------------------------------------------------------------------
// ChangeNode
// ---------------------------------------------------------------------------

/// One node: a change, or a merged run of consecutive changes of one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeNode {
    /// `peer_counter` of the last covered operation.
    pub id: String,
    pub peer: PeerId,
    pub counter: u32,
    pub length: u32,
    pub lamport: u32,
    /// Timestamp of the last merged change.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Number of changes folded into this node.
    pub changes: usize,
    pub height: u32,
    pub size_class: SizeClass,
}

impl ChangeNode {
    fn new(change: &Change) -> Self {
        let mut node = Self {
            id: String::new(),
            peer: change.peer,
            counter: change.counter,
            length: change.length,
            lamport: change.lamport,
            timestamp: change.timestamp,
            message: change.message.clone(),
            changes: 1,
            height: 0,
            size_class: SizeClass::Normal,
        };
        node.refresh();
        node
    }

    fn absorb(&mut self, next: &Change) {
        self.length += next.length;
        self.timestamp = next.timestamp;
        if self.message.is_none() {
            self.message.clone_from(&next.message);
        }
        self.changes += 1;
        self.refresh();
    }

    fn refresh(&mut self) {
        self.id = format!("{}_{}", self.peer, self.end_counter() - 1);
        self.height = node_height(self.length);
        self.size_class = SizeClass::of(self.length);
    }

    #[must_use]
    pub const fn end_counter(&self) -> u32 {
        self.counter + self.length
    }

    #[must_use]
    pub const fn contains(&self, id: OpId) -> bool {
        id.peer == self.peer && id.counter >= self.counter && id.counter < self.end_counter()
    }
}

impl fmt::Display for ChangeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({} ops)", self.counter, self.peer, self.length)
    }
}

// ---------------------------------------------------------------------------
// ChangeGraph
// ---------------------------------------------------------------------------

/// Directed change graph. An edge `A → B` means "B depends on A".
#[derive(Debug)]
pub struct ChangeGraph {
    pub graph: DiGraph<ChangeNode, ()>,
    /// Node id (`peer_counter`) to petgraph index.
    pub node_map: HashMap<String, NodeIndex>,
    /// Changes read from the engine.
    pub total_changes: usize,
    /// Changes folded into a preceding node.
    pub merged_changes: usize,
}

impl ChangeGraph {
    /// Build the graph of every change reachable from the logged frontier.
    #[instrument(skip(engine))]
    pub fn build<E: DocumentEngine + ?Sized>(engine: &E, merge_chains: bool) -> Self {
        let changes = engine.changes_in_causal_order();
        let total_changes = changes.len();

        let mut by_peer: BTreeMap<PeerId, Vec<Change>> = BTreeMap::new();
        for change in changes {
            by_peer.entry(change.peer).or_default().push(change);
        }
        for peer_changes in by_peer.values_mut() {
            peer_changes.sort_by_key(|c| c.counter);
        }

        let all: Vec<&Change> = by_peer.values().flatten().collect();

        // Step 1: group changes into nodes.
        let mut nodes: Vec<(ChangeNode, Vec<&Change>)> = Vec::new();
        let mut merged_changes = 0;
        for peer_changes in by_peer.values() {
            let mut iter = peer_changes.iter();
            let Some(first) = iter.next() else { continue };
            let mut current = (ChangeNode::new(first), vec![first]);
            for next in iter {
                if merge_chains && can_merge(&current.0, next, &all) {
                    current.0.absorb(next);
                    current.1.push(next);
                    merged_changes += 1;
                } else {
                    nodes.push(std::mem::replace(&mut current, (ChangeNode::new(next), vec![next])));
                }
            }
            nodes.push(current);
        }

        let mut graph = DiGraph::<ChangeNode, ()>::with_capacity(nodes.len(), nodes.len());
        let mut node_map: HashMap<String, NodeIndex> = HashMap::with_capacity(nodes.len());
        let mut members = Vec::with_capacity(nodes.len());
        for (node, constituents) in nodes {
            let id = node.id.clone();
            let idx = graph.add_node(node);
            node_map.insert(id, idx);
            members.push((idx, constituents));
        }

        // Step 2: edges from each dependency's node to the dependent node.
        for (target, constituents) in &members {
            for change in constituents {
                for dep in change.causal_parents() {
                    let Some(source) = find_node(&graph, dep) else {
                        continue;
                    };
                    if source != *target && !graph.contains_edge(source, *target) {
                        graph.add_edge(source, *target, ());
                    }
                }
            }
        }

        debug!(
            total_changes,
            merged_changes,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "change graph built"
        );

        Self {
            graph,
            node_map,
            total_changes,
            merged_changes,
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up a node by its `peer_counter` id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&ChangeNode> {
        self.node_map.get(id).and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Nodes ordered by lamport, then peer.
    #[must_use]
    pub fn nodes(&self) -> Vec<&ChangeNode> {
        let mut nodes: Vec<&ChangeNode> = self.graph.node_weights().collect();
        nodes.sort_by_key(|n| (n.lamport, n.peer));
        nodes
    }

    /// `(dependency, dependent)` id pairs, sorted.
    #[must_use]
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges: Vec<(String, String)> = self
            .graph
            .raw_edges()
            .iter()
            .map(|edge| {
                (
                    self.graph[edge.source()].id.clone(),
                    self.graph[edge.target()].id.clone(),
                )
            })
            .collect();
        edges.sort();
        edges
    }

    /// Render as Graphviz DOT.
    #[must_use]
    pub fn to_dot(&self, direction: Direction) -> String {
        Dot {
            graph: self,
            direction,
        }
        .to_string()
    }
}

/// DOT rendering of a [`ChangeGraph`].
struct Dot<'a> {
    graph: &'a ChangeGraph,
    direction: Direction,
}

impl fmt::Display for Dot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "digraph changes {{")?;
        writeln!(f, "    rankdir={};", self.direction.rankdir())?;
        writeln!(f, "    node [shape=box, style=rounded, fontname=monospace];")?;
        for node in self.graph.nodes() {
            writeln!(
                f,
                "    \"{}\" [label=\"{}\", height={:.2}, color={}];",
                node.id,
                escape(&node.to_string()),
                f64::from(node.height) / 72.0,
                node.size_class.color(),
            )?;
        }
        for (source, target) in self.graph.edges() {
            writeln!(f, "    \"{source}\" -> \"{target}\";")?;
        }
        writeln!(f, "}}")
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn can_merge(current: &ChangeNode, next: &Change, all: &[&Change]) -> bool {
    if current.end_counter() != next.counter {
        return false;
    }
    if !next.causal_parents().all(|dep| current.contains(dep)) {
        return false;
    }
    // `next` itself depends on `current`, so anything else makes two.
    all.iter()
        .filter(|c| !current.contains(c.id()))
        .filter(|c| c.causal_parents().any(|dep| current.contains(dep)))
        .all(|c| c.id() == next.id())
}

fn find_node(graph: &DiGraph<ChangeNode, ()>, id: OpId) -> Option<NodeIndex> {
    graph
        .node_indices()
        .find(|&idx| graph[idx].contains(id))
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
