//! Position ↔ frontier resolution.
//!
//! A [`TimelineMapper`] is built from a snapshot of the engine's history and
//! never consults the engine again. Rebuild it whenever the document changes
//! identity.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::index::PositionIndex;
use crate::engine::DocumentEngine;
use crate::error::{LoupeError, Result};
use crate::model::{Change, Frontier, OpId};

/// Where the timeline points: a position, its frontier and, when there is
/// one, the change and lamport clock of the targeted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cursor {
    pub position: u64,
    pub frontier: Frontier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Change>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lamport: Option<u32>,
}

impl Cursor {
    /// Cursor for the empty version.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            position: 0,
            frontier: Frontier::empty(),
            change: None,
            lamport: None,
        }
    }

    /// Cursor at `frontier`, reporting the change holding its first operation.
    pub fn at_frontier<E: DocumentEngine + ?Sized>(position: u64, frontier: Frontier, engine: &E) -> Self {
        let change = frontier.first().and_then(|id| engine.change_containing(*id));
        let lamport = frontier
            .first()
            .zip(change.as_ref())
            .map(|(id, change)| change.lamport_of(*id));
        Self {
            position,
            frontier,
            change,
            lamport,
        }
    }
}

/// Bidirectional mapping between scalar positions and frontiers.
#[derive(Debug, Clone)]
pub struct TimelineMapper {
    index: PositionIndex,
    total_length: u64,
    logged_frontier: Frontier,
    /// Change holding the first operation of the logged frontier.
    latest_change: Option<Change>,
}

impl TimelineMapper {
    /// Index the engine's full history.
    ///
    /// `total_length` comes from the engine's own operation count. When the
    /// indexed changes disagree with it a warning is logged; see
    /// [`Self::check_consistency`].
    #[instrument(skip_all)]
    pub fn new<E: DocumentEngine + ?Sized>(engine: &E) -> Self {
        let index = PositionIndex::build(engine.changes_in_causal_order());
        let logged_ops = engine.logged_op_count();
        let logged_frontier = engine.logged_frontier();
        let latest_change = logged_frontier
            .first()
            .and_then(|id| engine.change_containing(*id));

        if index.op_count() != logged_ops {
            warn!(
                indexed = index.op_count(),
                logged = logged_ops,
                "timeline index disagrees with the engine's operation count"
            );
        }

        debug!(
            changes = index.len(),
            total_length = logged_ops + 2,
            "timeline index built"
        );

        Self {
            index,
            total_length: logged_ops + 2,
            logged_frontier,
            latest_change,
        }
    }

    /// Number of positions: operations plus the empty and latest slots.
    #[must_use]
    pub const fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Position of the latest version.
    #[must_use]
    pub const fn latest_position(&self) -> u64 {
        self.total_length - 1
    }

    #[must_use]
    pub const fn index(&self) -> &PositionIndex {
        &self.index
    }

    #[must_use]
    pub const fn logged_frontier(&self) -> &Frontier {
        &self.logged_frontier
    }

    /// Verify that the index covers exactly the engine's operations.
    ///
    /// # Errors
    ///
    /// Returns [`LoupeError::IndexMismatch`] when the indexed operation count
    /// differs from the engine's logged count.
    pub fn check_consistency(&self) -> Result<()> {
        let logged = self.total_length - 2;
        if self.index.op_count() == logged {
            Ok(())
        } else {
            Err(LoupeError::IndexMismatch {
                indexed: self.index.op_count(),
                logged,
            })
        }
    }

    /// Frontier for `position`, or `None` when it is out of range.
    #[must_use]
    pub fn resolve(&self, position: u64) -> Option<Frontier> {
        self.locate(position).map(|cursor| cursor.frontier)
    }

    /// Full cursor for `position`, or `None` when it is out of range.
    #[must_use]
    pub fn locate(&self, position: u64) -> Option<Cursor> {
        if position == 0 {
            return Some(Cursor::empty());
        }

        if position == self.latest_position() {
            return Some(Cursor {
                position,
                frontier: self.logged_frontier.clone(),
                lamport: self.latest_change.as_ref().map(Change::last_lamport),
                change: self.latest_change.clone(),
            });
        }

        let entry = self.index.find(position)?;
        let offset = u32::try_from(position - entry.base_position).ok()?;
        let id = OpId::new(entry.change.peer, entry.change.counter + offset);
        Some(Cursor {
            position,
            frontier: Frontier::single(id),
            lamport: Some(entry.change.lamport + offset),
            change: Some(entry.change.clone()),
        })
    }

    /// Position for `frontier`.
    ///
    /// A frontier with several operations is a concurrent merge point that no
    /// single position represents; it maps to the latest position. A single
    /// operation the index does not know maps to 0.
    #[must_use]
    pub fn position_of(&self, frontier: &Frontier) -> u64 {
        if *frontier == self.logged_frontier {
            return self.latest_position();
        }
        if frontier.is_empty() {
            return 0;
        }
        match frontier.as_single() {
            Some(id) => self.index.position_of(id).unwrap_or(0),
            None => self.latest_position(),
        }
    }

    /// Human label for `position`.
    #[must_use]
    pub fn label(&self, position: u64) -> String {
        if position == 0 {
            "Empty Version".to_string()
        } else if position == self.latest_position() {
            "Latest Version".to_string()
        } else {
            format!("Operation {position} of {}", self.latest_position())
        }
    }
}
