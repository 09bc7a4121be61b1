//! Change history listing and search.

use serde::Serialize;

use crate::engine::DocumentEngine;
use crate::model::{Change, OpId};

/// All changes reachable from the logged frontier, newest first.
pub fn changes<E: DocumentEngine + ?Sized>(engine: &E) -> Vec<Change> {
    let mut changes = Vec::new();
    engine.traverse_ancestors(&engine.logged_frontier(), &mut |change| {
        changes.push(change.clone());
        true
    });
    changes
}

/// Search query over the change history.
///
/// A change matches when the query:
///
/// - equals its peer id;
/// - contains the id of its first operation (`counter@peer`);
/// - is exactly `c@p` with `p` its peer and `c` inside its counter range;
/// - is a case-insensitive substring of its message.
///
/// A blank query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeFilter {
    query: String,
    lowercase: String,
}

impl ChangeFilter {
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let query = query.trim();
        Self {
            query: query.to_string(),
            lowercase: query.to_lowercase(),
        }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.query.is_empty()
    }

    #[must_use]
    pub fn matches(&self, change: &Change) -> bool {
        if self.is_blank() {
            return true;
        }

        if self.query == change.peer.to_string() {
            return true;
        }

        if self.query.contains(&change.id().to_string()) {
            return true;
        }

        if self.query.parse::<OpId>().is_ok_and(|id| change.contains(id)) {
            return true;
        }

        change
            .message
            .as_deref()
            .is_some_and(|message| message.to_lowercase().contains(&self.lowercase))
    }

    /// Matching changes, preserving order.
    pub fn apply<'a>(&'a self, changes: &'a [Change]) -> impl Iterator<Item = &'a Change> + 'a {
        changes.iter().filter(|change| self.matches(change))
    }
}
