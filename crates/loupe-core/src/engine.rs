//! Contract between loupe and a CRDT document engine.
//!
//! loupe never merges, encodes or materializes documents itself. Everything it
//! shows is read through [`DocumentEngine`], and the only mutation it performs
//! is [`DocumentEngine::checkout`].

use crate::error::Result;
use crate::model::{Change, Frontier, OpId, VersionVector};

/// Read access to a document's causal history plus checkout.
pub trait DocumentEngine {
    /// Causally-maximal operations across all known history.
    fn logged_frontier(&self) -> Frontier;

    /// Causally-maximal operations of the currently checked-out state.
    fn current_frontier(&self) -> Frontier;

    /// Visit every change that is a causal ancestor of (or contains an
    /// operation of) `from`, each at most once.
    ///
    /// Changes are visited descendants-first, so reversing the visit order
    /// yields an ancestors-before-descendants order. Traversal stops as soon
    /// as `visit` returns `false`.
    fn traverse_ancestors(&self, from: &Frontier, visit: &mut dyn FnMut(&Change) -> bool);

    /// The change covering `id`, if it is known.
    fn change_containing(&self, id: OpId) -> Option<Change>;

    /// Move the current state to `frontier`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::LoupeError::UnknownOperation`] when `frontier`
    /// references operations the engine does not know.
    fn checkout(&mut self, frontier: &Frontier) -> Result<()>;

    /// Version vector of all known history.
    fn logged_version_vector(&self) -> VersionVector;

    /// Version vector of the currently checked-out state.
    fn current_version_vector(&self) -> VersionVector;

    /// Total number of operations across all peers.
    fn logged_op_count(&self) -> u64 {
        self.logged_version_vector().total_ops()
    }

    /// All changes reachable from the logged frontier, in
    /// ancestors-before-descendants order.
    fn changes_in_causal_order(&self) -> Vec<Change> {
        let mut changes = Vec::new();
        self.traverse_ancestors(&self.logged_frontier(), &mut |change| {
            changes.push(change.clone());
            true
        });
        changes.reverse();
        changes
    }
}
