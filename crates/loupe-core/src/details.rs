//! Document summary: size, change counts, time span, version vectors and
//! frontiers.

use serde::Serialize;

use crate::engine::DocumentEngine;
use crate::history;
use crate::model::{Frontier, VersionVector};

const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Snapshot of a loaded document's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentDetails {
    pub name: String,
    pub size_bytes: u64,
    /// `size_bytes` in human units, e.g. `1.5 KB`.
    pub size: String,
    pub change_count: usize,
    pub op_count: u64,
    pub peer_count: usize,
    /// Earliest change timestamp, in seconds.
    pub start_timestamp: Option<i64>,
    /// Latest change timestamp, in seconds.
    pub end_timestamp: Option<i64>,
    pub logged_version_vector: VersionVector,
    pub current_version_vector: VersionVector,
    pub logged_frontier: Frontier,
    pub current_frontier: Frontier,
}

impl DocumentDetails {
    /// Collect details from `engine`.
    ///
    /// `size_bytes` is the size of the export the document was loaded from.
    pub fn collect<E: DocumentEngine + ?Sized>(name: impl Into<String>, size_bytes: u64, engine: &E) -> Self {
        let changes = history::changes(engine);
        let logged_version_vector = engine.logged_version_vector();

        Self {
            name: name.into(),
            size_bytes,
            size: format_bytes(size_bytes),
            change_count: changes.len(),
            op_count: logged_version_vector.total_ops(),
            peer_count: logged_version_vector.len(),
            start_timestamp: changes.iter().map(|c| c.timestamp).min(),
            end_timestamp: changes.iter().map(|c| c.timestamp).max(),
            logged_version_vector,
            current_version_vector: engine.current_version_vector(),
            logged_frontier: engine.logged_frontier(),
            current_frontier: engine.current_frontier(),
        }
    }

    /// Whether the current checkout is behind the latest version.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.current_frontier != self.logged_frontier
    }
}

/// Format a byte count in binary units with at most two decimals.
///
/// `0` is `0 Bytes`, `1536` is `1.5 KB`, `1048576` is `1 MB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
