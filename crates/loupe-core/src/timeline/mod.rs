//! Timeline scrubbing: mapping a scalar position to a causal frontier.
//!
//! History is linearised into a position space `[0, total_length - 1]`:
//!
//! - position `0` is the empty version (nothing applied);
//! - position `total_length - 1` is the latest version (the logged frontier);
//! - any other position `p` is the state right after the `p`-th operation,
//!   counting operations in an ancestors-before-descendants order of changes.
//!
//! `total_length` is `2 + total operation count`.
//!
//! # Sub-modules
//!
//! - [`index`]: Sorted interval index from positions to changes.
//!   ([`PositionIndex`], [`IndexEntry`])
//! - [`mapper`]: Position ↔ frontier resolution over an engine snapshot.
//!   ([`TimelineMapper`], [`Cursor`])
//! - [`session`]: Scrub session that applies positions to the engine with a
//!   debounced checkout. ([`ScrubSession`], [`TimelineListener`])

pub mod index;
pub mod mapper;
pub mod session;

pub use index::{IndexEntry, PositionIndex};
pub use mapper::{Cursor, TimelineMapper};
pub use session::{ScrubOutcome, ScrubSession, TimelineListener};
