//! loupe-core library.
//!
//! # Conventions
//!
//! - **Errors**: Library operations return [`error::Result`]; configuration
//!   loading uses `anyhow::Result` with context.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod changelog;
pub mod config;
pub mod debounce;
pub mod details;
pub mod engine;
pub mod error;
pub mod graph;
pub mod history;
pub mod model;
pub mod timeline;

pub use changelog::ChangeLog;
pub use engine::DocumentEngine;
pub use error::{ErrorCode, LoupeError, Result};
pub use model::{Change, Frontier, OpId, PeerId, VersionVector};
pub use timeline::{Cursor, PositionIndex, ScrubOutcome, ScrubSession, TimelineListener, TimelineMapper};
