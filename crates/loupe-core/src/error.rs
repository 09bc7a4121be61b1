use std::fmt;

use crate::model::OpId;

/// Result alias used throughout loupe-core.
pub type Result<T, E = LoupeError> = std::result::Result<T, E>;

/// Errors raised while loading, indexing or checking out a change log.
#[derive(Debug, thiserror::Error)]
pub enum LoupeError {
    #[error("failed to read change log: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse change log: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid change log: {0}")]
    InvalidChangeLog(String),

    #[error("unknown operation {0}")]
    UnknownOperation(OpId),

    #[error("dependency cycle involving change {0}")]
    CausalCycle(OpId),

    #[error("position index covers {indexed} operations but the engine reports {logged}")]
    IndexMismatch { indexed: u64, logged: u64 },

    #[error("invalid operation id {0:?}, expected counter@peer")]
    InvalidOpId(String),
}

impl LoupeError {
    /// Stable machine code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::FileReadFailed,
            Self::Parse(_) | Self::InvalidChangeLog(_) => ErrorCode::InvalidChangeLog,
            Self::UnknownOperation(_) => ErrorCode::UnknownOperation,
            Self::CausalCycle(_) => ErrorCode::CausalCycle,
            Self::IndexMismatch { .. } => ErrorCode::IndexMismatch,
            Self::InvalidOpId(_) => ErrorCode::InvalidOpId,
        }
    }
}

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FileReadFailed,
    InvalidChangeLog,
    UnknownOperation,
    CausalCycle,
    InvalidOpId,
    IndexMismatch,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::FileReadFailed => "E1101",
            Self::InvalidChangeLog => "E2101",
            Self::UnknownOperation => "E2102",
            Self::CausalCycle => "E2103",
            Self::InvalidOpId => "E2104",
            Self::IndexMismatch => "E3101",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::FileReadFailed => Some("Check the path and read permissions."),
            Self::InvalidChangeLog => {
                Some("Re-export the document; per-peer counters must be contiguous from 0.")
            }
            Self::UnknownOperation => {
                Some("The document changed underneath the timeline; reload it.")
            }
            Self::CausalCycle => Some("Re-export the document; dependencies must be acyclic."),
            Self::InvalidOpId => Some("Write operation ids as counter@peer, e.g. 3@1."),
            Self::IndexMismatch => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
