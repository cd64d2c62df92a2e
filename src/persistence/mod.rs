//! Save/load persistence
//!
//! Features:
//! - Versioned binary snapshot (magic + schema version header)
//! - Atomic decode: a snapshot applies whole or not at all
//! - Backup rotation (tmp → save, old save → backup)
//! - Falls back to the backup when the primary save is unreadable

pub mod codec;
pub mod slot;
pub mod snapshot;

use std::fmt;
use std::io;

pub use slot::SaveSlot;
pub use snapshot::{SavedBlock, Snapshot};

/// Persistence failures
#[derive(Debug)]
pub enum PersistError {
    /// Underlying file error
    Io(io::Error),
    /// File does not start with the snapshot magic
    BadMagic,
    /// Schema version this build cannot read
    UnsupportedVersion(u16),
    /// Stream ended before the named field
    Truncated(&'static str),
    /// Boolean byte other than 0 or 1
    InvalidBool { field: &'static str, value: u8 },
    InvalidBlockKind(u8),
    InvalidColor(String),
    /// Well-formed field whose value the game cannot resume from
    InvalidValue { field: &'static str, value: u64 },
    /// Two surviving blocks claim the same cell
    DuplicateBlock { row: u32, column: u32 },
    /// Bytes left over after the block list
    TrailingBytes(usize),
}

pub type PersistResult<T> = Result<T, PersistError>;

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Io(e) => write!(f, "I/O error: {}", e),
            PersistError::BadMagic => write!(f, "not a session snapshot"),
            PersistError::UnsupportedVersion(v) => write!(f, "unsupported snapshot version {}", v),
            PersistError::Truncated(field) => write!(f, "snapshot truncated at {}", field),
            PersistError::InvalidBool { field, value } => {
                write!(f, "invalid boolean {} for {}", value, field)
            }
            PersistError::InvalidBlockKind(tag) => write!(f, "invalid block type {}", tag),
            PersistError::InvalidColor(label) => write!(f, "unknown block colour {:?}", label),
            PersistError::InvalidValue { field, value } => {
                write!(f, "{} out of range: {}", field, value)
            }
            PersistError::DuplicateBlock { row, column } => {
                write!(f, "duplicate block at row {} column {}", row, column)
            }
            PersistError::TrailingBytes(n) => write!(f, "{} trailing bytes after snapshot", n),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        PersistError::Io(e)
    }
}
