//! Error types for the geocoder core.
//!
//! The search path never returns `Result` (see `search::core`): budget
//! exhaustion and expansion rejection are silent per the error-handling
//! design. `GeonlpError` covers the import and store-open paths, where
//! data inconsistency must be surfaced rather than swallowed.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeonlpError {
    #[error("duplicate place id {0} inserted into hierarchy")]
    DuplicateId(i64),

    #[error("place {child} cannot be reparented from {old_parent} to {new_parent} without force")]
    ParentMismatch {
        child: i64,
        old_parent: i64,
        new_parent: i64,
    },

    #[error("cycle detected in parent chain starting at place {0}")]
    Cycle(i64),

    #[error("linked row references missing host place {0}")]
    MissingHost(i64),

    #[error("indexing check failed: {0}")]
    IndexCheckFailed(String),

    #[error("store version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("store file missing or unreadable at {0}")]
    StoreMissing(PathBuf),

    #[error("store corrupt: {0}")]
    StoreCorrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    #[error(transparent)]
    Sled(#[from] sled::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GeonlpError>;
