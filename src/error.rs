//! Typed errors for vault access.
//!
//! Library code that touches the vault returns [`VaultError`] so callers can
//! tell a missing vault apart from a missing note. Higher-level flows wrap
//! these in `anyhow::Error`; the HTTP layer downcasts back to pick a status.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// The vault directory is missing, not a directory, or cannot be listed.
    #[error("vault directory not accessible: {path}: {source}")]
    VaultAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read note {path}: {source}")]
    NoteRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write note {path}: {source}")]
    NoteWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("note not found: {0}")]
    NoteNotFound(String),

    #[error("note already exists: {0}")]
    NoteExists(String),

    #[error("invalid note title: {0:?}")]
    InvalidTitle(String),
}

impl VaultError {
    pub(crate) fn vault_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::VaultAccess {
            path: path.into(),
            source,
        }
    }
}
