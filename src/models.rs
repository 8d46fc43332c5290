//! Core data models used throughout Note Harness.
//!
//! These types represent the notes, summaries, and search hits that flow
//! between the vault, the note flows, and the tool surface.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A note read from the vault.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub title: String,
    pub content: String,
    pub path: PathBuf,
}

/// Listing entry for a note, without its body.
#[derive(Debug, Clone, Serialize)]
pub struct NoteSummary {
    pub title: String,
    pub path: PathBuf,
    pub bytes: u64,
    /// RFC 3339 modification time.
    pub modified: String,
}

/// Output of a content-structuring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredNote {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A ranked note returned by search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub score: f64,
    pub snippet: String,
}
