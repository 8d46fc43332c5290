//! # Note Harness
//!
//! A local integration service that lets AI agents create, update, link,
//! and search notes in a markdown vault.
//!
//! A vault is a flat directory of `<title>.md` files that reference each
//! other with `[[wiki-links]]`. When an agent writes a note, Note Harness
//! structures the content, finds existing notes related to it, and splices
//! links to them into the note before writing it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌─────────────────┐   ┌─────────┐
//! │  Tools   │──▶│  Structure  │──▶│ RelatedNote-    │──▶│  Vault  │
//! │ CLI/HTTP │   │ (LLM/plain) │   │ Finder + links  │   │ (*.md)  │
//! └──────────┘   └─────────────┘   └─────────────────┘   └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! nh related "retry budget" --exclude "Today"
//! nh create "# Retry budget\nCap retries at 3" --title "Retry budget"
//! nh daily "Reviewed the retry budget"
//! nh search "retry" --mode keyword
//! nh serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Vault error taxonomy |
//! | [`models`] | Core data types |
//! | [`vault`] | Flat-directory note store |
//! | [`related`] | Related-note discovery |
//! | [`links`] | Wiki-link extraction and splicing |
//! | [`structure`] | Content structuring |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`search`] | Keyword and semantic note search |
//! | [`daily`] | Daily-note resolution and bootstrapping |
//! | [`notes`] | Create-note and update-daily-note flows |
//! | [`traits`] | Tool trait and registry |
//! | [`server`] | JSON HTTP server |

pub mod config;
pub mod daily;
pub mod embedding;
pub mod error;
pub mod links;
pub mod models;
pub mod notes;
pub mod related;
pub mod search;
pub mod server;
pub mod structure;
pub mod traits;
pub mod vault;
