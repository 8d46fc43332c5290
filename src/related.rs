//! Related-note discovery.
//!
//! Given the content of a note that is about to be written, scan the vault
//! and collect the titles of existing notes judged related to it. The scan
//! is sequential, re-reads the vault on every call, and stops as soon as
//! `cap` matches have been found, so the result is a prefix of the match set
//! in directory-listing order rather than a ranking.
//!
//! Relevance is pluggable through the [`Relevance`] trait:
//!
//! | Strategy | Score | Threshold |
//! |----------|-------|-----------|
//! | [`SubstringRelevance`] | 1.0 if the candidate contains the content (case-insensitive), else 0.0 | 1.0 |
//! | [`TokenOverlapRelevance`] | share of the content's words present in the candidate | configurable |
//!
//! # Errors
//!
//! A vault that cannot be listed fails the whole lookup with
//! [`VaultError::VaultAccess`]. A single note that cannot be read is
//! skipped with a warning and the scan continues.

use std::collections::HashSet;
use std::path::Path;

use crate::config::{Config, RelatedConfig};
use crate::error::VaultError;
use crate::vault::{self, Vault};

/// Scores how related a candidate note is to new content.
pub trait Relevance: Send + Sync {
    /// Strategy identifier, as used in `related.strategy`.
    fn name(&self) -> &str;

    /// Score `candidate` against `content`. Higher is more related.
    fn score(&self, content: &str, candidate: &str) -> f64;

    /// Minimum score for a candidate to count as related.
    fn threshold(&self) -> f64 {
        1.0
    }

    fn is_related(&self, content: &str, candidate: &str) -> bool {
        self.score(content, candidate) >= self.threshold()
    }
}

/// Case-insensitive literal containment: the candidate must contain the
/// whole content.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringRelevance;

impl Relevance for SubstringRelevance {
    fn name(&self) -> &str {
        "substring"
    }

    fn score(&self, content: &str, candidate: &str) -> f64 {
        if candidate.to_lowercase().contains(&content.to_lowercase()) {
            1.0
        } else {
            0.0
        }
    }
}

/// Fraction of the content's distinct words that also appear in the
/// candidate.
#[derive(Debug, Clone, Copy)]
pub struct TokenOverlapRelevance {
    pub min_overlap: f64,
}

impl Relevance for TokenOverlapRelevance {
    fn name(&self) -> &str {
        "token_overlap"
    }

    fn score(&self, content: &str, candidate: &str) -> f64 {
        token_overlap(content, candidate)
    }

    fn threshold(&self) -> f64 {
        self.min_overlap
    }
}

/// Lowercased alphanumeric word tokens.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Share of `query` tokens found in `candidate`, in `[0.0, 1.0]`.
///
/// Returns `0.0` when `query` has no tokens.
pub fn token_overlap(query: &str, candidate: &str) -> f64 {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let candidate_tokens = tokenize(candidate);
    let shared = query_tokens
        .iter()
        .filter(|t| candidate_tokens.contains(*t))
        .count();
    shared as f64 / query_tokens.len() as f64
}

/// Build the relevance strategy named in the config.
pub fn create_relevance(config: &RelatedConfig) -> anyhow::Result<Box<dyn Relevance>> {
    match config.strategy.as_str() {
        "substring" => Ok(Box::new(SubstringRelevance)),
        "token_overlap" => Ok(Box::new(TokenOverlapRelevance {
            min_overlap: config.min_overlap,
        })),
        other => anyhow::bail!("Unknown related strategy: {}", other),
    }
}

/// Scans a vault for notes related to new content.
pub struct RelatedNoteFinder {
    vault: Vault,
    cap: usize,
    relevance: Box<dyn Relevance>,
}

impl RelatedNoteFinder {
    pub fn new(vault: Vault, cap: usize, relevance: Box<dyn Relevance>) -> Self {
        Self {
            vault,
            cap,
            relevance,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            Vault::from_config(config),
            config.related.match_cap,
            create_relevance(&config.related)?,
        ))
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    /// Titles of up to `cap` notes related to `content`, never including
    /// `exclude_title`.
    pub async fn find_related(
        &self,
        content: &str,
        exclude_title: &str,
    ) -> Result<Vec<String>, VaultError> {
        let entries = self.vault.list_entries().await?;

        let mut related = Vec::new();
        if self.cap == 0 || content.trim().is_empty() {
            return Ok(related);
        }

        let mut scanned = 0usize;
        let mut skipped = 0usize;
        for path in entries {
            let Some(title) = self.vault.title_from_path(&path) else {
                continue;
            };
            if title == exclude_title {
                continue;
            }

            scanned += 1;
            let candidate = match vault::read_text(&path).await {
                Ok(text) => text,
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable note");
                    continue;
                }
            };

            if self.relevance.is_related(content, &candidate) {
                related.push(title);
                if related.len() >= self.cap {
                    break;
                }
            }
        }

        tracing::debug!(
            strategy = self.relevance.name(),
            scanned,
            skipped,
            matched = related.len(),
            "related note scan finished"
        );

        Ok(related)
    }
}

/// One-shot lookup with the default substring strategy.
pub async fn find_related(
    content: &str,
    exclude_title: &str,
    vault_path: &Path,
    cap: usize,
) -> Result<Vec<String>, VaultError> {
    RelatedNoteFinder::new(
        Vault::new(vault_path, "md"),
        cap,
        Box::new(SubstringRelevance),
    )
    .find_related(content, exclude_title)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_is_case_insensitive() {
        let r = SubstringRelevance;
        assert!(r.is_related("Hello World", "we said hello world twice"));
        assert!(!r.is_related("Hello World", "hello, world"));
    }

    #[test]
    fn test_substring_direction() {
        // The candidate has to contain the content, not the other way round.
        let r = SubstringRelevance;
        assert!(!r.is_related("a long piece of content", "long"));
        assert!(r.is_related("long", "a long piece of content"));
    }

    #[test]
    fn test_token_overlap_score() {
        assert_eq!(token_overlap("rust async io", "Async IO in Rust"), 1.0);
        assert!((token_overlap("rust async io", "rust only") - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(token_overlap("", "anything"), 0.0);
        assert_eq!(token_overlap("!!!", "anything"), 0.0);
    }

    #[test]
    fn test_token_overlap_threshold() {
        let r = TokenOverlapRelevance { min_overlap: 0.5 };
        assert!(r.is_related("deploy kubernetes cluster", "How we deploy the cluster"));
        assert!(!r.is_related("deploy kubernetes cluster", "Cluster sizing"));
    }

    #[test]
    fn test_create_relevance() {
        let mut cfg = RelatedConfig::default();
        assert_eq!(create_relevance(&cfg).unwrap().name(), "substring");
        cfg.strategy = "token_overlap".to_string();
        let r = create_relevance(&cfg).unwrap();
        assert_eq!(r.name(), "token_overlap");
        assert_eq!(r.threshold(), cfg.min_overlap);
        cfg.strategy = "embedding".to_string();
        assert!(create_relevance(&cfg).is_err());
    }
}
