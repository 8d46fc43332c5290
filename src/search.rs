//! Note search.
//!
//! Two modes, both computed over a fresh read of the vault:
//!
//! - `keyword`: token overlap between the query and each note.
//! - `semantic`: cosine similarity between embedding vectors requested from
//!   the configured provider for the query and every note.
//!
//! Results are sorted by score (descending), ties broken by title.

use anyhow::{bail, Result};
use std::cmp::Ordering;

use crate::config::Config;
use crate::embedding;
use crate::models::{Note, SearchHit};
use crate::related::token_overlap;
use crate::vault::{self, Vault};

pub const DEFAULT_LIMIT: usize = 10;
const SNIPPET_CHARS: usize = 160;

pub async fn search_notes(
    config: &Config,
    query: &str,
    mode: &str,
    limit: Option<usize>,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }

    match mode {
        "keyword" | "semantic" => {}
        _ => bail!("invalid search mode: {}. Use keyword or semantic.", mode),
    }

    if mode == "semantic" && !config.embedding.is_enabled() {
        bail!("semantic search requires embeddings. Set [embedding] provider in config.");
    }

    let notes = load_notes(&Vault::from_config(config)).await?;
    let limit = limit.unwrap_or(DEFAULT_LIMIT);

    let mut hits = match mode {
        "semantic" => semantic_hits(config, query, &notes).await?,
        _ => keyword_hits(query, &notes),
    };

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });
    hits.truncate(limit);

    tracing::debug!(mode, query, hits = hits.len(), "search finished");
    Ok(hits)
}

async fn load_notes(vault: &Vault) -> Result<Vec<Note>> {
    let mut notes = Vec::new();
    for path in vault.list_entries().await? {
        let Some(title) = vault.title_from_path(&path) else {
            continue;
        };
        match vault::read_text(&path).await {
            Ok(content) => notes.push(Note {
                title,
                content,
                path,
            }),
            Err(e) => tracing::warn!(error = %e, "skipping unreadable note"),
        }
    }
    Ok(notes)
}

fn keyword_hits(query: &str, notes: &[Note]) -> Vec<SearchHit> {
    notes
        .iter()
        .filter_map(|note| {
            let haystack = format!("{}\n{}", note.title, note.content);
            let score = token_overlap(query, &haystack);
            (score > 0.0).then(|| SearchHit {
                title: note.title.clone(),
                score,
                snippet: snippet(&note.content, query),
            })
        })
        .collect()
}

async fn semantic_hits(config: &Config, query: &str, notes: &[Note]) -> Result<Vec<SearchHit>> {
    if notes.is_empty() {
        return Ok(Vec::new());
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let query_vec = embedding::embed_query(provider.as_ref(), &config.embedding, query).await?;

    let texts: Vec<String> = notes
        .iter()
        .map(|n| format!("{}\n\n{}", n.title, n.content))
        .collect();
    let vectors = embedding::embed_texts(provider.as_ref(), &config.embedding, &texts).await?;

    Ok(notes
        .iter()
        .zip(vectors.iter())
        .map(|(note, vec)| SearchHit {
            title: note.title.clone(),
            score: embedding::cosine_similarity(&query_vec, vec) as f64,
            snippet: snippet(&note.content, query),
        })
        .collect())
}

/// A short excerpt around the first query word found in `content`, or the
/// start of the note.
pub fn snippet(content: &str, query: &str) -> String {
    // Lowercased chars, each tagged with the index of the char it came from.
    let folded: Vec<(usize, char)> = content
        .chars()
        .enumerate()
        .flat_map(|(i, c)| c.to_lowercase().map(move |l| (i, l)))
        .collect();
    let start = query
        .split_whitespace()
        .filter_map(|w| find_folded(&folded, w))
        .min()
        .unwrap_or(0);

    let begin = start.saturating_sub(SNIPPET_CHARS / 4);
    let excerpt: String = content
        .chars()
        .skip(begin)
        .take(SNIPPET_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    let excerpt = excerpt.trim();
    if begin > 0 {
        format!("…{}", excerpt)
    } else {
        excerpt.to_string()
    }
}

/// Char index in the original content where `word` first occurs,
/// compared case-insensitively.
fn find_folded(folded: &[(usize, char)], word: &str) -> Option<usize> {
    let needle: Vec<char> = word.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }
    folded
        .windows(needle.len())
        .find(|window| window.iter().map(|(_, c)| *c).eq(needle.iter().copied()))
        .map(|window| window[0].0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn vault_with(files: &[(&str, &str)]) -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        for (name, body) in files {
            fs::write(tmp.path().join(name), body).unwrap();
        }
        let config = Config::for_vault(tmp.path());
        (tmp, config)
    }

    #[tokio::test]
    async fn test_keyword_ranks_by_overlap() {
        let (_tmp, config) = vault_with(&[
            ("deploy.md", "How to deploy the service to kubernetes"),
            ("cooking.md", "Pasta recipe"),
            ("k8s.md", "Kubernetes cluster notes"),
        ]);
        let hits = search_notes(&config, "deploy kubernetes", "keyword", None)
            .await
            .unwrap();
        let titles: Vec<&str> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["deploy", "k8s"]);
        assert_eq!(hits[0].score, 1.0);
        assert_eq!(hits[1].score, 0.5);
    }

    #[tokio::test]
    async fn test_keyword_limit() {
        let (_tmp, config) = vault_with(&[("a.md", "rust"), ("b.md", "rust"), ("c.md", "rust")]);
        let hits = search_notes(&config, "rust", "keyword", Some(2)).await.unwrap();
        let titles: Vec<&str> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (_tmp, config) = vault_with(&[]);
        let err = search_notes(&config, "  ", "keyword", None).await.unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[tokio::test]
    async fn test_semantic_requires_embeddings() {
        let (_tmp, config) = vault_with(&[("a.md", "x")]);
        let err = search_notes(&config, "x", "semantic", None).await.unwrap_err();
        assert!(err.to_string().contains("requires embeddings"));
    }

    #[tokio::test]
    async fn test_unknown_mode() {
        let (_tmp, config) = vault_with(&[]);
        let err = search_notes(&config, "x", "fuzzy", None).await.unwrap_err();
        assert!(err.to_string().contains("invalid search mode"));
    }

    #[test]
    fn test_snippet_centers_on_match() {
        let content = format!("{}needle in the haystack", "padding ".repeat(30));
        let s = snippet(&content, "Needle");
        assert!(s.starts_with('…'));
        assert!(s.contains("needle in the haystack"));
    }

    #[test]
    fn test_snippet_with_case_folding_that_changes_length() {
        // 'İ' lowercases to two chars, so byte offsets in the lowercased
        // text do not line up with the original.
        let content = format!("{}target", "İ".repeat(100));
        let s = snippet(&content, "TARGET");
        assert_eq!(s, format!("…{}target", "İ".repeat(40)));
    }

    #[test]
    fn test_snippet_without_match() {
        assert_eq!(snippet("line one\nline two", "absent"), "line one line two");
    }
}
