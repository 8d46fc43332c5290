//! Note write flows.
//!
//! Both flows share the same shape: structure the incoming text, look up
//! related notes (never the note being written), splice them in as
//! wiki-links, then write to the vault.

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::path::PathBuf;

use crate::config::Config;
use crate::daily::DailyNotes;
use crate::links;
use crate::related::RelatedNoteFinder;
use crate::structure::Structurer;
use crate::vault::{self, Vault};

#[derive(Debug, Clone, Serialize)]
pub struct CreatedNote {
    pub title: String,
    pub path: PathBuf,
    pub related: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedNote {
    pub title: String,
    pub path: PathBuf,
    pub related: Vec<String>,
    /// Whether the daily note had to be bootstrapped first.
    pub created: bool,
}

pub async fn create_note(
    config: &Config,
    structurer: &dyn Structurer,
    raw: &str,
    title_hint: Option<&str>,
    overwrite: bool,
) -> Result<CreatedNote> {
    if raw.trim().is_empty() {
        bail!("content must not be empty");
    }

    let structured = structurer.structure(raw, title_hint).await?;
    let vault = Vault::from_config(config);
    // Validate before scanning so a bad title fails fast.
    vault.note_path(&structured.title)?;

    let finder = RelatedNoteFinder::from_config(config)?;
    let related = finder
        .find_related(&structured.content, &structured.title)
        .await?;

    let body = links::splice_related(&structured.content, &related);
    let path = vault
        .write_note(&structured.title, &body, overwrite)
        .await?;

    Ok(CreatedNote {
        title: structured.title,
        path,
        related,
        tags: structured.tags,
    })
}

/// Append `content` to the daily note for `date` (today when `None`).
pub async fn update_daily_note(
    config: &Config,
    structurer: &dyn Structurer,
    content: &str,
    date: Option<NaiveDate>,
) -> Result<UpdatedNote> {
    if content.trim().is_empty() {
        bail!("content must not be empty");
    }

    let now = Local::now();
    let date = date.unwrap_or_else(|| now.date_naive());
    let daily = DailyNotes::from_config(config);
    let title = daily.title_for(date)?;
    let (path, created) = daily.ensure(date).await?;

    let structured = structurer.structure(content, Some(&title)).await?;

    let finder = RelatedNoteFinder::from_config(config)?;
    let related = finder.find_related(&structured.content, &title).await?;

    let existing = vault::read_text(&path).await?;
    let time = now.format("%H:%M").to_string();
    let section = render_section(&time, &structured.content, &related, &existing);

    Vault::from_config(config)
        .append_to_path(&path, &section)
        .await?;
    tracing::info!(
        title = %title,
        path = %path.display(),
        related = related.len(),
        "daily note updated"
    );

    Ok(UpdatedNote {
        title,
        path,
        related,
        created,
    })
}

/// A `## HH:MM` section with the content and links the note lacks so far.
fn render_section(time: &str, content: &str, related: &[String], existing: &str) -> String {
    let mut section = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        section.push('\n');
    }
    section.push_str(&format!("\n## {}\n\n{}\n", time, content.trim_end()));

    let combined = format!("{}{}", existing, content);
    let missing = links::missing_links(&combined, related);
    if !missing.is_empty() {
        section.push('\n');
        section.push_str(&links::render_links(&missing));
        section.push('\n');
    }
    section
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_section_with_links() {
        let s = render_section(
            "09:30",
            "Standup notes\n",
            &["Alpha".to_string()],
            "# 2026-01-01\n",
        );
        assert_eq!(s, "\n## 09:30\n\nStandup notes\n\n- [[Alpha]]\n");
    }

    #[test]
    fn test_render_section_skips_known_links() {
        let s = render_section(
            "10:00",
            "more",
            &["Alpha".to_string()],
            "# day\nsee [[Alpha]]",
        );
        assert_eq!(s, "\n\n## 10:00\n\nmore\n");
    }
}
