//! Content structuring.
//!
//! Turns raw agent-supplied text into a [`StructuredNote`] (title, body,
//! tags) before it is written to the vault. Two implementations:
//!
//! - [`PassthroughStructurer`] keeps the text as-is and derives a title
//!   locally. Used when `structuring.provider = "disabled"`.
//! - [`OpenAIStructurer`] makes one chat-completions call asking the model
//!   for a JSON object and parses the reply.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::StructuringConfig;
use crate::embedding::post_json_with_retry;
use crate::models::StructuredNote;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TITLE_CHARS: usize = 80;

const SYSTEM_PROMPT: &str = "You organise raw text into a markdown note for a personal knowledge vault. \
Reply with a single JSON object and nothing else, shaped as \
{\"title\": string, \"content\": string, \"tags\": [string]}. \
The title is short, has no slashes, and no file extension. \
The content is clean markdown that keeps every fact from the input. \
Tags are lowercase words without the leading '#'.";

#[async_trait]
pub trait Structurer: Send + Sync {
    fn name(&self) -> &str;

    /// Structure `raw`. A non-empty `title_hint` wins over any derived title.
    async fn structure(&self, raw: &str, title_hint: Option<&str>) -> Result<StructuredNote>;
}

/// Leaves content untouched and derives a title from it.
pub struct PassthroughStructurer;

#[async_trait]
impl Structurer for PassthroughStructurer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn structure(&self, raw: &str, title_hint: Option<&str>) -> Result<StructuredNote> {
        let title = match non_blank(title_hint) {
            Some(hint) => hint.trim().to_string(),
            None => derive_title(raw),
        };
        Ok(StructuredNote {
            title,
            content: raw.to_string(),
            tags: extract_tags(raw),
        })
    }
}

pub struct OpenAIStructurer {
    model: String,
    timeout_secs: u64,
    max_retries: u32,
}

impl OpenAIStructurer {
    pub fn new(config: &StructuringConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("structuring.model required for OpenAI provider"))?;
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }
        Ok(Self {
            model,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Structurer for OpenAIStructurer {
    fn name(&self) -> &str {
        "openai"
    }

    async fn structure(&self, raw: &str, title_hint: Option<&str>) -> Result<StructuredNote> {
        let mut user = String::new();
        if let Some(hint) = non_blank(title_hint) {
            user.push_str(&format!("Use this exact title: {}\n\n", hint.trim()));
        }
        user.push_str(raw);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user }
            ],
            "response_format": { "type": "json_object" }
        });

        let json =
            post_json_with_retry(OPENAI_CHAT_URL, &body, self.timeout_secs, self.max_retries)
                .await?;
        let reply = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;

        let mut note = parse_structured_response(reply)?;
        if let Some(hint) = non_blank(title_hint) {
            note.title = hint.trim().to_string();
        }
        tracing::debug!(model = %self.model, title = %note.title, "content structured");
        Ok(note)
    }
}

pub fn create_structurer(config: &StructuringConfig) -> Result<Box<dyn Structurer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(PassthroughStructurer)),
        "openai" => Ok(Box::new(OpenAIStructurer::new(config)?)),
        other => bail!("Unknown structuring provider: {}", other),
    }
}

/// Parse the model's JSON reply, tolerating a surrounding markdown fence.
pub fn parse_structured_response(reply: &str) -> Result<StructuredNote> {
    let trimmed = strip_code_fence(reply.trim());
    let mut note: StructuredNote =
        serde_json::from_str(trimmed).context("structuring reply is not valid note JSON")?;

    note.title = sanitize_title(&note.title);
    if note.title.is_empty() {
        note.title = derive_title(&note.content);
    }
    note.tags = note
        .tags
        .into_iter()
        .map(|t| t.trim().trim_start_matches('#').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    Ok(note)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Title from the first markdown heading, else the first non-empty line.
pub fn derive_title(text: &str) -> String {
    let first_heading = text
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with('#') && l.trim_start_matches('#').starts_with(' '))
        .map(|l| l.trim_start_matches('#').trim());
    let candidate = first_heading
        .or_else(|| text.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or_default();

    let title = sanitize_title(candidate);
    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title
    }
}

/// Replace characters that cannot appear in a file name and clamp length.
pub fn sanitize_title(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => ' ',
            c => c,
        })
        .take(MAX_TITLE_CHARS)
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    cleaned.to_string()
}

/// `#tag` tokens in the text, lowercased, in first-seen order.
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        let Some(tag) = word.strip_prefix('#') else {
            continue;
        };
        let tag: String = tag
            .chars()
            .take_while(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '/'))
            .collect::<String>()
            .to_lowercase();
        if tag.is_empty() || tag.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_prefers_heading() {
        assert_eq!(derive_title("intro line\n# Real Title\nbody"), "Real Title");
        assert_eq!(derive_title("\n\n  first line  \nsecond"), "first line");
        assert_eq!(derive_title(""), "Untitled");
        assert_eq!(derive_title("#tag only"), "#tag only");
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("a/b: c?"), "a-b- c-");
        assert_eq!(sanitize_title(".."), "");
        assert_eq!(sanitize_title(&"x".repeat(200)).len(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_extract_tags() {
        let tags = extract_tags("Met #Alice about #project-x. #project-x again, # nope #2024");
        assert_eq!(tags, vec!["alice".to_string(), "project-x".to_string()]);
    }

    #[test]
    fn test_parse_plain_json() {
        let note = parse_structured_response(
            r##"{"title": "Weekly sync", "content": "- shipped", "tags": ["#Work", " team "]}"##,
        )
        .unwrap();
        assert_eq!(note.title, "Weekly sync");
        assert_eq!(note.content, "- shipped");
        assert_eq!(note.tags, vec!["work".to_string(), "team".to_string()]);
    }

    #[test]
    fn test_parse_fenced_json_without_tags() {
        let reply = "```json\n{\"title\": \"a/b\", \"content\": \"body\"}\n```";
        let note = parse_structured_response(reply).unwrap();
        assert_eq!(note.title, "a-b");
        assert!(note.tags.is_empty());
    }

    #[test]
    fn test_parse_empty_title_falls_back() {
        let note = parse_structured_response(
            r##"{"title": "", "content": "# Derived\ntext"}"##,
        )
        .unwrap();
        assert_eq!(note.title, "Derived");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_structured_response("Sure! Here is your note.").is_err());
    }

    #[tokio::test]
    async fn test_passthrough_uses_hint() {
        let s = PassthroughStructurer;
        let note = s.structure("# Heading\nbody #idea", Some(" Chosen ")).await.unwrap();
        assert_eq!(note.title, "Chosen");
        assert_eq!(note.content, "# Heading\nbody #idea");
        assert_eq!(note.tags, vec!["idea".to_string()]);

        let note = s.structure("# Heading\nbody", Some("  ")).await.unwrap();
        assert_eq!(note.title, "Heading");
    }

    #[test]
    fn test_create_structurer_disabled() {
        let s = create_structurer(&StructuringConfig::default()).unwrap();
        assert_eq!(s.name(), "disabled");
    }
}
