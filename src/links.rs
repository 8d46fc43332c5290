//! Wiki-link helpers.
//!
//! Notes reference each other with `[[Title]]`, optionally with an alias
//! (`[[Title|shown text]]`) or a heading anchor (`[[Title#Section]]`).

use std::collections::HashSet;

/// Heading used for the appended link list.
pub const RELATED_HEADING: &str = "## Related";

/// Link targets found in `text`, in order of appearance.
pub fn extract_wikilinks(text: &str) -> Vec<String> {
    let mut links = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("[[") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("]]") else {
            break;
        };
        let inner = &after[..end];
        let target = inner
            .split(['|', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        if !target.is_empty() && !target.contains('\n') {
            links.push(target.to_string());
        }
        rest = &after[end + 2..];
    }
    links
}

/// Render titles as a markdown list of wiki-links.
pub fn render_links(titles: &[String]) -> String {
    titles
        .iter()
        .map(|t| format!("- [[{}]]", t))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Titles from `titles` that `body` does not already link to.
pub fn missing_links(body: &str, titles: &[String]) -> Vec<String> {
    let existing: HashSet<String> = extract_wikilinks(body).into_iter().collect();
    let mut seen = HashSet::new();
    titles
        .iter()
        .filter(|t| !existing.contains(t.as_str()) && seen.insert(t.as_str()))
        .cloned()
        .collect()
}

/// Append a `## Related` section listing the titles not yet linked.
///
/// Returns the body unchanged when there is nothing to add.
pub fn splice_related(body: &str, titles: &[String]) -> String {
    let missing = missing_links(body, titles);
    if missing.is_empty() {
        return body.to_string();
    }

    let mut out = body.trim_end().to_string();
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(RELATED_HEADING);
    out.push('\n');
    out.push_str(&render_links(&missing));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_plain_alias_and_heading() {
        let text = "See [[Alpha]], [[Beta|the beta]] and [[Gamma#Setup]]. Not [[ ]] or [[broken";
        assert_eq!(extract_wikilinks(text), titles(&["Alpha", "Beta", "Gamma"]));
    }

    #[test]
    fn test_extract_none() {
        assert!(extract_wikilinks("plain text [single] brackets").is_empty());
    }

    #[test]
    fn test_splice_appends_section() {
        let out = splice_related("# Title\n\nBody text\n", &titles(&["A", "B"]));
        assert_eq!(out, "# Title\n\nBody text\n\n## Related\n- [[A]]\n- [[B]]\n");
    }

    #[test]
    fn test_splice_skips_existing_links() {
        let out = splice_related("Mentions [[A]] already", &titles(&["A", "B", "B"]));
        assert_eq!(out, "Mentions [[A]] already\n\n## Related\n- [[B]]\n");
    }

    #[test]
    fn test_splice_nothing_to_add() {
        let body = "Only [[A]]\n";
        assert_eq!(splice_related(body, &titles(&["A"])), body);
        assert_eq!(splice_related(body, &[]), body);
    }

    #[test]
    fn test_splice_empty_body() {
        assert_eq!(splice_related("", &titles(&["A"])), "## Related\n- [[A]]\n");
    }
}
