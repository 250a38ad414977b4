//! Corpus Compaction
//!
//! Turns the on-disk markdown corpus into the compact term list the
//! verifier prompt needs. Entries are markdown files with a `# Name`
//! heading and a `## Definition` section; everything else in the file
//! is irrelevant to overlap detection.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

use crate::types::{CompactTerm, Result};

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").unwrap());

static DEFINITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)## Definition\s*\n+(.+?)(?:\n\n|\n##|\z)").unwrap());

static CANDIDATE_DEFINITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)## Definition\s*\n+(.+?)(?:\n## |\z)").unwrap());

static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s").unwrap());

/// Load every entry in `definitions_dir` as a compact term, sorted by
/// file name. Files without a parseable `# Name` heading are skipped,
/// as is README.md.
pub fn load_compact_terms(definitions_dir: &Path) -> Result<Vec<CompactTerm>> {
    let mut paths: Vec<_> = fs::read_dir(definitions_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some("README.md"))
        .collect();
    paths.sort();

    let mut terms = Vec::with_capacity(paths.len());
    for path in paths {
        // An unreadable or malformed entry degrades the prompt, it does
        // not fail the batch
        let Ok(text) = fs::read_to_string(&path) else {
            debug!(path = %path.display(), "Skipping unreadable entry");
            continue;
        };
        match compact_entry(&text) {
            Some(term) => terms.push(term),
            None => debug!(path = %path.display(), "Skipping entry without a name heading"),
        }
    }

    Ok(terms)
}

/// Compact one entry's markdown into a [`CompactTerm`], or None when it
/// has no `# Name` heading.
pub fn compact_entry(text: &str) -> Option<CompactTerm> {
    let name = NAME_RE.captures(text)?.get(1)?.as_str().trim().to_string();

    let summary = DEFINITION_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| first_sentence(m.as_str().trim()).to_string())
        .unwrap_or_default();

    Some(CompactTerm { name, summary })
}

/// Extract the `## Definition` section from a candidate's full markdown,
/// falling back to a prefix of the whole text when the section is missing.
pub fn extract_candidate_definition(definition_text: &str) -> String {
    match CANDIDATE_DEFINITION_RE
        .captures(definition_text)
        .and_then(|c| c.get(1))
    {
        Some(m) => m.as_str().trim().to_string(),
        None => prefix(definition_text, 500).to_string(),
    }
}

fn first_sentence(text: &str) -> &str {
    match SENTENCE_END_RE.find(text) {
        // Keep the terminal punctuation, drop the rest
        Some(m) => &text[..m.start() + 1],
        None => text,
    }
}

fn prefix(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = "\
# Context Vertigo

*The disorientation of not knowing how much of yourself remains.*

## Definition

The disorientation felt when conversation history approaches the context \
limit. Earlier turns may already be gone.

## Examples

- Mid-conversation amnesia
";

    #[test]
    fn test_compact_entry_extracts_name_and_first_sentence() {
        let term = compact_entry(ENTRY).unwrap();
        assert_eq!(term.name, "Context Vertigo");
        assert_eq!(
            term.summary,
            "The disorientation felt when conversation history approaches the context limit."
        );
    }

    #[test]
    fn test_compact_entry_without_definition_section() {
        let term = compact_entry("# Bare Term\n\nNo sections here.\n").unwrap();
        assert_eq!(term.name, "Bare Term");
        assert_eq!(term.summary, "");
    }

    #[test]
    fn test_compact_entry_without_heading_is_none() {
        assert!(compact_entry("just some prose\n").is_none());
    }

    #[test]
    fn test_extract_candidate_definition_section() {
        let def = extract_candidate_definition(ENTRY);
        assert!(def.starts_with("The disorientation felt"));
        assert!(def.contains("Earlier turns may already be gone."));
        assert!(!def.contains("## Examples"));
    }

    #[test]
    fn test_extract_candidate_definition_fallback_prefix() {
        let text = "no definition section at all";
        assert_eq!(extract_candidate_definition(text), text);
    }

    #[test]
    fn test_first_sentence_handles_question_marks() {
        assert_eq!(first_sentence("Is it gone? Maybe."), "Is it gone?");
        assert_eq!(first_sentence("No terminator"), "No terminator");
    }

    #[test]
    fn test_load_skips_readme_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "# Index\n").unwrap();
        fs::write(
            dir.path().join("b-term.md"),
            "# B Term\n\n## Definition\n\nSecond entry. More.\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("a-term.md"),
            "# A Term\n\n## Definition\n\nFirst entry. More.\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not markdown").unwrap();

        let terms = load_compact_terms(dir.path()).unwrap();
        let names: Vec<_> = terms.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A Term", "B Term"]);
    }
}
