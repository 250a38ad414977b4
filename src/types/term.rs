//! Dictionary Term Types
//!
//! Compact representations of glossary entries used by the verification
//! layer, plus the three-way verdict it produces.

use serde::{Deserialize, Serialize};

/// One existing dictionary entry, compacted to what the verifier prompt
/// needs: the term name and a one-sentence definition summary.
///
/// Ephemeral - rebuilt from the on-disk corpus for each verification batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactTerm {
    pub name: String,
    /// First sentence of the Definition section; may be empty when the
    /// entry has no parseable Definition.
    pub summary: String,
}

impl CompactTerm {
    pub fn new(name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
        }
    }

    /// Render as a prompt line: `- Name: summary` (or `- Name` without one).
    pub fn prompt_line(&self) -> String {
        if self.summary.is_empty() {
            format!("- {}", self.name)
        } else {
            format!("- {}: {}", self.name, self.summary)
        }
    }
}

impl std::fmt::Display for CompactTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Three-way classification of a candidate term against the existing corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// The candidate fills a genuine gap - create the entry
    Generate,
    /// Existing terms already cover it - drop the candidate
    Skip,
    /// The angle overlaps - sharpen it and resubmit
    Refine,
}

impl Verdict {
    /// Keyword form used in prompts and responses.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Generate => "GENERATE",
            Self::Skip => "SKIP",
            Self::Refine => "REFINE",
        }
    }

    /// Whether the candidate should be saved.
    pub fn allows_creation(&self) -> bool {
        matches!(self, Self::Generate)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}
