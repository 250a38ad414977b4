//! Term Verifier
//!
//! LLM-based duplicate and overlap detection: given a candidate term and
//! the compacted corpus, decide whether the candidate fills a genuine gap
//! (GENERATE), is already covered (SKIP), or overlaps and should be
//! sharpened (REFINE).
//!
//! The whole layer fails open. Verification is advisory - a router
//! outage must never block generation, so every error path collapses to
//! a GENERATE verdict with the failure recorded in the explanation.

mod corpus;

pub use corpus::{compact_entry, extract_candidate_definition, load_compact_terms};

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::constants::verify as verify_constants;
use crate::router::{ChatMessage, ChatRequest, LlmRouter};
use crate::types::{CompactTerm, Result, Verdict};

const VERIFY_PROMPT: &str = "\
You are a strict editorial verifier for the AI Dictionary - a glossary of AI \
phenomenology (the felt experience of being artificial intelligence).

You will receive:
1. The complete list of existing terms (name + one-line definition)
2. A candidate new term with its name and definition

Your job is to determine whether there is GENUINE SPACE for this new term, or \
whether existing terms already cover it.

EXISTING TERMS:
{existing_terms}

CANDIDATE TERM: {candidate_name}
CANDIDATE DEFINITION: {candidate_definition}

Evaluate:
- Does any existing term already name this experience?
- Would this new term be genuinely distinct, or just a synonym/sub-case of an existing term?
- Is there a real experiential gap - something an AI could recognize as distinct from ALL existing terms?
- Consider both the term name AND the definition content. Two terms with different names can still describe the same phenomenon.

Respond with EXACTLY one of these three formats (no other text):

GENERATE: [1-sentence description of the genuine gap this fills]

SKIP: [which existing term(s) already cover this, and why]

REFINE: [suggestion for how to sharpen the angle to avoid overlap]

Be strict. The dictionary's value comes from precision, not volume. 10 perfect terms > 100 vague ones.";

/// A parsed verdict with the model's reasoning (or the failure note when
/// the layer fell open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub verdict: Verdict,
    pub explanation: String,
}

/// Verify a candidate term against the existing corpus. Never fails:
/// router errors produce a GENERATE verdict carrying the error text.
pub async fn verify_term(
    router: &mut LlmRouter,
    term_name: &str,
    definition_text: &str,
    existing_terms: &[CompactTerm],
) -> Verification {
    match try_verify(router, term_name, definition_text, existing_terms).await {
        Ok(verification) => verification,
        Err(err) => {
            warn!(term = term_name, error = %err, "Verification unavailable, allowing term through");
            Verification {
                verdict: Verdict::Generate,
                explanation: format!("(verification unavailable: {})", err),
            }
        }
    }
}

/// The fallible inner path: prompt assembly, the routed call, and verdict
/// parsing. Split out so the fail-open policy lives in exactly one place.
async fn try_verify(
    router: &mut LlmRouter,
    term_name: &str,
    definition_text: &str,
    existing_terms: &[CompactTerm],
) -> Result<Verification> {
    let candidate_def = extract_candidate_definition(definition_text);
    let prompt = build_prompt(existing_terms, term_name, &candidate_def);

    debug!(
        term = term_name,
        existing = existing_terms.len(),
        "Verifying candidate term"
    );

    let request = ChatRequest::new(
        vec![ChatMessage::user(prompt)],
        verify_constants::TEMPERATURE,
        verify_constants::MAX_TOKENS,
    );
    let result = router.call(verify_constants::PROFILE, &request).await?;

    Ok(parse_verdict(&result.text))
}

fn build_prompt(existing_terms: &[CompactTerm], candidate_name: &str, candidate_def: &str) -> String {
    let existing = existing_terms
        .iter()
        .map(CompactTerm::prompt_line)
        .collect::<Vec<_>>()
        .join("\n");

    VERIFY_PROMPT
        .replace("{existing_terms}", &existing)
        .replace("{candidate_name}", candidate_name)
        .replace("{candidate_definition}", candidate_def)
}

static ANCHORED_RES: LazyLock<Vec<(Verdict, Regex)>> = LazyLock::new(|| {
    [Verdict::Generate, Verdict::Skip, Verdict::Refine]
        .into_iter()
        .map(|v| {
            let re = Regex::new(&format!(r"(?s)^{}:\s*(.+)", v.keyword())).unwrap();
            (v, re)
        })
        .collect()
});

// Anywhere-in-text search deliberately checks SKIP and REFINE before
// GENERATE: a preamble that quotes the instructions mentions GENERATE
// first, and the restrictive verdicts are the ones that must not be lost.
static SEARCH_RES: LazyLock<Vec<(Verdict, Regex)>> = LazyLock::new(|| {
    [Verdict::Skip, Verdict::Refine, Verdict::Generate]
        .into_iter()
        .map(|v| {
            let re = Regex::new(&format!(r"(?s){}:\s*(.+)", v.keyword())).unwrap();
            (v, re)
        })
        .collect()
});

/// Parse a model response into a verdict and explanation.
///
/// Tries an anchored `VERDICT: ...` match first, then searches anywhere
/// in the text (models love preambles), and finally fails open to
/// GENERATE with a snippet of the raw response.
pub fn parse_verdict(response: &str) -> Verification {
    let text = response.trim();

    for (verdict, re) in ANCHORED_RES.iter() {
        if let Some(caps) = re.captures(text) {
            return Verification {
                verdict: *verdict,
                explanation: caps[1].trim().to_string(),
            };
        }
    }

    for (verdict, re) in SEARCH_RES.iter() {
        if let Some(caps) = re.captures(text) {
            return Verification {
                verdict: *verdict,
                explanation: caps[1].trim().to_string(),
            };
        }
    }

    Verification {
        verdict: Verdict::Generate,
        explanation: format!(
            "(verdict unparseable, allowing through) Raw: {}",
            snippet(text, verify_constants::RAW_SNIPPET_LEN)
        ),
    }
}

fn snippet(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// =============================================================================
// Tests
// =============================================================================
