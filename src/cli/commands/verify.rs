//! Verify Command
//!
//! Classify a candidate term against the existing corpus.
//!
//! Usage:
//!   lexibot verify "Term Name" path/to/definition.md

use console::style;
use std::fs;
use std::path::Path;

use crate::router::LlmRouter;
use crate::types::{Result, Verdict};
use crate::verifier::{load_compact_terms, verify_term};

pub async fn run(term_name: &str, definition: &Path, config_file: Option<&Path>) -> Result<()> {
    let config = super::super::load_config(config_file)?;
    let definition_text = fs::read_to_string(definition)?;
    let existing = load_compact_terms(&config.paths.definitions_dir)?;

    let mut router = LlmRouter::new(&config)?;
    let verification = verify_term(&mut router, term_name, &definition_text, &existing).await;

    let keyword = match verification.verdict {
        Verdict::Generate => style("GENERATE").green().bold(),
        Verdict::Skip => style("SKIP").yellow().bold(),
        Verdict::Refine => style("REFINE").cyan().bold(),
    };
    println!("{}: {}", keyword, verification.explanation);

    Ok(())
}
