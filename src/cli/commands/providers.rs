//! Providers Command
//!
//! Diagnostic listing of a profile's providers with live availability,
//! for debugging exhausted runs without burning any request quota.
//!
//! Usage:
//!   lexibot providers [--profile generate]

use console::style;
use std::path::Path;

use crate::router::LlmRouter;
use crate::types::Result;

pub fn run(profile: &str, config_file: Option<&Path>) -> Result<()> {
    let config = super::super::load_config(config_file)?;
    let router = LlmRouter::new(&config)?;

    let report = router.list_available(profile)?;

    println!("Providers for profile '{}':", style(profile).bold());
    for entry in &report {
        if entry.is_available {
            println!(
                "  {} {} ({})",
                style("✓").green(),
                entry.name,
                style(&entry.model).dim()
            );
        } else {
            println!(
                "  {} {} ({}) - {}",
                style("✗").red(),
                entry.name,
                style(&entry.model).dim(),
                entry.reason.as_deref().unwrap_or("unavailable")
            );
        }
    }

    let available = report.iter().filter(|e| e.is_available).count();
    println!("\n{}/{} available", available, report.len());

    Ok(())
}
