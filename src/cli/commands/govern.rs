//! Govern Command
//!
//! Admission check for one workflow. Emits the decision through the CI
//! output channel and reports it in the exit status: callers gate the
//! rest of the job on this command succeeding.
//!
//! Usage:
//!   lexibot govern [--workflow generate]

use console::style;
use std::path::Path;

use crate::cli::output;
use crate::governor::UsageGovernor;
use crate::types::Result;

/// Returns whether the workflow may proceed; the caller maps a denial
/// to a nonzero exit code.
pub async fn run(workflow: &str, config_file: Option<&Path>) -> Result<bool> {
    let config = super::super::load_config(config_file)?;
    let budget = config.governor.monthly_budget_minutes;

    let mut governor = UsageGovernor::new(&config)?;
    let decision = governor.should_proceed(workflow).await?;

    output::emit_outputs(&[
        ("proceed", decision.proceed.to_string()),
        ("usage_pct", format!("{:.2}", decision.usage_pct)),
        ("minutes_used", format!("{:.1}", decision.minutes_used)),
    ])?;

    let status = if decision.proceed {
        style("OK").green().bold()
    } else {
        style("THROTTLED").red().bold()
    };
    println!(
        "GOVERNOR [{}]: {} | Usage: {:.0}% ({:.0}/{:.0} min)",
        status,
        workflow,
        decision.usage_pct * 100.0,
        decision.minutes_used,
        budget
    );

    Ok(decision.proceed)
}
