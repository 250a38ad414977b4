//! Config Command
//!
//! Manage Lexibot configuration.
//!
//! Usage:
//!   lexibot config show [-f json]
//!   lexibot config path
//!   lexibot config init

use console::style;

use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration
pub fn show(format: &str) -> Result<()> {
    ConfigLoader::show_config(format == "json")
}

/// Show configuration file paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Initialize project configuration
pub fn init() -> Result<()> {
    let dir = ConfigLoader::init_project()?;
    println!("{} Initialized project configuration", style("✓").green());
    println!("  Directory: {}", dir.display());
    println!(
        "  Config:    {}",
        ConfigLoader::project_config_path().display()
    );
    Ok(())
}
