//! Command-Line Interface
//!
//! Thin command handlers over the library. Each workflow step in CI
//! invokes exactly one subcommand.

pub mod commands;
pub mod output;

use std::path::Path;

use crate::config::{Config, ConfigLoader};
use crate::types::Result;

/// Resolve the effective configuration: an explicit `--config` file wins,
/// otherwise the full defaults → global → project → env chain applies.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}
