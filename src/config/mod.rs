//! Configuration System
//!
//! Profile declarations, governor policy, and persisted-state paths,
//! loaded through Figment (defaults → TOML files → env vars).

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{Config, GovernorSettings, PathsConfig, ProviderKind, ProviderSpec};
