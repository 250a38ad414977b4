//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/lexibot/config.toml)
//! 3. Project config (.lexibot/config.toml)
//! 4. Environment variables (LEXIBOT_* prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{LexError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // e.g. LEXIBOT_GOVERNOR_REPOSITORY -> governor.repository
        figment = figment.merge(Env::prefixed("LEXIBOT_").split('_').lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| LexError::Config(format!("configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| LexError::Config(format!("configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/lexibot/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("lexibot"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".lexibot/config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".lexibot")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Show current effective configuration
    pub fn show_config(as_json: bool) -> Result<()> {
        let config = Self::load()?;

        if as_json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| LexError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize project configuration
    pub fn init_project() -> Result<PathBuf> {
        let project_dir = Self::project_dir();

        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, Self::default_project_config())?;
            info!("Created project config: {}", config_path.display());
        } else {
            info!("Project config exists: {}", config_path.display());
        }

        Ok(project_dir)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Generate default project config content (TOML)
    fn default_project_config() -> String {
        r#"# Lexibot Project Configuration
# Profiles are ordered provider lists; the first provider is tried first.

version = "1.0"

[paths]
tracker_file = ".lexibot/tracker-state.json"
governor_state_file = ".lexibot/usage-state.json"
definitions_dir = "definitions"

[governor]
monthly_budget_minutes = 2000.0
warning_threshold = 0.80
critical_threshold = 0.95
essential_workflows = ["generate"]
# repository = "owner/repo"

[[profiles.generate]]
name = "openrouter-free"
model = "openrouter/some-model:free"
api_base = "https://openrouter.ai/api/v1"
api_key_env = "OPENROUTER_API_KEY"
requests_per_day = 50
tokens_per_day = 500000
cooldown_secs = 3600

[[profiles.verify]]
name = "openrouter-free"
model = "openrouter/some-model:free"
api_base = "https://openrouter.ai/api/v1"
api_key_env = "OPENROUTER_API_KEY"
requests_per_day = 50
tokens_per_day = 500000
cooldown_secs = 3600
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file_merges_defaults() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            file,
            r#"
            [[profiles.generate]]
            name = "free-a"
            model = "test/model:free"
            api_base = "https://example.invalid/v1"
            "#
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.profile("generate").unwrap().len(), 1);
        // Governor defaults survive the merge
        assert!((config.governor.warning_threshold - 0.80).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_from_file_rejects_empty_profile() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            file,
            r#"
            [profiles]
            generate = []
            "#
        )
        .unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(&ConfigLoader::default_project_config()).unwrap();
        config.validate().unwrap();
        assert!(config.profile("generate").is_some());
        assert!(config.profile("verify").is_some());
    }
}
