//! Configuration management
//!
//! Agent configuration: model provider settings, score policy, synthesis
//! limits, and the rule store location. Persisted as TOML in the platform
//! config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::ScorePolicy;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenRouter API settings
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
    /// Rule engine tuning
    #[serde(default)]
    pub engine: EngineConfig,
    /// Rule store location
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// API key is stored in the keyring, this is just a reference
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Default model for fallback answers and rule synthesis
    #[serde(default = "default_model_str")]
    pub default_model: String,
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_str() -> String {
    "mistralai/mistral-7b-instruct".to_string()
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model_str(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Rule engine tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Score bounds and step sizes
    #[serde(default)]
    pub score: ScorePolicy,
    /// Model calls allowed per synthesis before giving up
    #[serde(default = "default_synthesis_max_attempts")]
    pub synthesis_max_attempts: u32,
    /// Add a greeting rule when the repository starts out empty
    #[serde(default = "default_true")]
    pub seed_rules: bool,
}

fn default_synthesis_max_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            score: ScorePolicy::default(),
            synthesis_max_attempts: default_synthesis_max_attempts(),
            seed_rules: default_true(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the rules file; defaults to `rules.json` in the data dir
    #[serde(default)]
    pub rules_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolve the rule store path, applying the default when unset.
    pub fn rules_path(&self) -> Result<PathBuf> {
        match &self.rules_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("rules.json")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openrouter: OpenRouterConfig::default(),
            engine: EngineConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, writing defaults on first run.
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Path to the config file
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "reflex", "reflex")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Path to the data directory
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "reflex", "reflex")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}
