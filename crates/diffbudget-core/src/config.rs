//! Configuration management for diffbudget
//!
//! Supports feature-specific configuration sections:
//! - [budget] - provider, model and token reservations
//! - [models] - default model per provider
//! - [limits.<provider>] - extra or overriding context windows
//! - [prompt_sizes] - extra or overriding prompt overheads
//! - [truncation] - truncation notices and direction

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: &str = "1";

/// Supported configuration versions
pub const SUPPORTED_CONFIG_VERSIONS: &[&str] = &["1"];

/// Tokens reserved for the list of changed files when the caller gives none.
pub const DEFAULT_FILES_LIST_RESERVE: usize = 100;

/// Extra buffer kept free of diff content when the caller gives none.
pub const DEFAULT_SAFETY_MARGIN: usize = 500;

/// Tokens reserved for the model's answer by the command line tool.
pub const DEFAULT_OUTPUT_RESERVE: usize = 1500;

pub const DEFAULT_PROVIDER: &str = "openai";

pub const DEFAULT_PROMPT_STYLE: &str = "commit_conventional";

/// Name of the per-repository configuration file
pub const REPO_CONFIG_FILE: &str = ".diffbudget.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for tracking schema changes
    #[serde(default = "default_config_version")]
    pub version: String,

    #[serde(default)]
    pub budget: Option<BudgetConfig>,

    /// Default model per provider, used when `budget.model` is unset
    #[serde(default = "default_models")]
    pub models: HashMap<String, String>,

    /// Context windows keyed by provider, then model
    #[serde(default)]
    pub limits: HashMap<String, HashMap<String, usize>>,

    /// Prompt overhead keyed by prompt style
    #[serde(default)]
    pub prompt_sizes: HashMap<String, usize>,

    #[serde(default)]
    pub truncation: Option<TruncationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            budget: None,
            models: default_models(),
            limits: HashMap::new(),
            prompt_sizes: HashMap::new(),
            truncation: None,
        }
    }
}

/// Token budget settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name; falls back to the provider's entry in `[models]`
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_prompt_style")]
    pub prompt_style: String,

    /// Tokens reserved for the model's response
    #[serde(default = "default_output_reserve")]
    pub output_reserve: usize,

    /// Tokens reserved for the changed-files list
    #[serde(default = "default_files_list_reserve")]
    pub files_list_reserve: usize,

    #[serde(default = "default_safety_margin")]
    pub safety_margin: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            prompt_style: default_prompt_style(),
            output_reserve: default_output_reserve(),
            files_list_reserve: default_files_list_reserve(),
            safety_margin: default_safety_margin(),
        }
    }
}

/// Truncation notice overrides. Unset notices keep the built-in wording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruncationConfig {
    /// Keep the beginning of the diff (true) or its end (false)
    #[serde(default = "default_preserve_start")]
    pub preserve_start: bool,

    /// Appended when whole files were dropped
    #[serde(default)]
    pub files_notice: Option<String>,

    /// Appended when a diff without file structure was cut
    #[serde(default)]
    pub generic_notice: Option<String>,

    /// Prepended when leading files were dropped
    #[serde(default)]
    pub leading_notice: Option<String>,
}

impl Default for TruncationConfig {
    fn default() -> Self {
        Self {
            preserve_start: default_preserve_start(),
            files_notice: None,
            generic_notice: None,
            leading_notice: None,
        }
    }
}

// Default value functions for root Config
fn default_config_version() -> String {
    CURRENT_CONFIG_VERSION.to_string()
}

fn default_models() -> HashMap<String, String> {
    [
        ("openai", "gpt-4o-mini"),
        ("groq", "qwen/qwen3-32b"),
        ("claude", "claude-sonnet-4-5"),
        ("openrouter", "openai/gpt-4o-mini"),
    ]
    .into_iter()
    .map(|(provider, model)| (provider.to_string(), model.to_string()))
    .collect()
}

// Default value functions for Budget
fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_prompt_style() -> String {
    DEFAULT_PROMPT_STYLE.to_string()
}

fn default_output_reserve() -> usize {
    DEFAULT_OUTPUT_RESERVE
}

fn default_files_list_reserve() -> usize {
    DEFAULT_FILES_LIST_RESERVE
}

fn default_safety_margin() -> usize {
    DEFAULT_SAFETY_MARGIN
}

// Default value functions for Truncation
fn default_preserve_start() -> bool {
    true
}

impl Config {
    /// Check if the configuration version is supported
    pub fn is_version_supported(&self) -> bool {
        SUPPORTED_CONFIG_VERSIONS.contains(&self.version.as_str())
    }

    /// Get a warning message for unsupported versions
    pub fn version_warning(&self) -> Option<String> {
        if !self.is_version_supported() {
            Some(format!(
                "Configuration version '{}' is not supported. Supported versions: {}. Using defaults where needed.",
                self.version,
                SUPPORTED_CONFIG_VERSIONS.join(", ")
            ))
        } else {
            None
        }
    }

    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(warning) = config.version_warning() {
            tracing::warn!("{}", warning);
        }

        if config.version.is_empty() {
            config.version = CURRENT_CONFIG_VERSION.to_string();
        }

        Ok(config)
    }

    /// Get the default config directory path
    pub fn get_config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".config").join("diffbudget"))
    }

    /// Load configuration with priority:
    /// 1. Defaults
    /// 2. Global config (~/.config/diffbudget/config.toml)
    /// 3. Repo config (.diffbudget.toml)
    ///
    /// Unreadable files in these locations are logged and skipped.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(config_dir) = Self::get_config_dir() {
            let global_config = config_dir.join("config.toml");
            config = config.merge_optional_file(&global_config);
        }

        config.merge_optional_file(Path::new(REPO_CONFIG_FILE))
    }

    /// Load the layered configuration, then apply an explicit file on top.
    ///
    /// Unlike the implicit locations, an explicit file must exist and parse.
    pub fn load_with(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::load();
        match explicit {
            Some(path) => Ok(config.merge(Self::load_from_file(path)?)),
            None => Ok(config),
        }
    }

    fn merge_optional_file(self, path: &Path) -> Self {
        if !path.exists() {
            return self;
        }
        match Self::load_from_file(path) {
            Ok(loaded) => {
                tracing::debug!(path = %path.display(), "loaded configuration");
                self.merge(loaded)
            }
            Err(e) => {
                tracing::warn!("ignoring configuration: {}", e);
                self
            }
        }
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(mut self, other: Config) -> Self {
        if !other.version.is_empty() {
            self.version = other.version;
        }

        if other.budget.is_some() {
            self.budget = other.budget;
        }
        if other.truncation.is_some() {
            self.truncation = other.truncation;
        }

        self.models.extend(other.models);
        for (provider, models) in other.limits {
            self.limits.entry(provider).or_default().extend(models);
        }
        self.prompt_sizes.extend(other.prompt_sizes);
        self
    }

    /// Budget section, or its defaults when absent
    pub fn budget(&self) -> BudgetConfig {
        self.budget.clone().unwrap_or_default()
    }

    /// Truncation section, or its defaults when absent
    pub fn truncation(&self) -> TruncationConfig {
        self.truncation.clone().unwrap_or_default()
    }

    /// Model to use for `provider`: the configured one, else the provider default.
    pub fn resolve_model(&self, provider: &str) -> Option<String> {
        if let Some(model) = self.budget.as_ref().and_then(|b| b.model.clone()) {
            return Some(model);
        }
        self.models
            .get(provider)
            .or_else(|| self.models.get(DEFAULT_PROVIDER))
            .cloned()
    }
}
