use anyhow::{anyhow, bail, Context as AnyhowContext, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::constants::constants;
use crate::controller::SearchPolicy;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Base URL of the similarity backend (e.g., "http://localhost:5000")
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SearchConfig {
    /// Results requested per typed search
    pub default_k: Option<usize>,
    /// Results requested by the browse-all load at startup
    pub browse_k: Option<usize>,
    /// Quiet period after a keystroke before the search is sent
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct DisplayConfig {
    /// SQL longer than this many characters is collapsed
    pub truncate_at: Option<usize>,
}

impl Config {
    /// Field-by-field merge, values in `other` win
    fn merge(self, other: Config) -> Config {
        Config {
            api_url: other.api_url.or(self.api_url),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            search: SearchConfig {
                default_k: other.search.default_k.or(self.search.default_k),
                browse_k: other.search.browse_k.or(self.search.browse_k),
                debounce_ms: other.search.debounce_ms.or(self.search.debounce_ms),
            },
            display: DisplayConfig {
                truncate_at: other.display.truncate_at.or(self.display.truncate_at),
            },
        }
    }
}

pub struct ConfigManager {
    merged_config: Config,
    pub global_config_path: PathBuf,
}

const DEFAULT_CONFIG: &str = r#"# sqldash configuration file

# Base URL of the similarity search backend
# api_url = "http://localhost:5000"

# Seconds before a backend request is abandoned
# timeout_secs = 30

# [search]
# default_k = 5
# browse_k = 100
# debounce_ms = 0

# [display]
# truncate_at = 100
"#;

/// Read a config file, treating a missing or malformed file as absent
fn load_file(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    match toml::from_str::<Config>(&content) {
        Ok(config) => {
            debug!("Loaded config from {}", path.display());
            Ok(Some(config))
        }
        Err(e) => {
            warn!("Ignoring malformed config {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

impl ConfigManager {
    /// Load the global config plus `<workspace>/.sqldash/config.toml`, then environment overrides
    pub fn new(workspace_path: Option<&Path>) -> Result<Self> {
        let global_config_path = dirs::config_dir()
            .context("Could not find config directory")?
            .join(constants::GLOBAL_CONFIG_DIR_NAME)
            .join(constants::CONFIG_FILENAME);

        let local_config_path = workspace_path.map(|workspace_path| {
            workspace_path
                .join(constants::SQLDASH_DIR_NAME)
                .join(constants::CONFIG_FILENAME)
        });

        let mut manager = Self::from_paths(global_config_path, local_config_path)?;
        manager.apply_env(|key| std::env::var(key).ok());
        Ok(manager)
    }

    /// Load from explicit paths without looking at the environment
    pub fn from_paths(global_config_path: PathBuf, local_config_path: Option<PathBuf>) -> Result<Self> {
        // Seed a commented global config on first run
        if !global_config_path.exists() {
            if let Some(dir) = global_config_path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(&global_config_path, DEFAULT_CONFIG).with_context(|| {
                format!("Failed to write config file: {}", global_config_path.display())
            })?;
        }

        let global_config = load_file(&global_config_path)?.unwrap_or_default();
        let local_config = match &local_config_path {
            Some(path) => load_file(path)?,
            None => None,
        };

        // Local overrides global
        let merged_config = match local_config {
            Some(local_config) => global_config.merge(local_config),
            None => global_config,
        };

        Ok(Self {
            merged_config,
            global_config_path,
        })
    }

    /// Apply `SQLDASH_*` overrides using the given variable lookup
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(constants::API_URL_ENV).filter(|u| !u.is_empty()) {
            self.merged_config.api_url = Some(url);
        }

        if let Some(raw) = lookup(constants::TIMEOUT_SECS_ENV) {
            match raw.parse() {
                Ok(secs) => self.merged_config.timeout_secs = Some(secs),
                Err(_) => warn!(
                    "Ignoring {}={:?}: not a number of seconds",
                    constants::TIMEOUT_SECS_ENV,
                    raw
                ),
            }
        }
    }

    /// Command-line `--api-url` beats every file and variable
    pub fn override_api_url(&mut self, url: String) {
        self.merged_config.api_url = Some(url);
    }

    /// The backend base URL, validated as an absolute http(s) URL
    pub fn api_url(&self) -> Result<Url> {
        let raw = self.merged_config.api_url.as_deref().ok_or_else(|| {
            anyhow!(
                "API URL not set (use --api-url, {} or api_url in {})",
                constants::API_URL_ENV,
                self.global_config_path.display()
            )
        })?;

        let url = Url::parse(raw).with_context(|| format!("Invalid API URL: {}", raw))?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            bail!("API URL must be an http or https URL: {}", raw);
        }
        Ok(url)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.merged_config
            .timeout_secs
            .unwrap_or(constants::DEFAULT_TIMEOUT_SECS)
    }

    pub fn search_policy(&self) -> SearchPolicy {
        let search = &self.merged_config.search;
        SearchPolicy {
            default_k: search
                .default_k
                .filter(|&k| k > 0)
                .unwrap_or(constants::DEFAULT_SEARCH_K),
            browse_k: search
                .browse_k
                .filter(|&k| k > 0)
                .unwrap_or(constants::DEFAULT_BROWSE_K),
            debounce: Duration::from_millis(search.debounce_ms.unwrap_or(0)),
        }
    }

    pub fn truncate_at(&self) -> usize {
        self.merged_config
            .display
            .truncate_at
            .unwrap_or(constants::DEFAULT_TRUNCATE_AT)
    }
}
