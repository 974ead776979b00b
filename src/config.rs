//! Configuration file handling.
//!
//! This module provides loading and saving of compulsive configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/compulsive/config.toml`
//! - macOS: `~/Library/Application Support/compulsive/config.toml`
//! - Windows: `%APPDATA%\compulsive\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! providers = ["cargo", "homebrew"]
//! sync = false
//! command_timeout_secs = 300
//! http_timeout_secs = 10
//! crates_api_url = "https://crates.io/api/v1/crates"
//!
//! [ignore]
//! outdated = ["homebrew/python@*", "cargo/rustfmt"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::platform;

pub const DEFAULT_CRATES_API_URL: &str = "https://crates.io/api/v1/crates";

/// Application configuration.
///
/// # Example
///
/// ```no_run
/// use compulsive::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Sync before listing: {}", config.sync);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Providers to query when no `--provider` flag is given.
    ///
    /// Default: empty, meaning every available provider
    pub providers: Vec<String>,

    /// Whether to refresh package manager metadata before listing.
    ///
    /// Default: false
    pub sync: bool,

    /// Upper bound for any package manager command, in seconds.
    ///
    /// Default: 300
    pub command_timeout_secs: u64,

    /// Upper bound for registry lookups, in seconds.
    ///
    /// Default: 10
    pub http_timeout_secs: u64,

    /// Base URL of the crates.io API used to find the latest crate versions.
    pub crates_api_url: String,

    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Packages hidden from the outdated listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// `provider/package` references, `*` matches any run of characters.
    ///
    /// Useful for packages intentionally pinned to older versions.
    pub outdated: Vec<String>,
}

impl IgnoreConfig {
    /// Check if outdated reporting should be skipped for a package reference.
    pub fn should_ignore_outdated(&self, reference: &str) -> bool {
        self.outdated.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, reference)
            } else {
                pattern == reference
            }
        })
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    let first = parts[0];
    if !first.is_empty() {
        if !remaining.starts_with(first) {
            return false;
        }
        remaining = &remaining[first.len()..];
    }

    let last = parts[parts.len() - 1];
    if !last.is_empty() {
        if remaining.len() < last.len() || !remaining.ends_with(last) {
            return false;
        }
        remaining = &remaining[..remaining.len() - last.len()];
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            sync: false,
            command_timeout_secs: 300,
            http_timeout_secs: 10,
            crates_api_url: DEFAULT_CRATES_API_URL.to_string(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
