//! Package manager adapters.
//!
//! This module provides the [`Provider`] trait and one implementation per
//! supported package manager, plus the [`Registry`] that knows all of them.
//!
//! # Available Providers
//!
//! | Provider | Source of packages | Next version from |
//! |----------|--------------------|-------------------|
//! | [`GoProvider`] (`go`) | Go bin directory | `go list -json all` staleness |
//! | [`CargoProvider`] (`cargo`) | `~/.cargo/.crates.toml` | crates.io API |
//! | [`HomebrewProvider`] (`homebrew`) | `brew info --json=v2 --installed` | same listing |
//! | [`PipProvider`] (`pip`, `pip2`, `pip3`) | `pip list` | `pip list --outdated` |
//!
//! # Example
//!
//! ```no_run
//! use compulsive::{Config, Registry};
//!
//! #[tokio::main]
//! async fn main() -> compulsive::Result<()> {
//!     let registry = Registry::new(&Config::default());
//!     for entry in registry.list_available(true).await {
//!         if let Some(provider) = entry.instance {
//!             let packages = provider.list().await?;
//!             println!("{}: {} packages", entry.name, packages.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod cargo;
mod go;
mod homebrew;
mod pip;
mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use cargo::{parse_manifest, CargoProvider, CratesClient, ManifestEntry};
pub use go::GoProvider;
pub use homebrew::HomebrewProvider;
pub use pip::PipProvider;
pub use registry::{ProviderEntry, Registry};

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;
use crate::model::Package;

/// A package manager the index can query.
///
/// Implementations translate their manager's native listing into
/// [`Package`]s that are already classified.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the stable identifier used for selection and index keys.
    fn name(&self) -> &str;

    /// Returns true if the package manager is usable on this host.
    ///
    /// A missing binary reports `false`; probing never fails.
    async fn is_available(&self) -> bool;

    /// Refreshes the package manager's own metadata before listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SyncFailed`](crate::Error::SyncFailed) when the
    /// refresh command fails.
    async fn sync(&self) -> Result<()> {
        Ok(())
    }

    /// Lists every installed package this manager knows about.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListFailed`](crate::Error::ListFailed) when the
    /// listing command cannot run and
    /// [`Error::DecodeFailed`](crate::Error::DecodeFailed) when its output
    /// does not have the expected shape.
    async fn list(&self) -> Result<Vec<Package>>;

    /// Renders the shell command that would upgrade exactly `packages`.
    fn upgrade_command(&self, packages: &[&Package]) -> String;
}

/// Knobs shared by the built-in providers.
#[derive(Debug, Clone)]
pub struct Settings {
    pub command_timeout: Duration,
    pub http_timeout: Duration,
    pub crates_api_url: String,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            command_timeout: config.command_timeout(),
            http_timeout: config.http_timeout(),
            crates_api_url: config.crates_api_url.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

fn names_of<'a>(packages: &'a [&'a Package]) -> impl Iterator<Item = &'a str> {
    packages.iter().map(|p| p.name())
}
