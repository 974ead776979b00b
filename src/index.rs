//! Per-provider package index.
//!
//! An [`Index`] is built fresh for every invocation by an [`IndexBuilder`],
//! which queries the selected providers concurrently. Bulk builds keep going
//! when a provider fails; single-provider builds report the failure.
//!
//! # Example
//!
//! ```no_run
//! use compulsive::{Config, IndexBuilder, Registry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Registry::new(&Config::default());
//!     let index = IndexBuilder::new(&registry).build_all().await;
//!
//!     for pkg in index.outdated() {
//!         println!("{} {} -> {:?}", pkg.reference(), pkg.version(), pkg.next_version());
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Package, PackageRef};
use crate::provider::{Provider, ProviderEntry, Registry};

struct ProviderIndex {
    provider: Box<dyn Provider>,
    packages: BTreeMap<String, Package>,
}

/// Packages of every queried provider, keyed by provider then package name.
#[derive(Default)]
pub struct Index {
    providers: BTreeMap<String, ProviderIndex>,
    failures: BTreeMap<String, Error>,
}

impl Index {
    fn insert(&mut self, name: String, provider: Box<dyn Provider>, packages: Vec<Package>) {
        let mut by_name = BTreeMap::new();
        for pkg in packages {
            if let Some(previous) = by_name.insert(pkg.name().to_string(), pkg) {
                warn!(
                    provider = %name,
                    package = %previous.name(),
                    "provider listed a package twice"
                );
            }
        }
        self.providers.insert(
            name,
            ProviderIndex {
                provider,
                packages: by_name,
            },
        );
    }

    /// Names of the providers that listed successfully, in order.
    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn contains_provider(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }

    /// Packages of `provider` sorted by name; empty when it was not indexed.
    pub fn packages_of(&self, provider: &str) -> Vec<&Package> {
        self.providers
            .get(provider)
            .map(|p| p.packages.values().collect())
            .unwrap_or_default()
    }

    pub fn find(&self, provider: &str, package: &str) -> Result<&Package> {
        let index = self
            .providers
            .get(provider)
            .ok_or_else(|| Error::ProviderNotFound(provider.to_string()))?;
        index.packages.get(package).ok_or_else(|| Error::PackageNotFound {
            provider: provider.to_string(),
            package: package.to_string(),
        })
    }

    /// Every package, ordered by provider then package name.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.providers.values().flat_map(|p| p.packages.values())
    }

    pub fn outdated(&self) -> impl Iterator<Item = &Package> {
        self.packages().filter(|p| p.is_outdated())
    }

    /// Providers whose sync or listing failed during a bulk build.
    pub fn failures(&self) -> &BTreeMap<String, Error> {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.providers.values().all(|p| p.packages.is_empty())
    }

    /// The command `provider` would run to upgrade `packages`.
    ///
    /// Returns `None` when the provider is not indexed or nothing is given.
    pub fn upgrade_command(&self, provider: &str, packages: &[&Package]) -> Option<String> {
        if packages.is_empty() {
            return None;
        }
        let index = self.providers.get(provider)?;
        Some(index.provider.upgrade_command(packages))
    }

    /// Upgrade commands for `packages`, one per provider that owns any of them.
    pub fn upgrade_commands(&self, packages: &[&Package]) -> BTreeMap<&str, String> {
        self.provider_names()
            .filter_map(|provider| {
                let selected: Vec<&Package> = packages
                    .iter()
                    .copied()
                    .filter(|p| p.provider() == provider)
                    .collect();
                Some((provider, self.upgrade_command(provider, &selected)?))
            })
            .collect()
    }
}

/// Builds an [`Index`] from the providers of a [`Registry`].
pub struct IndexBuilder<'r> {
    registry: &'r Registry,
    sync: bool,
}

impl<'r> IndexBuilder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            sync: false,
        }
    }

    /// Refresh each provider's metadata before listing.
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Indexes every available provider.
    pub async fn build_all(&self) -> Index {
        let entries = self.registry.list_available(true).await;
        self.build_entries(entries).await
    }

    /// Indexes the named providers that are registered and available.
    ///
    /// Unknown and unavailable names are skipped.
    pub async fn build_for<S: AsRef<str>>(&self, names: &[S]) -> Index {
        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        for name in names.iter().filter(|n| !self.registry.contains(n)) {
            debug!(provider = %name, "skipping unknown provider");
        }

        let entries = self
            .registry
            .list_named(&names, true)
            .await
            .into_iter()
            .filter(|e| {
                if !e.available {
                    debug!(provider = %e.name, "skipping unavailable provider");
                }
                e.available
            })
            .collect();
        self.build_entries(entries).await
    }

    /// Indexes a single provider, failing if anything goes wrong.
    ///
    /// # Errors
    ///
    /// - [`Error::ProviderNotFound`] / [`Error::ProviderUnavailable`]
    /// - [`Error::IndexBuildFailed`] wrapping a sync failure
    /// - the provider's listing error, unchanged
    pub async fn build_single(&self, name: &str) -> Result<Index> {
        let entry = self.registry.check_usable(name).await?;
        let provider = entry
            .instance
            .ok_or_else(|| Error::ProviderUnavailable(name.to_string()))?;

        let packages = fetch(provider.as_ref(), self.sync)
            .await
            .map_err(|err| match err {
                Error::SyncFailed { .. } => Error::IndexBuildFailed(Box::new(err)),
                other => other,
            })?;

        let mut index = Index::default();
        index.insert(entry.name, provider, packages);
        Ok(index)
    }

    /// Resolves a `provider/package` reference to its package.
    pub async fn lookup(&self, reference: &str) -> Result<Package> {
        let mut found = self.lookup_all(&[reference]).await?;
        found
            .pop()
            .ok_or_else(|| Error::InvalidPackageName(reference.to_string()))
    }

    /// Resolves several references, in order, indexing each provider once.
    ///
    /// Every reference is validated before any provider is queried. The
    /// first error aborts the lookup.
    pub async fn lookup_all<S: AsRef<str>>(&self, references: &[S]) -> Result<Vec<Package>> {
        let references = references
            .iter()
            .map(|r| PackageRef::parse(r.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if let Some(unknown) = references
            .iter()
            .find(|r| !self.registry.contains(&r.provider))
        {
            return Err(Error::ProviderNotFound(unknown.provider.clone()));
        }

        let mut indexes: BTreeMap<&str, Index> = BTreeMap::new();
        for reference in &references {
            if !indexes.contains_key(reference.provider.as_str()) {
                let index = self.build_single(&reference.provider).await?;
                indexes.insert(&reference.provider, index);
            }
        }

        references
            .iter()
            .map(|r| {
                let index = indexes
                    .get(r.provider.as_str())
                    .ok_or_else(|| Error::ProviderNotFound(r.provider.clone()))?;
                index.find(&r.provider, &r.package).cloned()
            })
            .collect()
    }

    async fn build_entries(&self, entries: Vec<ProviderEntry>) -> Index {
        let sync = self.sync;
        let tasks = entries
            .into_iter()
            .filter_map(|entry| Some((entry.name, entry.instance?)))
            .map(|(name, provider)| async move {
                let result = fetch(provider.as_ref(), sync).await;
                (name, provider, result)
            });

        let mut index = Index::default();
        for (name, provider, result) in join_all(tasks).await {
            match result {
                Ok(packages) => {
                    debug!(provider = %name, count = packages.len(), "indexed");
                    index.insert(name, provider, packages);
                }
                Err(err) => {
                    info!(provider = %name, error = %err, "provider failed");
                    index.failures.insert(name, err);
                }
            }
        }
        index
    }
}

async fn fetch(provider: &dyn Provider, sync: bool) -> Result<Vec<Package>> {
    if sync {
        provider.sync().await?;
    }
    provider.list().await
}
