//! Registry of the known providers.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::OnceCell;

use super::{CargoProvider, GoProvider, HomebrewProvider, PipProvider, Provider, Settings};
use crate::config::Config;
use crate::error::{Error, Result};

type Factory = Box<dyn Fn() -> Box<dyn Provider> + Send + Sync>;

struct Registration {
    name: String,
    factory: Factory,
}

/// A provider as seen by a listing request.
pub struct ProviderEntry {
    pub name: String,
    /// Result of the availability probe made for this request.
    pub available: bool,
    /// The instance the probe ran on, when the caller asked to keep it.
    pub instance: Option<Box<dyn Provider>>,
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("available", &self.available)
            .field("instance", &self.instance.is_some())
            .finish()
    }
}

/// The set of providers compulsive knows about, ordered by name.
///
/// Each request constructs fresh provider instances from the registered
/// factories, so concurrent requests never share an adapter.
pub struct Registry {
    registrations: Vec<Registration>,
}

impl Registry {
    /// Creates a registry holding every built-in provider.
    pub fn new(config: &Config) -> Self {
        let settings = Settings::from(config);
        let mut registry = Self::empty();

        let s = settings.clone();
        registry.register("cargo", move || Box::new(CargoProvider::new(&s)));
        let s = settings.clone();
        registry.register("go", move || Box::new(GoProvider::new(&s)));
        let s = settings.clone();
        registry.register("homebrew", move || Box::new(HomebrewProvider::new(&s)));
        // Versioned pips compare against the default pip, probed once per registry.
        let default_pip_root = Arc::new(OnceCell::new());
        for version in ["", "2", "3"] {
            let s = settings.clone();
            let root = Arc::clone(&default_pip_root);
            registry.register(format!("pip{version}"), move || {
                Box::new(PipProvider::new(version, &s).sharing_default_root(Arc::clone(&root)))
            });
        }

        registry
    }

    pub fn empty() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Registers a provider factory, replacing any provider of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Provider> + Send + Sync + 'static,
    {
        let name = name.into();
        self.registrations.retain(|r| r.name != name);
        self.registrations.push(Registration {
            name,
            factory: Box::new(factory),
        });
        self.registrations.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(|r| r.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registration(name).is_some()
    }

    /// Lists every registered provider with a fresh availability flag.
    ///
    /// Probes run concurrently, once per provider. Instances are kept only
    /// when `with_instance` is set and the provider is available.
    pub async fn list_all(&self, with_instance: bool) -> Vec<ProviderEntry> {
        self.probe_all(self.registrations.iter(), with_instance).await
    }

    /// Same as [`list_all`](Self::list_all), restricted to available providers.
    pub async fn list_available(&self, with_instance: bool) -> Vec<ProviderEntry> {
        self.list_all(with_instance)
            .await
            .into_iter()
            .filter(|e| e.available)
            .collect()
    }

    /// Probes the providers named in `names`, ignoring unregistered names.
    pub(crate) async fn list_named(
        &self,
        names: &[&str],
        with_instance: bool,
    ) -> Vec<ProviderEntry> {
        let selected = self
            .registrations
            .iter()
            .filter(|r| names.contains(&r.name.as_str()));
        self.probe_all(selected, with_instance).await
    }

    /// Looks a provider up by exact, case-sensitive name and probes it.
    ///
    /// The returned entry carries its instance when the provider is available.
    pub async fn find_by_name(&self, name: &str) -> Result<ProviderEntry> {
        let registration = self
            .registration(name)
            .ok_or_else(|| Error::ProviderNotFound(name.to_string()))?;
        Ok(probe(registration, true).await)
    }

    /// Fails unless `name` is registered and available on this host.
    pub async fn check_usable(&self, name: &str) -> Result<ProviderEntry> {
        let entry = self.find_by_name(name).await?;
        if !entry.available {
            return Err(Error::ProviderUnavailable(name.to_string()));
        }
        Ok(entry)
    }

    fn registration(&self, name: &str) -> Option<&Registration> {
        self.registrations.iter().find(|r| r.name == name)
    }

    async fn probe_all<'a>(
        &self,
        registrations: impl Iterator<Item = &'a Registration>,
        with_instance: bool,
    ) -> Vec<ProviderEntry> {
        join_all(registrations.map(|r| probe(r, with_instance))).await
    }
}

async fn probe(registration: &Registration, with_instance: bool) -> ProviderEntry {
    let instance = (registration.factory)();
    let available = instance.is_available().await;
    ProviderEntry {
        name: registration.name.clone(),
        available,
        instance: (with_instance && available).then_some(instance),
    }
}
