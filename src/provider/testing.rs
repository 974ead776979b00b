//! In-memory provider used by registry and index tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Barrier;

use super::{names_of, Provider, Registry};
use crate::error::{Error, Result};
use crate::model::Package;

#[derive(Clone)]
pub(crate) struct FakeProvider {
    name: String,
    available: bool,
    sync_error: Option<String>,
    packages: std::result::Result<Vec<(String, String, String)>, String>,
    probes: Arc<AtomicUsize>,
    syncs: Arc<AtomicUsize>,
    barrier: Option<Arc<Barrier>>,
}

impl FakeProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            sync_error: None,
            packages: Ok(Vec::new()),
            probes: Arc::new(AtomicUsize::new(0)),
            syncs: Arc::new(AtomicUsize::new(0)),
            barrier: None,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn failing_sync(mut self, reason: &str) -> Self {
        self.sync_error = Some(reason.to_string());
        self
    }

    pub fn failing_list(mut self, reason: &str) -> Self {
        self.packages = Err(reason.to_string());
        self
    }

    /// Adds a package; an empty `next` leaves it unknown.
    pub fn with_package(mut self, name: &str, version: &str, next: &str) -> Self {
        if let Ok(packages) = &mut self.packages {
            packages.push((name.to_string(), version.to_string(), next.to_string()));
        }
        self
    }

    pub fn probes(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.probes)
    }

    pub fn syncs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.syncs)
    }

    /// Makes `list` wait on `barrier` before returning.
    pub fn waiting_on(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn register(self, registry: &mut Registry) {
        let name = self.name.clone();
        registry.register(name, move || Box::new(self.clone()));
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.available
    }

    async fn sync(&self) -> Result<()> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        match &self.sync_error {
            Some(reason) => Err(Error::sync_failed(&self.name, reason)),
            None => Ok(()),
        }
    }

    async fn list(&self) -> Result<Vec<Package>> {
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        match &self.packages {
            Ok(packages) => Ok(packages
                .iter()
                .map(|(name, version, next)| {
                    Package::new(&self.name, name, version).with_next_version(next)
                })
                .collect()),
            Err(reason) => Err(Error::list_failed(&self.name, reason)),
        }
    }

    fn upgrade_command(&self, packages: &[&Package]) -> String {
        let names: Vec<_> = names_of(packages).collect();
        format!("{} upgrade {}", self.name, names.join(" "))
    }
}
