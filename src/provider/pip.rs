use crate::error::{Error, Result};
use crate::model::Package;
use crate::process;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{names_of, Settings};

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"pip (?P<version>\d+(?:\.\d+)+) from (?P<root>.+) \((?P<python>.+)\)")
        .expect("valid regex")
});

#[derive(Debug, Clone, Deserialize)]
pub struct PipEntry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub latest_version: Option<String>,
}

/// Extracts the install root from a `pip --version` banner.
pub fn parse_root(banner: &str) -> Option<String> {
    VERSION_RE
        .captures(banner)
        .map(|caps| caps["root"].trim().to_string())
}

/// Decodes `pip list --format json`; entries missing a field are skipped.
pub fn parse_listing(provider: &str, raw: &[u8]) -> Result<Vec<PipEntry>> {
    let values: Vec<serde_json::Value> =
        serde_json::from_slice(raw).map_err(|e| Error::decode_failed(provider, e))?;

    Ok(values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<PipEntry>(value) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(provider, error = %err, "skipping malformed pip entry");
                None
            }
        })
        .collect())
}

/// Joins the full listing with the outdated-only one by package name.
pub fn join_listings(
    provider: &str,
    all: Vec<PipEntry>,
    outdated: Vec<PipEntry>,
) -> Vec<Package> {
    let mut latest: HashMap<String, String> = outdated
        .into_iter()
        .map(|e| (e.name, e.latest_version.unwrap_or_default()))
        .collect();

    all.into_iter()
        .map(|entry| {
            let pkg = Package::new(provider, &entry.name, entry.version);
            match latest.remove(&entry.name) {
                Some(next) => pkg.with_next_version(next),
                None => pkg.up_to_date(),
            }
        })
        .collect()
}

/// Packages of one pip installation (`pip`, `pip2` or `pip3`).
pub struct PipProvider {
    version: String,
    bin: String,
    settings: Settings,
    default_root: Arc<OnceCell<Option<String>>>,
}

impl PipProvider {
    /// `version` is the suffix of the pip binary, empty for plain `pip`.
    pub fn new(version: &str, settings: &Settings) -> Self {
        Self {
            version: version.to_string(),
            bin: format!("pip{version}"),
            settings: settings.clone(),
            default_root: Arc::new(OnceCell::new()),
        }
    }

    /// Shares the probe of the default pip's install root with other providers.
    pub fn sharing_default_root(mut self, default_root: Arc<OnceCell<Option<String>>>) -> Self {
        self.default_root = default_root;
        self
    }

    async fn root_of(&self, bin: &str) -> Option<String> {
        let banner = process::banner(bin, &["--version"], self.settings.command_timeout).await?;
        parse_root(&banner)
    }

    /// Install root of the unversioned `pip`, probed once per shared cell.
    async fn default_root(&self) -> Option<&String> {
        self.default_root
            .get_or_init(|| self.root_of("pip"))
            .await
            .as_ref()
    }

    async fn run_list(&self, extra: &[&str]) -> Result<Vec<PipEntry>> {
        let mut args = vec!["list", "--format", "json", "--disable-pip-version-check"];
        args.extend_from_slice(extra);
        let raw = process::run(&self.bin, &args, self.settings.command_timeout)
            .await
            .map_err(|e| Error::list_failed(&self.bin, e))?;
        parse_listing(&self.bin, &raw)
    }
}

#[async_trait]
impl super::Provider for PipProvider {
    fn name(&self) -> &str {
        &self.bin
    }

    async fn is_available(&self) -> bool {
        if self.version.is_empty() {
            return self.default_root().await.is_some();
        }

        let Some(root) = self.root_of(&self.bin).await else {
            return false;
        };
        // A versioned pip pointing at the default installation would list it twice.
        match self.default_root().await {
            Some(default) if *default == root => {
                debug!(bin = %self.bin, %root, "same installation as pip");
                false
            }
            _ => true,
        }
    }

    async fn list(&self) -> Result<Vec<Package>> {
        let (all, outdated) =
            tokio::try_join!(self.run_list(&[]), self.run_list(&["--outdated"]))?;
        Ok(join_listings(&self.bin, all, outdated))
    }

    fn upgrade_command(&self, packages: &[&Package]) -> String {
        let names: Vec<_> = names_of(packages).collect();
        format!("{} install --upgrade {}", self.bin, names.join(" "))
    }
}
