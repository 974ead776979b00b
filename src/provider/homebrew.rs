use crate::error::{Error, Result};
use crate::model::Package;
use crate::process;
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::warn;

use super::{names_of, Settings};

const NAME: &str = "homebrew";

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bHomebrew \d+\.\d+\.\d+").expect("valid regex"));

#[derive(Deserialize)]
struct BrewInfo {
    #[serde(default)]
    formulae: Vec<serde_json::Value>,
    #[serde(default)]
    casks: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct BrewFormula {
    name: String,
    full_name: Option<String>,
    desc: Option<String>,
    #[serde(default)]
    outdated: bool,
    versions: BrewVersions,
    #[serde(default)]
    revision: u32,
    installed: Vec<InstalledVersion>,
}

#[derive(Deserialize)]
struct BrewVersions {
    stable: Option<String>,
}

#[derive(Deserialize)]
struct InstalledVersion {
    version: String,
}

#[derive(Deserialize)]
struct BrewCask {
    token: String,
    #[serde(default)]
    name: Vec<String>,
    desc: Option<String>,
    version: Option<String>,
    installed: Option<String>,
    #[serde(default)]
    outdated: bool,
}

impl BrewFormula {
    fn into_package(self) -> Option<Package> {
        if self.installed.is_empty() {
            return None;
        }
        let version = self
            .installed
            .iter()
            .map(|i| i.version.as_str())
            .collect::<Vec<_>>()
            .join("/");
        let name = self.full_name.unwrap_or_else(|| self.name.clone());

        let pkg = Package::new(NAME, name, version)
            .with_label(self.name)
            .with_summary(self.desc);

        if !self.outdated {
            return Some(pkg.up_to_date());
        }
        // Brew reports revision bumps as `<version>_<revision>`.
        let next = match (self.versions.stable, self.revision) {
            (Some(stable), 0) => stable,
            (Some(stable), revision) => format!("{stable}_{revision}"),
            (None, _) => String::new(),
        };
        Some(pkg.with_next_version(next))
    }
}

impl BrewCask {
    fn into_package(self) -> Option<Package> {
        let installed = self.installed?;
        let label = self.name.first().cloned().unwrap_or_else(|| self.token.clone());

        let pkg = Package::new(NAME, self.token, installed)
            .with_label(label)
            .with_summary(self.desc);

        if self.outdated {
            Some(pkg.with_next_version(self.version.unwrap_or_default()))
        } else {
            Some(pkg.up_to_date())
        }
    }
}

/// Decodes `brew info --json=v2 --installed`.
///
/// Records that do not match the expected shape are skipped.
pub fn parse_installed(raw: &[u8]) -> Result<Vec<Package>> {
    let info: BrewInfo = serde_json::from_slice(raw).map_err(|e| Error::decode_failed(NAME, e))?;

    let formulae = info
        .formulae
        .into_iter()
        .filter_map(|v| decode_record::<BrewFormula>(v, "formula")?.into_package());
    let casks = info
        .casks
        .into_iter()
        .filter_map(|v| decode_record::<BrewCask>(v, "cask")?.into_package());

    Ok(formulae.chain(casks).collect())
}

fn decode_record<T: DeserializeOwned>(value: serde_json::Value, kind: &str) -> Option<T> {
    let name = value
        .get("full_name")
        .or_else(|| value.get("token"))
        .and_then(|n| n.as_str())
        .unwrap_or("?")
        .to_string();
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(kind, name = %name, error = %err, "skipping malformed brew record");
            None
        }
    }
}

/// Formulae and casks installed with Homebrew.
pub struct HomebrewProvider {
    settings: Settings,
}

impl HomebrewProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }
}

#[async_trait]
impl super::Provider for HomebrewProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn is_available(&self) -> bool {
        process::probe("brew", &["--version"], &VERSION_RE, self.settings.command_timeout).await
    }

    async fn sync(&self) -> Result<()> {
        process::run("brew", &["update"], self.settings.command_timeout)
            .await
            .map_err(|e| Error::sync_failed(NAME, e))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Package>> {
        let raw = process::run(
            "brew",
            &["info", "--json=v2", "--installed"],
            self.settings.command_timeout,
        )
        .await
        .map_err(|e| Error::list_failed(NAME, e))?;

        parse_installed(&raw)
    }

    fn upgrade_command(&self, packages: &[&Package]) -> String {
        let names: Vec<_> = names_of(packages).collect();
        format!("brew upgrade {}", names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageState;
    use crate::provider::Provider;

    const INFO: &str = r#"{
  "formulae": [
    {
      "name": "git",
      "full_name": "git",
      "desc": "Distributed revision control system",
      "versions": {"stable": "2.44.0"},
      "revision": 0,
      "installed": [{"version": "2.43.0"}],
      "outdated": true
    },
    {
      "name": "jq",
      "full_name": "jq",
      "desc": "Lightweight and flexible command-line JSON processor",
      "versions": {"stable": "1.7.1"},
      "revision": 0,
      "installed": [{"version": "1.7.1"}],
      "outdated": false
    },
    {
      "name": "openssl@3",
      "full_name": "openssl@3",
      "versions": {"stable": "3.2.1"},
      "revision": 1,
      "installed": [{"version": "3.2.1"}],
      "outdated": true
    },
    {
      "name": "tool",
      "full_name": "someone/tap/tool",
      "versions": {"stable": "1.0"},
      "installed": [{"version": "0.9"}, {"version": "1.0_1"}],
      "outdated": false
    },
    {
      "name": "broken",
      "full_name": "broken",
      "installed": "not a list"
    }
  ],
  "casks": [
    {
      "token": "firefox",
      "name": ["Mozilla Firefox"],
      "desc": "Web browser",
      "version": "124.0",
      "installed": "123.0",
      "outdated": true
    },
    {
      "token": "not-installed",
      "name": [],
      "version": "1.0",
      "installed": null,
      "outdated": false
    }
  ]
}"#;

    #[test]
    fn test_parse_installed() {
        let packages = parse_installed(INFO.as_bytes()).unwrap();
        let names: Vec<_> = packages.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["git", "jq", "openssl@3", "someone/tap/tool", "firefox"]);

        let git = &packages[0];
        assert_eq!(git.state(), PackageState::Outdated);
        assert_eq!(git.version(), "2.43.0");
        assert_eq!(git.next_version(), Some("2.44.0"));
        assert_eq!(git.summary(), Some("Distributed revision control system"));

        assert_eq!(packages[1].state(), PackageState::UpToDate);

        let openssl = &packages[2];
        assert_eq!(openssl.state(), PackageState::Outdated);
        assert_eq!(openssl.next_version(), Some("3.2.1_1"));

        let tool = &packages[3];
        assert_eq!(tool.label(), "tool");
        assert_eq!(tool.version(), "0.9/1.0_1");
        assert_eq!(tool.state(), PackageState::UpToDate);

        let firefox = &packages[4];
        assert_eq!(firefox.label(), "Mozilla Firefox");
        assert_eq!(firefox.next_version(), Some("124.0"));
        assert!(firefox.is_outdated());
    }

    #[test]
    fn test_classification_invariant() {
        for pkg in parse_installed(INFO.as_bytes()).unwrap() {
            let differs = pkg.next_version().is_some_and(|n| n != pkg.version());
            assert_eq!(pkg.is_outdated(), differs, "{}", pkg.name());
        }
    }

    #[test]
    fn test_parse_installed_formulae_only() {
        let packages = parse_installed(br#"{"formulae": []}"#).unwrap();
        assert!(packages.is_empty());
    }

    #[test]
    fn test_parse_installed_rejects_wrong_shape() {
        assert!(matches!(
            parse_installed(b"[1, 2, 3]"),
            Err(Error::DecodeFailed { .. })
        ));
        assert!(matches!(
            parse_installed(b"Error: no such command"),
            Err(Error::DecodeFailed { .. })
        ));
    }

    #[test]
    fn test_upgrade_command() {
        let provider = HomebrewProvider::new(&Settings::default());
        let a = Package::new(NAME, "git", "2.43.0");
        let b = Package::new(NAME, "someone/tap/tool", "0.9");
        assert_eq!(provider.upgrade_command(&[&a, &b]), "brew upgrade git someone/tap/tool");
    }
}
