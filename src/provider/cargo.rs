use crate::error::{Error, Result};
use crate::model::Package;
use crate::platform::cargo_install_manifest;
use crate::process;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::Deserialize;
use std::io;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::warn;

use super::{names_of, Settings};

const NAME: &str = "cargo";

/// Registry lookups in flight at once.
const MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Source identifiers of crates installed from crates.io.
const PUBLIC_REGISTRY_SOURCES: &[&str] = &[
    "registry+https://github.com/rust-lang/crates.io-index",
    "sparse+https://index.crates.io/",
];

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^cargo \d+\.\d+\.\d+").expect("valid regex"));

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^"(?P<name>\S+) (?P<version>\S+) \((?P<source>\S+)\)" = \[(?P<binaries>[^\]]*)\]"#,
    )
    .expect("valid regex")
});

/// One record of cargo's install manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub version: String,
    pub source: String,
    pub binaries: Vec<String>,
}

impl ManifestEntry {
    fn from_public_registry(&self) -> bool {
        PUBLIC_REGISTRY_SOURCES.contains(&self.source.as_str())
    }
}

/// Parses the `[v1]` section of `.crates.toml`.
///
/// Lines before the section header are ignored and the section ends at the
/// next header. Lines that are not install records are skipped.
pub fn parse_manifest(raw: &str) -> Vec<ManifestEntry> {
    let mut entries = Vec::new();
    let mut in_section = false;

    for line in raw.lines().map(str::trim) {
        if line.starts_with('[') {
            in_section = line == "[v1]";
            continue;
        }
        if !in_section || line.is_empty() {
            continue;
        }

        let Some(caps) = ENTRY_RE.captures(line) else {
            warn!(line, "skipping unrecognized manifest line");
            continue;
        };

        entries.push(ManifestEntry {
            name: caps["name"].to_string(),
            version: caps["version"].to_string(),
            source: caps["source"].to_string(),
            binaries: parse_binaries(&caps["binaries"]),
        });
    }

    entries
}

fn parse_binaries(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|b| b.trim().trim_matches('"'))
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Deserialize)]
struct CratePayload {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

/// What crates.io knows about the latest release of a crate.
#[derive(Debug, Clone, Deserialize)]
pub struct CrateInfo {
    pub description: Option<String>,
    pub max_version: String,
}

/// Minimal client for the crates.io API.
#[derive(Clone)]
pub struct CratesClient {
    client: reqwest::Client,
    base_url: String,
}

impl CratesClient {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("compulsive/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn latest(&self, name: &str) -> reqwest::Result<CrateInfo> {
        let url = format!("{}/{}", self.base_url, name);
        let payload: CratePayload = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(payload.krate)
    }
}

/// Crates installed with `cargo install`.
pub struct CargoProvider {
    manifest: Option<PathBuf>,
    settings: Settings,
}

impl CargoProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            manifest: cargo_install_manifest(),
            settings: settings.clone(),
        }
    }

    pub fn with_manifest(manifest: PathBuf, settings: &Settings) -> Self {
        Self {
            manifest: Some(manifest),
            settings: settings.clone(),
        }
    }

    fn read_manifest(&self) -> Result<Vec<ManifestEntry>> {
        let path = self
            .manifest
            .as_ref()
            .ok_or_else(|| Error::list_failed(NAME, "cannot locate cargo home"))?;

        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(parse_manifest(&raw)),
            // Nothing was ever installed.
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(Error::list_failed(
                NAME,
                format!("failed to read {}: {}", path.display(), err),
            )),
        }
    }
}

async fn resolve(entry: ManifestEntry, client: &CratesClient) -> Package {
    let pkg =
        Package::new(NAME, &entry.name, &entry.version).with_binaries(entry.binaries.clone());

    if !entry.from_public_registry() {
        return pkg;
    }

    match client.latest(&entry.name).await {
        Ok(info) => pkg
            .with_summary(info.description)
            .with_next_version(info.max_version),
        Err(err) => {
            warn!(package = %entry.name, error = %err, "failed to fetch crate info");
            pkg
        }
    }
}

#[async_trait]
impl super::Provider for CargoProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn is_available(&self) -> bool {
        process::probe("cargo", &["version"], &VERSION_RE, self.settings.command_timeout).await
    }

    async fn list(&self) -> Result<Vec<Package>> {
        let entries = self.read_manifest()?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let client = CratesClient::new(&self.settings.crates_api_url, self.settings.http_timeout)
            .map_err(|e| Error::list_failed(NAME, e))?;

        let packages: Vec<Package> = stream::iter(entries)
            .map(|entry| resolve(entry, &client))
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .collect()
            .await;

        Ok(packages)
    }

    fn upgrade_command(&self, packages: &[&Package]) -> String {
        let names: Vec<_> = names_of(packages).collect();
        format!("cargo install --force {}", names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageState;
    use crate::provider::Provider;

    const CRATES_IO: &str = "registry+https://github.com/rust-lang/crates.io-index";

    #[test]
    fn test_parse_manifest() {
        let raw = r#"[v1]
"clippy 0.0.123 (registry+https://github.com/rust-lang/crates.io-index)" = ["cargo-clippy.exe"]
"rustfmt 0.8.3 (registry+https://github.com/rust-lang/crates.io-index)" = ["cargo-fmt.exe", "rustfmt.exe"]
"ufind 0.3.0 (path+file:///C:/Users/someone/dev/ufind)" = ["ufind.exe"]
"#;
        let expected = vec![
            ManifestEntry {
                name: "clippy".into(),
                version: "0.0.123".into(),
                source: CRATES_IO.into(),
                binaries: vec!["cargo-clippy.exe".into()],
            },
            ManifestEntry {
                name: "rustfmt".into(),
                version: "0.8.3".into(),
                source: CRATES_IO.into(),
                binaries: vec!["cargo-fmt.exe".into(), "rustfmt.exe".into()],
            },
            ManifestEntry {
                name: "ufind".into(),
                version: "0.3.0".into(),
                source: "path+file:///C:/Users/someone/dev/ufind".into(),
                binaries: vec!["ufind.exe".into()],
            },
        ];
        assert_eq!(parse_manifest(raw), expected);
    }

    #[test]
    fn test_parse_manifest_ignores_lines_before_section_and_malformed_lines() {
        let raw = r#""bar 0.1.0 (registry+https://example/index)" = ["bar"]
[v1]
"foo 1.2.0 (registry+https://example/index)" = ["foo-bin"]
this is not a record
"baz" = ["baz"]
"#;
        let entries = parse_manifest(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "foo");
        assert_eq!(entries[0].version, "1.2.0");
        assert_eq!(entries[0].source, "registry+https://example/index");
        assert_eq!(entries[0].binaries, vec!["foo-bin".to_string()]);
    }

    #[test]
    fn test_parse_manifest_stops_at_next_section() {
        let raw = r#"[v1]
"foo 1.2.0 (registry+https://example/index)" = ["foo"]
[v2]
"bar 0.1.0 (registry+https://example/index)" = ["bar"]
"#;
        let names: Vec<_> = parse_manifest(raw).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["foo"]);
    }

    #[test]
    fn test_parse_manifest_without_section() {
        assert!(parse_manifest("").is_empty());
        assert!(parse_manifest("\"foo 1.0.0 (x)\" = [\"foo\"]\n").is_empty());
    }

    #[test]
    fn test_parse_binaries_empty_list() {
        assert!(parse_binaries("").is_empty());
        assert_eq!(parse_binaries(r#""a", "b""#), vec!["a", "b"]);
    }

    #[test]
    fn test_public_registry_detection() {
        let raw = format!("[v1]\n\"foo 1.0.0 ({CRATES_IO})\" = [\"foo\"]\n");
        let mut entry = parse_manifest(&raw).pop().unwrap();
        assert!(entry.from_public_registry());
        entry.source = "sparse+https://index.crates.io/".into();
        assert!(entry.from_public_registry());
        entry.source = "git+https://github.com/someone/foo#abc".into();
        assert!(!entry.from_public_registry());
    }

    #[tokio::test]
    async fn test_list_classifies_against_registry() {
        let mut server = mockito::Server::new_async().await;

        let ripgrep = server
            .mock("GET", "/ripgrep")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"crate": {"description": "Recursive grep", "max_version": "14.1.0"}}"#)
            .create_async()
            .await;
        let fd = server
            .mock("GET", "/fd-find")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"crate": {"description": null, "max_version": "9.0.0"}}"#)
            .create_async()
            .await;
        let gone = server.mock("GET", "/gone").with_status(404).create_async().await;

        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join(".crates.toml");
        std::fs::write(
            &manifest,
            format!(
                "[v1]\n\
                 \"ripgrep 14.0.0 ({CRATES_IO})\" = [\"rg\"]\n\
                 \"fd-find 9.0.0 ({CRATES_IO})\" = [\"fd\"]\n\
                 \"gone 0.1.0 ({CRATES_IO})\" = [\"gone\"]\n\
                 \"local 0.1.0 (path+file:///src/local)\" = [\"local\"]\n"
            ),
        )
        .unwrap();

        let settings = Settings {
            crates_api_url: server.url(),
            ..Settings::default()
        };
        let provider = CargoProvider::with_manifest(manifest, &settings);
        let packages = provider.list().await.unwrap();

        ripgrep.assert_async().await;
        fd.assert_async().await;
        gone.assert_async().await;

        assert_eq!(packages.len(), 4);
        let by_name = |name: &str| packages.iter().find(|p| p.name() == name).unwrap();

        let rg = by_name("ripgrep");
        assert_eq!(rg.state(), PackageState::Outdated);
        assert_eq!(rg.next_version(), Some("14.1.0"));
        assert_eq!(rg.summary(), Some("Recursive grep"));
        assert_eq!(rg.binaries(), ["rg".to_string()]);

        assert_eq!(by_name("fd-find").state(), PackageState::UpToDate);
        assert_eq!(by_name("gone").state(), PackageState::Unknown);
        assert_eq!(by_name("local").state(), PackageState::Unknown);

        for pkg in &packages {
            let differs = pkg.next_version().is_some_and(|n| n != pkg.version());
            assert_eq!(pkg.is_outdated(), differs);
        }
    }

    #[tokio::test]
    async fn test_list_without_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join(".crates.toml");
        let provider = CargoProvider::with_manifest(manifest, &Settings::default());
        assert!(provider.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_upgrade_command() {
        let manifest = PathBuf::from(".crates.toml");
        let provider = CargoProvider::with_manifest(manifest, &Settings::default());
        let a = Package::new(NAME, "ripgrep", "14.0.0");
        let b = Package::new(NAME, "fd-find", "8.0.0");
        assert_eq!(
            provider.upgrade_command(&[&a, &b]),
            "cargo install --force ripgrep fd-find"
        );
    }
}
