use crate::error::{Error, Result};
use crate::model::Package;
use crate::platform::{command_name, go_bin_dir_from_env};
use crate::process;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::Settings;

const NAME: &str = "go";

const DATE_FORMAT: &str = "%Y-%m-%d";

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bgo1\.\d+(\.\d+)?\b").expect("valid regex"));

/// Build metadata of one package, as printed by `go list -json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct GoPackageInfo {
    pub import_path: String,
    pub name: String,
    pub target: String,
    pub stale: bool,
    pub stale_reason: String,
}

/// A file found in the Go bin directory.
#[derive(Debug, Clone)]
pub struct GoBinary {
    pub file_name: String,
    pub modified: DateTime<Local>,
}

/// Decodes the stream of concatenated JSON objects `go list -json` prints.
pub fn parse_go_list(raw: &[u8]) -> Result<Vec<GoPackageInfo>> {
    serde_json::Deserializer::from_slice(raw)
        .into_iter::<GoPackageInfo>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::decode_failed(NAME, e))
}

/// Matches binaries with the `main` packages that build them.
///
/// Versions are dates: the binary's modification date, and for stale
/// builds the date of `now`. A binary without build metadata is unknown.
pub fn correlate(
    bin_dir: &Path,
    binaries: &[GoBinary],
    infos: &[GoPackageInfo],
    now: DateTime<Local>,
) -> Vec<Package> {
    binaries
        .iter()
        .map(|bin| {
            let label = command_name(&bin.file_name);
            let installed = bin.modified.format(DATE_FORMAT).to_string();
            let target = bin_dir.join(&bin.file_name);

            let info = infos
                .iter()
                .find(|info| info.name == "main" && Path::new(&info.target) == target);

            let Some(info) = info else {
                return Package::new(NAME, label, installed);
            };

            let pkg = Package::new(NAME, &info.import_path, &installed).with_label(label);
            if info.stale {
                let mut next = now.format(DATE_FORMAT).to_string();
                if next == installed {
                    // Built earlier today: the date alone cannot tell them apart.
                    next = now.format("%Y-%m-%d %H:%M:%S").to_string();
                }
                let reason = (!info.stale_reason.is_empty()).then(|| info.stale_reason.clone());
                pkg.with_summary(reason).with_next_version(next)
            } else {
                pkg.up_to_date()
            }
        })
        .collect()
}

/// Lists files directly inside `dir`, following symlinks; a missing
/// directory has none.
pub fn list_binaries(dir: &Path) -> Vec<GoBinary> {
    if !dir.is_dir() {
        return Vec::new();
    }

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable go bin entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let metadata = entry.metadata().map_err(std::io::Error::from);
            let modified = match metadata.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping go binary");
                    return None;
                }
            };
            Some(GoBinary {
                file_name: entry.file_name().to_string_lossy().into_owned(),
                modified: DateTime::<Local>::from(modified),
            })
        })
        .collect()
}

/// Binaries installed with `go install`.
pub struct GoProvider {
    settings: Settings,
    bin_dir: OnceCell<Option<PathBuf>>,
}

impl GoProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
            bin_dir: OnceCell::new(),
        }
    }

    /// Resolves the bin directory once: environment first, then `go env GOPATH`.
    async fn bin_dir(&self) -> Option<&PathBuf> {
        self.bin_dir
            .get_or_init(|| async {
                if let Some(dir) = go_bin_dir_from_env() {
                    return Some(dir);
                }
                let out =
                    process::banner("go", &["env", "GOPATH"], self.settings.command_timeout)
                        .await?;
                let gopath = out.trim();
                let first = std::env::split_paths(gopath).find(|p| !p.as_os_str().is_empty())?;
                Some(first.join("bin"))
            })
            .await
            .as_ref()
    }
}

#[async_trait]
impl super::Provider for GoProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn is_available(&self) -> bool {
        process::probe("go", &["version"], &VERSION_RE, self.settings.command_timeout).await
    }

    async fn list(&self) -> Result<Vec<Package>> {
        let bin_dir = self
            .bin_dir()
            .await
            .ok_or_else(|| Error::list_failed(NAME, "cannot locate the Go bin directory"))?;

        let binaries = list_binaries(bin_dir);
        debug!(dir = %bin_dir.display(), count = binaries.len(), "found go binaries");
        if binaries.is_empty() {
            return Ok(Vec::new());
        }

        let raw = process::run("go", &["list", "-json", "all"], self.settings.command_timeout)
            .await
            .map_err(|e| Error::list_failed(NAME, e))?;
        let infos = parse_go_list(&raw)?;

        Ok(correlate(bin_dir, &binaries, &infos, Local::now()))
    }

    fn upgrade_command(&self, packages: &[&Package]) -> String {
        packages
            .iter()
            .map(|p| format!("go install {}@latest", p.name()))
            .collect::<Vec<_>>()
            .join(" && ")
    }
}
