//! Cross-platform path resolution.
//!
//! This module provides functions for finding the directories package
//! managers install into. Environment overrides are honored the same way the
//! package managers themselves honor them.

use std::env;
use std::path::PathBuf;

/// Returns cargo's home directory.
///
/// `CARGO_HOME` when set, otherwise `~/.cargo` on all platforms.
pub fn cargo_home() -> Option<PathBuf> {
    env_path("CARGO_HOME").or_else(|| Some(dirs::home_dir()?.join(".cargo")))
}

/// Returns the manifest cargo keeps of `cargo install`ed crates.
pub fn cargo_install_manifest() -> Option<PathBuf> {
    Some(cargo_home()?.join(".crates.toml"))
}

/// Returns the Go binary directory from the environment alone.
///
/// - `GOBIN` when set
/// - the `bin` directory of the first `GOPATH` entry otherwise
///
/// Returns `None` when neither variable is set; callers then ask the Go
/// toolchain for its default.
pub fn go_bin_dir_from_env() -> Option<PathBuf> {
    if let Some(gobin) = env_path("GOBIN") {
        return Some(gobin);
    }
    let gopath = env::var_os("GOPATH")?;
    let first = env::split_paths(&gopath).find(|p| !p.as_os_str().is_empty())?;
    Some(first.join("bin"))
}

/// Returns the configuration directory for compulsive.
///
/// Platform-specific locations:
/// - Linux: `~/.config/compulsive/`
/// - macOS: `~/Library/Application Support/compulsive/`
/// - Windows: `%APPDATA%\compulsive\`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("compulsive")
}

/// Strips the executable suffix the platform adds to binary names.
pub fn command_name(file_name: &str) -> &str {
    if cfg!(windows) {
        file_name.strip_suffix(".exe").unwrap_or(file_name)
    } else {
        file_name
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
