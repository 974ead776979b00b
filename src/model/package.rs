use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageState {
    Unknown,
    Outdated,
    UpToDate,
}

impl PackageState {
    /// Classifies an installed version against the latest known one.
    ///
    /// Versions are compared as plain strings: whether a version is newer is
    /// left to the package manager that reported it.
    pub fn classify(version: &str, next_version: Option<&str>) -> Self {
        match next_version {
            None | Some("") => PackageState::Unknown,
            Some(next) if next == version => PackageState::UpToDate,
            Some(_) => PackageState::Outdated,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            PackageState::Unknown => '?',
            PackageState::Outdated => '+',
            PackageState::UpToDate => '=',
        }
    }
}

impl std::fmt::Display for PackageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PackageState::Unknown => "unknown",
            PackageState::Outdated => "outdated",
            PackageState::UpToDate => "up-to-date",
        };
        write!(f, "{}", s)
    }
}

/// An installed package as reported by one provider.
///
/// The state is always derived from `version` and `next_version`, so a
/// package is outdated exactly when a next version is known and differs
/// from the installed one.
#[derive(Debug, Clone, Serialize)]
pub struct Package {
    provider: String,
    name: String,
    label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    binaries: Vec<String>,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_version: Option<String>,
    state: PackageState,
}

impl Package {
    /// Creates a package whose label is its name and whose state is unknown.
    pub fn new(
        provider: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            provider: provider.into(),
            label: name.clone(),
            name,
            summary: None,
            binaries: Vec::new(),
            version: version.into(),
            next_version: None,
            state: PackageState::Unknown,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary.filter(|s| !s.is_empty());
        self
    }

    pub fn with_binaries(mut self, binaries: Vec<String>) -> Self {
        self.binaries = binaries;
        self
    }

    /// Records the latest known version and reclassifies the package.
    ///
    /// An empty string means "unknown" and leaves the package unclassified.
    pub fn with_next_version(mut self, next_version: impl Into<String>) -> Self {
        let next = next_version.into();
        self.next_version = if next.is_empty() { None } else { Some(next) };
        self.state = PackageState::classify(&self.version, self.next_version.as_deref());
        self
    }

    /// Marks the package as current, as asserted by its package manager.
    pub fn up_to_date(self) -> Self {
        let version = self.version.clone();
        self.with_next_version(version)
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn binaries(&self) -> &[String] {
        &self.binaries
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn next_version(&self) -> Option<&str> {
        self.next_version.as_deref()
    }

    pub fn state(&self) -> PackageState {
        self.state
    }

    pub fn is_outdated(&self) -> bool {
        self.state == PackageState::Outdated
    }

    /// The `provider/name` reference of this package.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.provider, self.name)
    }
}

/// A `provider/package` reference.
///
/// Only the first `/` separates the provider, so package names may contain
/// slashes themselves (e.g. Go import paths or tapped Homebrew formulae).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub provider: String,
    pub package: String,
}

impl PackageRef {
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((provider, package)) if !provider.is_empty() && !package.is_empty() => Ok(Self {
                provider: provider.to_string(),
                package: package.to_string(),
            }),
            _ => Err(Error::InvalidPackageName(s.to_string())),
        }
    }
}

impl std::str::FromStr for PackageRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
