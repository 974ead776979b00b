use crate::index::Index;
use crate::model::Package;
use crate::provider::ProviderEntry;
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

/// Packages selected for display plus the providers that failed to list.
#[derive(Serialize)]
pub struct PackageReport<'a> {
    pub packages: Vec<&'a Package>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<&'a str, String>,
}

impl<'a> PackageReport<'a> {
    pub fn new(index: &'a Index, packages: Vec<&'a Package>) -> Self {
        let failures = index
            .failures()
            .iter()
            .map(|(name, err)| (name.as_str(), err.to_string()))
            .collect();
        Self { packages, failures }
    }
}

#[derive(Tabled, Serialize)]
pub struct ProviderRow {
    #[tabled(rename = "Provider")]
    pub name: String,
    #[tabled(rename = "Available")]
    pub available: bool,
}

impl From<&ProviderEntry> for ProviderRow {
    fn from(entry: &ProviderEntry) -> Self {
        Self {
            name: entry.name.clone(),
            available: entry.available,
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
