//! Report installed packages that have newer versions available, across
//! several package managers at once.
//!
//! Each package manager is a [`Provider`]. A [`Registry`] knows how to create
//! them and probe their availability, and an [`IndexBuilder`] queries the
//! selected providers concurrently into an [`Index`].

pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod output;
pub mod platform;
pub mod process;
pub mod provider;

pub use config::Config;
pub use error::{Error, Result};
pub use index::{Index, IndexBuilder};
pub use model::{Package, PackageRef, PackageState};
pub use provider::{Provider, ProviderEntry, Registry};
