//! Core data types for installed packages.
//!
//! - [`Package`] - One installed unit, normalized across package managers
//! - [`PackageState`] - Whether a package is up to date, outdated or unknown
//! - [`PackageRef`] - A `provider/package` reference given on the command line
//!
//! # Example
//!
//! ```
//! use compulsive::{Package, PackageState};
//!
//! let package = Package::new("cargo", "ripgrep", "14.0.0").with_next_version("14.1.0");
//! assert_eq!(package.state(), PackageState::Outdated);
//! ```

mod package;

pub use package::*;
