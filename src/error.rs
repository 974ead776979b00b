//! Error taxonomy shared by the registry, the adapters and the index.

use thiserror::Error;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("could not sync provider {provider}: {reason}")]
    SyncFailed { provider: String, reason: String },

    #[error("could not list packages of {provider}: {reason}")]
    ListFailed { provider: String, reason: String },

    #[error("could not decode {provider} output: {reason}")]
    DecodeFailed { provider: String, reason: String },

    #[error("package not found: {provider}/{package}")]
    PackageNotFound { provider: String, package: String },

    #[error("not a package name: {0:?} (expected provider/package)")]
    InvalidPackageName(String),

    #[error("could not build index")]
    IndexBuildFailed(#[source] Box<Error>),
}

impl Error {
    pub fn sync_failed(provider: &str, reason: impl ToString) -> Self {
        Error::SyncFailed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn list_failed(provider: &str, reason: impl ToString) -> Self {
        Error::ListFailed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn decode_failed(provider: &str, reason: impl ToString) -> Self {
        Error::DecodeFailed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }
}
