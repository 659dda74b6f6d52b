use std::path::PathBuf;

use thiserror::Error;

/// Boxed cause carried by load failures so callers can inspect the codec error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by credential providers and the provider registry.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Malformed provider URI, or one that does not match the translator's scheme.
    #[error("invalid provider address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    /// No provider variant handles this scheme.
    #[error("no credential provider for scheme `{scheme}` ({address})")]
    UnsupportedScheme { scheme: String, address: String },
    /// The keystore file exists but could not be decoded.
    #[error("failed to load keystore {}: {source}", path.display())]
    KeyStoreLoad {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    /// `put` on an alias that is already present.
    #[error("credential {alias} already exists in {provider}")]
    DuplicateAlias { alias: String, provider: String },
    /// Requested alias does not exist.
    #[error("credential {alias} does not exist in {provider}")]
    NotFound { alias: String, provider: String },
    /// Aliases must be non-empty.
    #[error("invalid alias: {reason}")]
    InvalidAlias { reason: String },
    /// Writing, stamping or renaming the keystore failed; the previous file is intact.
    #[error("failed to persist keystore {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    /// The keystore passphrase could not be obtained.
    #[error("passphrase unavailable: {reason}")]
    Passphrase { reason: String },
    /// Provider settings could not be read or parsed.
    #[error("invalid settings: {reason}")]
    Settings { reason: String },
}

impl CredentialError {
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        CredentialError::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }
}
