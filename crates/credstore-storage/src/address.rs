//! Rewrites provider addresses to local paths and back.
//!
//! `localbcfks://file/home/larry/creds.bcfks` names the local file
//! `/home/larry/creds.bcfks` (`file:///home/larry/creds.bcfks`): the literal
//! `file` authority marks the nested filesystem scheme and the URI path is the
//! absolute file path.

use std::path::{Component, Path, PathBuf};

use credstore_core::{CredentialError, ProviderAddress};
use url::Url;

/// Authority that marks a nested `file:` location.
const FILE_AUTHORITY: &str = "file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemeAddressTranslator {
    scheme: &'static str,
}

impl SchemeAddressTranslator {
    pub const fn new(scheme: &'static str) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> &'static str {
        self.scheme
    }

    /// `<scheme>://file/<path>` → `/<path>`.
    pub fn to_local_path(&self, address: &ProviderAddress) -> Result<PathBuf, CredentialError> {
        let url = address.url();
        let invalid = |reason: &str| CredentialError::invalid_address(address.as_str(), reason);

        if url.scheme() != self.scheme {
            return Err(invalid(&format!("expected scheme `{}`", self.scheme)));
        }
        if url.host_str() != Some(FILE_AUTHORITY) {
            return Err(invalid("authority must be `file`"));
        }
        if !url.username().is_empty() || url.password().is_some() || url.port().is_some() {
            return Err(invalid("credentials and ports are not allowed"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed"));
        }
        let path = url.path();
        if path.is_empty() || path == "/" {
            return Err(invalid("missing file path"));
        }

        // Re-nest as a file URL so percent-decoding follows file URL rules.
        let file_url = Url::parse(&format!("file://{path}"))
            .map_err(|e| invalid(&format!("bad path: {e}")))?;
        let local = file_url
            .to_file_path()
            .map_err(|_| invalid("path is not a local absolute path"))?;
        if local.file_name().is_none() {
            return Err(invalid("missing file name"));
        }
        Ok(local)
    }

    /// `/<path>` → `<scheme>://file/<path>`. Exact inverse of [`to_local_path`](Self::to_local_path).
    ///
    /// `..` components are refused: the URI form would collapse them textually.
    pub fn to_provider_address(&self, path: &Path) -> Result<ProviderAddress, CredentialError> {
        let invalid =
            |reason: &str| CredentialError::invalid_address(path.display().to_string(), reason);

        if path.components().any(|c| c == Component::ParentDir) {
            return Err(invalid("`..` components are not allowed"));
        }

        let file_url =
            Url::from_file_path(path).map_err(|_| invalid("path must be absolute"))?;
        let url = Url::parse(&format!(
            "{}://{FILE_AUTHORITY}{}",
            self.scheme,
            file_url.path()
        ))
        .map_err(|e| invalid(&e.to_string()))?;
        Ok(ProviderAddress::from(url))
    }
}
