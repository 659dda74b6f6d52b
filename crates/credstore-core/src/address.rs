use std::{fmt, str::FromStr};

use url::Url;

use crate::error::CredentialError;

/// URI naming a provider variant (by scheme) and the store it manages.
///
/// `localbcfks://file/home/larry/creds.bcfks` selects the `localbcfks` variant;
/// everything after the scheme is interpreted by that variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderAddress {
    url: Url,
}

impl ProviderAddress {
    pub fn parse(input: &str) -> Result<Self, CredentialError> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed)
            .map_err(|e| CredentialError::invalid_address(trimmed, e.to_string()))?;
        Ok(Self { url })
    }

    /// Scheme used for provider discovery (always lowercase).
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl From<Url> for ProviderAddress {
    fn from(url: Url) -> Self {
        Self { url }
    }
}

impl FromStr for ProviderAddress {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProviderAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
