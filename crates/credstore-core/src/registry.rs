use tracing::{debug, instrument};

use crate::{
    address::ProviderAddress,
    error::CredentialError,
    provider::{CredentialProvider, InMemoryCredentialProvider},
    settings::ProviderSettings,
};

/// Builds providers for the addresses it recognizes.
pub trait ProviderFactory: Send + Sync {
    /// Scheme handled by this factory (used for logging and diagnostics).
    fn scheme(&self) -> &str;

    /// `Ok(None)` means "not mine" so the registry can try the next factory.
    /// Errors are reserved for a matching scheme with an otherwise bad address.
    fn try_create(
        &self,
        address: &ProviderAddress,
    ) -> Result<Option<Box<dyn CredentialProvider>>, CredentialError>;
}

/// Factory for [`InMemoryCredentialProvider`] (`memory://<name>`).
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryProviderFactory;

impl ProviderFactory for InMemoryProviderFactory {
    fn scheme(&self) -> &str {
        InMemoryCredentialProvider::SCHEME
    }

    fn try_create(
        &self,
        address: &ProviderAddress,
    ) -> Result<Option<Box<dyn CredentialProvider>>, CredentialError> {
        if address.scheme() != InMemoryCredentialProvider::SCHEME {
            return Ok(None);
        }
        Ok(Some(Box::new(InMemoryCredentialProvider::new(
            address.clone(),
        ))))
    }
}

/// Ordered set of factories populated at startup.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: Vec<Box<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: impl ProviderFactory + 'static) -> &mut Self {
        debug!(scheme = factory.scheme(), "registering credential provider factory");
        self.factories.push(Box::new(factory));
        self
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.iter().map(|f| f.scheme())
    }

    /// Ask each factory in registration order; the first one to accept wins.
    #[instrument(skip_all, fields(address = %address))]
    pub fn create(
        &self,
        address: &ProviderAddress,
    ) -> Result<Box<dyn CredentialProvider>, CredentialError> {
        for factory in &self.factories {
            if let Some(provider) = factory.try_create(address)? {
                debug!(scheme = factory.scheme(), "credential provider created");
                return Ok(provider);
            }
        }
        Err(CredentialError::UnsupportedScheme {
            scheme: address.scheme().to_string(),
            address: address.to_string(),
        })
    }

    /// Instantiate every provider named in the configured provider path, in order.
    pub fn providers_for(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Vec<Box<dyn CredentialProvider>>, CredentialError> {
        settings
            .provider_addresses()?
            .iter()
            .map(|address| self.create(address))
            .collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("schemes", &self.schemes().collect::<Vec<_>>())
            .finish()
    }
}
