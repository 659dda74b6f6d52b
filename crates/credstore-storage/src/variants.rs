//! Local keystore provider variants and their factories.
//!
//! Each variant is plain data: the URI scheme it answers to, the container
//! type it writes and the integrity algorithm it stamps. One provider
//! implementation serves all of them.

use std::{fmt, sync::Arc};

use credstore_core::{
    settings::DEFAULT_KDF_ITERATIONS, CredentialError, CredentialProvider, InMemoryProviderFactory,
    ProviderAddress, ProviderFactory, ProviderRegistry, ProviderSettings,
};
use tracing::debug;

use crate::{
    address::SchemeAddressTranslator,
    keystore::{KeyStoreCodec, MacAlgorithm, StoreType},
    local_provider::LocalKeyStoreProvider,
    passphrase::{ChainedPassphrase, Passphrase, PassphraseProvider},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStoreVariant {
    pub scheme: &'static str,
    pub store_type: StoreType,
    pub algorithm: MacAlgorithm,
}

impl KeyStoreVariant {
    pub const fn translator(&self) -> SchemeAddressTranslator {
        SchemeAddressTranslator::new(self.scheme)
    }
}

/// `localbcfks://file/<path>`
pub const LOCAL_BCFKS: KeyStoreVariant = KeyStoreVariant {
    scheme: "localbcfks",
    store_type: StoreType::Bcfks,
    algorithm: MacAlgorithm::HmacSha512,
};

/// `localjceks://file/<path>`
pub const LOCAL_JCEKS: KeyStoreVariant = KeyStoreVariant {
    scheme: "localjceks",
    store_type: StoreType::Jceks,
    algorithm: MacAlgorithm::HmacSha256,
};

pub const LOCAL_VARIANTS: [KeyStoreVariant; 2] = [LOCAL_BCFKS, LOCAL_JCEKS];

/// Everything a local provider needs besides its address.
#[derive(Clone)]
pub struct ProviderConfiguration {
    variant: KeyStoreVariant,
    passphrase: Arc<dyn PassphraseProvider>,
    kdf_iterations: u32,
}

impl ProviderConfiguration {
    pub fn new(variant: KeyStoreVariant, passphrase: impl PassphraseProvider + 'static) -> Self {
        Self {
            variant,
            passphrase: Arc::new(passphrase),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
        }
    }

    /// Passphrase chain and KDF rounds taken from `settings`.
    pub fn from_settings(variant: KeyStoreVariant, settings: &ProviderSettings) -> Self {
        Self::new(variant, ChainedPassphrase::from_settings(settings))
            .with_kdf_iterations(settings.kdf_iterations)
    }

    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    pub fn variant(&self) -> KeyStoreVariant {
        self.variant
    }

    pub fn kdf_iterations(&self) -> u32 {
        self.kdf_iterations
    }

    pub(crate) fn codec(&self) -> KeyStoreCodec {
        KeyStoreCodec::new(self.variant.store_type, self.variant.algorithm)
            .with_iterations(self.kdf_iterations)
    }

    pub(crate) fn resolve_passphrase(&self) -> Result<Passphrase, CredentialError> {
        self.passphrase
            .passphrase()
            .map_err(|e| CredentialError::Passphrase {
                reason: format!("{} ({})", e, self.passphrase.describe()),
            })
    }
}

impl fmt::Debug for ProviderConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfiguration")
            .field("variant", &self.variant)
            .field("passphrase", &self.passphrase.describe())
            .field("kdf_iterations", &self.kdf_iterations)
            .finish()
    }
}

/// Creates [`LocalKeyStoreProvider`]s for one variant's scheme.
#[derive(Debug, Clone)]
pub struct LocalKeyStoreFactory {
    config: ProviderConfiguration,
}

impl LocalKeyStoreFactory {
    pub fn new(config: ProviderConfiguration) -> Self {
        Self { config }
    }
}

impl ProviderFactory for LocalKeyStoreFactory {
    fn scheme(&self) -> &str {
        self.config.variant.scheme
    }

    fn try_create(
        &self,
        address: &ProviderAddress,
    ) -> Result<Option<Box<dyn CredentialProvider>>, CredentialError> {
        if address.scheme() != self.config.variant.scheme {
            return Ok(None);
        }
        let provider = LocalKeyStoreProvider::open(address, self.config.clone())?;
        Ok(Some(Box::new(provider)))
    }
}

/// Registry with every local variant plus the in-memory provider.
pub fn default_registry(settings: &ProviderSettings) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for variant in LOCAL_VARIANTS {
        registry.register(LocalKeyStoreFactory::new(ProviderConfiguration::from_settings(
            variant, settings,
        )));
    }
    registry.register(InMemoryProviderFactory);
    debug!(?registry, "default credential provider registry ready");
    registry
}
