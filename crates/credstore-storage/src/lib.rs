//! Local keystore-backed credential providers.
//! A whole store lives in one passphrase-protected file, addressed as
//! `<scheme>://file/<absolute path>` and replaced atomically on flush.

pub mod address;
pub mod keystore;
pub mod local_provider;
pub mod passphrase;
pub mod variants;

pub use address::SchemeAddressTranslator;
pub use local_provider::LocalKeyStoreProvider;
pub use variants::{
    default_registry, KeyStoreVariant, LocalKeyStoreFactory, ProviderConfiguration, LOCAL_BCFKS,
    LOCAL_JCEKS, LOCAL_VARIANTS,
};
