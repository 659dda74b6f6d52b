//! Core contracts for credstore: the credential provider trait, shared entry and
//! snapshot types, provider discovery, and settings.
//! Concrete persistent stores live in `credstore-storage`.

pub mod address;
pub mod entry;
pub mod error;
pub mod provider;
pub mod registry;
pub mod settings;
pub mod snapshot;

pub use address::ProviderAddress;
pub use entry::CredentialEntry;
pub use error::CredentialError;
pub use provider::{find_credential, CredentialProvider, InMemoryCredentialProvider};
pub use registry::{InMemoryProviderFactory, ProviderFactory, ProviderRegistry};
pub use settings::ProviderSettings;
pub use snapshot::KeyStoreSnapshot;
