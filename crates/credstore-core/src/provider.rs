use tracing::{debug, instrument};

use crate::{
    address::ProviderAddress, entry::CredentialEntry, error::CredentialError,
    snapshot::KeyStoreSnapshot,
};

/// Contract shared by every credential store.
///
/// Mutations only touch the in-memory view; nothing reaches durable storage
/// until [`flush`](CredentialProvider::flush) succeeds. Instances are not
/// internally synchronized: share one across threads behind a single `Mutex`.
pub trait CredentialProvider: Send {
    /// Address this provider was created for.
    fn address(&self) -> &ProviderAddress;

    /// Transient providers lose their contents when dropped.
    fn is_transient(&self) -> bool {
        false
    }

    /// Look up a credential by alias.
    fn get(&self, alias: &str) -> Result<&CredentialEntry, CredentialError>;

    /// Add a credential. Fails if the alias already exists; delete it first to replace.
    fn put(&mut self, alias: &str, secret: &[u8]) -> Result<&CredentialEntry, CredentialError>;

    /// Remove a credential. Fails if the alias does not exist.
    fn delete(&mut self, alias: &str) -> Result<(), CredentialError>;

    /// Current aliases in insertion order. Call again after mutating to see the new state.
    fn aliases(&self) -> Box<dyn Iterator<Item = &str> + '_>;

    /// True when there are changes not yet flushed.
    fn is_dirty(&self) -> bool;

    /// Make pending changes durable.
    fn flush(&mut self) -> Result<(), CredentialError>;
}

/// Transient provider that keeps credentials in memory only (`memory://<name>`).
/// Useful as a test double and for short-lived overrides.
#[derive(Debug)]
pub struct InMemoryCredentialProvider {
    address: ProviderAddress,
    snapshot: KeyStoreSnapshot,
}

impl InMemoryCredentialProvider {
    pub const SCHEME: &'static str = "memory";

    pub fn new(address: ProviderAddress) -> Self {
        Self {
            address,
            snapshot: KeyStoreSnapshot::new(),
        }
    }

    /// Convenience constructor for `memory://<name>`.
    pub fn named(name: &str) -> Result<Self, CredentialError> {
        let address = ProviderAddress::parse(&format!("{}://{name}", Self::SCHEME))?;
        Ok(Self::new(address))
    }
}

impl CredentialProvider for InMemoryCredentialProvider {
    fn address(&self) -> &ProviderAddress {
        &self.address
    }

    fn is_transient(&self) -> bool {
        true
    }

    fn get(&self, alias: &str) -> Result<&CredentialEntry, CredentialError> {
        self.snapshot
            .get(alias)
            .ok_or_else(|| CredentialError::NotFound {
                alias: alias.to_string(),
                provider: self.address.to_string(),
            })
    }

    #[instrument(skip_all, fields(alias))]
    fn put(&mut self, alias: &str, secret: &[u8]) -> Result<&CredentialEntry, CredentialError> {
        self.snapshot.put(alias, secret, self.address.as_str())
    }

    #[instrument(skip_all, fields(alias))]
    fn delete(&mut self, alias: &str) -> Result<(), CredentialError> {
        self.snapshot.delete(alias, self.address.as_str())
    }

    fn aliases(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.snapshot.aliases())
    }

    fn is_dirty(&self) -> bool {
        self.snapshot.is_dirty()
    }

    fn flush(&mut self) -> Result<(), CredentialError> {
        // Nothing to persist.
        self.snapshot.mark_clean();
        Ok(())
    }
}

/// Return the first entry for `alias` across `providers`, in order.
pub fn find_credential<'a>(
    providers: &'a [Box<dyn CredentialProvider>],
    alias: &str,
) -> Option<&'a CredentialEntry> {
    providers.iter().find_map(|provider| match provider.get(alias) {
        Ok(entry) => {
            debug!(alias, provider = %provider.address(), "credential resolved");
            Some(entry)
        }
        Err(_) => None,
    })
}
